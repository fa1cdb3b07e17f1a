// Reading the candidates out of one rendered constituency page.
//
// Expected layout:
//   <h2>Assembly Constituency 1 - VALMIKI NAGAR (Bihar)</h2>
//   <div class="cand-box">
//     <div class="cand-info">
//       <div class="status"><div>won</div><div>50000 <span>( +1675)</span></div></div>
//       <h5>CANDIDATE NAME</h5>
//       <h6>Party name</h6>
//     </div>
//   </div>

use std::num::ParseIntError;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use snafu::{prelude::*, Snafu};

use ac_results::{CandidateEntry, Status};

// The selectors and the pattern are constants: parsing them cannot fail.
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static CANDIDATE_BOX: Lazy<Selector> = Lazy::new(|| Selector::parse("div.cand-box").unwrap());
static CANDIDATE_INFO: Lazy<Selector> = Lazy::new(|| Selector::parse("div.cand-info").unwrap());
static STATUS_BLOCK: Lazy<Selector> = Lazy::new(|| Selector::parse("div.status").unwrap());
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());
static CANDIDATE_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("h5").unwrap());
static PARTY_NAME: Lazy<Selector> = Lazy::new(|| Selector::parse("h6").unwrap());
static HEADING_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"- (.*?)\s*\(").unwrap());

/// Errors that make a whole page unusable. Candidates are numbered from 0 in
/// page order.
#[derive(Debug, Snafu)]
pub enum ExtractError {
    #[snafu(display("candidate {index}: missing candidate information block"))]
    MissingCandidateInfo { index: usize },
    #[snafu(display("candidate {index}: missing status block"))]
    MissingStatus { index: usize },
    #[snafu(display("candidate {index}: unknown status {raw:?}"))]
    UnknownStatus { index: usize, raw: String },
    #[snafu(display("candidate {index}: missing vote count"))]
    MissingVotes { index: usize },
    #[snafu(display("candidate {index}: cannot read vote count {raw:?}"))]
    InvalidVotes {
        index: usize,
        raw: String,
        source: ParseIntError,
    },
}

/// Problems that only degrade the page: the candidates are still usable.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ExtractIssue {
    MissingHeading,
    UnmatchedHeading(String),
    MissingCandidateName { index: usize },
    MissingPartyName { index: usize },
    InvalidMargin { index: usize, raw: String },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstituencyPage {
    pub constituency_id: u32,
    /// Empty when the heading could not be read.
    pub constituency_name: String,
    pub candidates: Vec<CandidateEntry>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Extraction {
    Complete(ConstituencyPage),
    Partial {
        page: ConstituencyPage,
        issues: Vec<ExtractIssue>,
    },
    /// No candidate on the page.
    NoData,
}

pub fn extract_page(constituency_id: u32, html: &str) -> Result<Extraction, ExtractError> {
    let document = Html::parse_document(html);
    let mut issues: Vec<ExtractIssue> = Vec::new();

    let boxes: Vec<ElementRef> = document.select(&CANDIDATE_BOX).collect();
    if boxes.is_empty() {
        debug!("extract_page: {}: no candidate found", constituency_id);
        return Ok(Extraction::NoData);
    }

    let constituency_name = match document.select(&HEADING).next() {
        Some(h) => {
            let text = element_text(&h);
            match parse_heading_name(&text) {
                Some(name) => name,
                None => {
                    issues.push(ExtractIssue::UnmatchedHeading(text));
                    String::new()
                }
            }
        }
        None => {
            issues.push(ExtractIssue::MissingHeading);
            String::new()
        }
    };

    let mut candidates: Vec<CandidateEntry> = Vec::with_capacity(boxes.len());
    for (index, b) in boxes.iter().enumerate() {
        candidates.push(read_candidate(b, index, &mut issues)?);
    }

    let page = ConstituencyPage {
        constituency_id,
        constituency_name,
        candidates,
    };
    if issues.is_empty() {
        Ok(Extraction::Complete(page))
    } else {
        for issue in issues.iter() {
            warn!("extract_page: {}: {:?}", constituency_id, issue);
        }
        Ok(Extraction::Partial { page, issues })
    }
}

fn read_candidate(
    candidate_box: &ElementRef,
    index: usize,
    issues: &mut Vec<ExtractIssue>,
) -> Result<CandidateEntry, ExtractError> {
    let info = candidate_box
        .select(&CANDIDATE_INFO)
        .next()
        .context(MissingCandidateInfoSnafu { index })?;
    let status_block = info
        .select(&STATUS_BLOCK)
        .next()
        .context(MissingStatusSnafu { index })?;

    let mut status_divs = status_block
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "div");
    let status_raw = status_divs
        .next()
        .map(|d| element_text(&d))
        .context(MissingStatusSnafu { index })?;
    let status = parse_status(&status_raw).context(UnknownStatusSnafu {
        index,
        raw: status_raw.clone(),
    })?;
    let votes_raw = status_divs
        .next()
        .map(|d| element_text(&d))
        .context(MissingVotesSnafu { index })?;
    let votes = parse_votes(&votes_raw).context(InvalidVotesSnafu {
        index,
        raw: votes_raw.clone(),
    })?;

    // No annotation at all means a margin of 0.
    let margin = match status_block.select(&SPAN).next() {
        Some(span) => {
            let raw = element_text(&span);
            let m = parse_margin(&raw);
            if m.is_none() {
                issues.push(ExtractIssue::InvalidMargin { index, raw });
            }
            m
        }
        None => Some(0),
    };

    let candidate_name = match info.select(&CANDIDATE_NAME).next() {
        Some(e) => element_text(&e),
        None => {
            issues.push(ExtractIssue::MissingCandidateName { index });
            String::new()
        }
    };
    let party_name = match info.select(&PARTY_NAME).next() {
        Some(e) => element_text(&e),
        None => {
            issues.push(ExtractIssue::MissingPartyName { index });
            String::new()
        }
    };

    Ok(CandidateEntry {
        candidate_name,
        party_name,
        votes,
        margin,
        status,
    })
}

fn element_text(e: &ElementRef) -> String {
    e.text().collect::<String>().trim().to_string()
}

/// The constituency name in a heading like
/// `"Assembly Constituency 1 - VALMIKI NAGAR (Bihar)"`: the text between the
/// dash and the first opening parenthesis after it.
pub fn parse_heading_name(heading: &str) -> Option<String> {
    HEADING_NAME
        .captures(heading)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Case-sensitive.
pub fn parse_status(raw: &str) -> Option<Status> {
    Status::parse(raw.trim())
}

/// The vote count is the first token of the raw text.
pub fn parse_votes(raw: &str) -> Result<u64, ParseIntError> {
    raw.split_whitespace().next().unwrap_or("").parse::<u64>()
}

/// Margins are printed like `"( +1675)"` or `"(-1 675)"`.
pub fn parse_margin(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '+') && !c.is_whitespace())
        .collect();
    cleaned.parse::<i64>().ok()
}
