use log::{debug, error, info, warn};

use ac_results::builder::aggregate_constituency;
use ac_results::district::{enrich, DistrictIndex};
use ac_results::master::{build_master, median_report};
use ac_results::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use text_diff::print_diff;

use crate::args::{Args, Stage};
use crate::pipeline::config_reader::*;
use crate::pipeline::io_csv::*;
use crate::pipeline::io_fetch::{DirPageSource, HttpPageSource, PageSource};
use crate::pipeline::io_page::{extract_page, ExtractError, Extraction};

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_fetch;
pub mod io_page;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    #[snafu(display("Error opening configuration file {path}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing configuration file {path}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV file {path}"))]
    CsvWrite { source: csv::Error, path: String },
    #[snafu(display("I/O error on {path}"))]
    Io {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error replacing file {path}"))]
    Persist {
        source: tempfile::PersistError,
        path: String,
    },
    #[snafu(display("Cannot create the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Error fetching constituency {constituency_id} from {url}"))]
    Fetch {
        source: reqwest::Error,
        constituency_id: u32,
        url: String,
    },
    #[snafu(display("Cannot read the page of constituency {constituency_id}"))]
    Extraction {
        source: ExtractError,
        constituency_id: u32,
    },
    #[snafu(display("Invalid results: {source}"))]
    Results { source: ResultsError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Why a constituency did not make it into the store.
#[derive(PartialEq, Debug, Clone)]
pub enum SkipReason {
    /// The page has no candidate.
    NoData,
    FetchFailed(String),
    /// The page has candidates but a vote count or a status cannot be read.
    Unreadable(String),
    /// The candidates break an invariant of the results.
    Rejected(ResultsError),
}

/// What an ingest run did.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct IngestReport {
    /// The constituencies whose candidates were merged, in order.
    pub merged: Vec<u32>,
    pub skipped: Vec<(u32, SkipReason)>,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl IngestReport {
    fn log_summary(&self) {
        info!(
            "Ingest: {} constituencies merged, {} skipped, store went from {} to {} rows",
            self.merged.len(),
            self.skipped.len(),
            self.rows_before,
            self.rows_after
        );
        for (id, reason) in self.skipped.iter() {
            match reason {
                SkipReason::NoData => info!("Constituency {}: no data", id),
                x => warn!("Constituency {}: skipped: {:?}", id, x),
            }
        }
    }
}

/// Fetches, reads and aggregates the candidates of one constituency.
pub fn ingest_constituency(
    constituency_id: u32,
    source: &mut dyn PageSource,
    index: &DistrictIndex,
) -> Result<Vec<CandidateResult>, SkipReason> {
    info!(
        "Processing constituency {} ({})",
        constituency_id,
        source.location(constituency_id)
    );
    let html = match source.fetch(constituency_id) {
        Ok(x) => x,
        Err(e) => {
            error!("Constituency {}: {}", constituency_id, e);
            return Err(SkipReason::FetchFailed(e.to_string()));
        }
    };

    let extraction =
        extract_page(constituency_id, &html).context(ExtractionSnafu { constituency_id });
    let page = match extraction {
        Ok(Extraction::Complete(page)) => page,
        Ok(Extraction::Partial { page, issues }) => {
            warn!(
                "Constituency {}: partial page ({} issues)",
                constituency_id,
                issues.len()
            );
            page
        }
        Ok(Extraction::NoData) => {
            info!("Constituency {}: no candidate on the page", constituency_id);
            return Err(SkipReason::NoData);
        }
        Err(e) => {
            let cause = std::error::Error::source(&e)
                .map(|x| x.to_string())
                .unwrap_or_default();
            error!("{}: {}", e, cause);
            return Err(SkipReason::Unreadable(cause));
        }
    };

    let batch = aggregate_constituency(
        page.constituency_id,
        &page.constituency_name,
        &page.candidates,
    )
    .map_err(|e| {
        error!("Rejecting constituency {}: {}", constituency_id, e);
        SkipReason::Rejected(e)
    })?;
    debug!("ingest_constituency: {:?}", batch);
    Ok(enrich(batch.rows, index))
}

/// Ingests the constituencies `first..last` and merges them into the store.
///
/// A constituency that cannot be fetched or read is skipped. The store is
/// read and replaced once, after all the pages.
pub fn run_ingest(
    config: &PipelineConfig,
    first: u32,
    last: u32,
    source: &mut dyn PageSource,
) -> PipelineResult<IngestReport> {
    let mapping = read_district_mapping(&config.district_mapping())?;
    let index = DistrictIndex::new(&mapping);
    info!("Read {} district mapping entries", index.len());

    let store = ResultsStore::new(&config.results());
    let existing = store.load()?;

    let mut report = IngestReport {
        rows_before: existing.len(),
        ..Default::default()
    };
    let mut new_rows: Vec<CandidateResult> = Vec::new();
    for constituency_id in first..last {
        match ingest_constituency(constituency_id, source, &index) {
            Ok(mut rows) => {
                new_rows.append(&mut rows);
                report.merged.push(constituency_id);
            }
            Err(reason) => report.skipped.push((constituency_id, reason)),
        }
    }

    let merged = store.replace_merged(existing, new_rows)?;
    report.rows_after = merged.len();
    report.log_summary();
    Ok(report)
}

/// Recomputes all the derived tables from the accumulated results.
pub fn run_analyze(config: &PipelineConfig) -> PipelineResult<Analysis> {
    let results = ResultsStore::new(&config.results()).load()?;
    if results.is_empty() {
        whatever!(
            "No results in {}: run the ingest stage first",
            config.results().display()
        );
    }
    let analysis =
        run_analysis(&results, &MetricsRules::DEFAULT_RULES).context(ResultsSnafu {})?;
    info!(
        "Margin bins: edges {:?}, upper edge {}",
        analysis.metrics.margins.bins.edges, analysis.metrics.margins.bins.upper
    );

    write_party_metrics(&config.party_metrics(), &analysis.metrics.parties)?;
    write_margin_buckets(&config.margin_buckets(), &analysis.metrics.margins.rows)?;
    write_master(&config.master(), &analysis.master)?;
    print_median(&analysis.median);
    Ok(analysis)
}

/// Rebuilds the master dataset from the three artifacts on disk.
pub fn run_master(config: &PipelineConfig) -> PipelineResult<Vec<MasterRecord>> {
    let results = ResultsStore::new(&config.results()).load()?;
    let margins = read_margin_buckets(&config.margin_buckets())?;
    let parties = read_party_metrics(&config.party_metrics())?;
    info!(
        "Merging {} results, {} margin rows and {} parties",
        results.len(),
        margins.len(),
        parties.len()
    );
    let master = build_master(&results, &margins, &parties, &MetricsRules::DEFAULT_RULES);
    write_master(&config.master(), &master)?;
    print_median(&median_report(&master));
    Ok(master)
}

fn print_median(median: &Option<MedianReport>) {
    let report = match median {
        Some(x) => x,
        None => {
            info!("No winner: no median to report");
            return;
        }
    };
    info!("Median winning vote percentage: {}", report.median_vote_percent);
    println!("Median winning vote %: {}", report.median_vote_percent);
    println!("{:<40} {:>12} {:>12}", "Party", "Below", "Above");
    for p in report.parties.iter() {
        println!(
            "{:<40} {:>12} {:>12}",
            p.party_name, p.below_median, p.above_median
        );
    }
}

/// Compares the master file with a reference file, line by line.
pub fn check_reference(master_path: &Path, reference_path: &Path) -> PipelineResult<()> {
    let produced = fs::read_to_string(master_path).context(IoSnafu {
        path: master_path.display().to_string(),
    })?;
    let reference = fs::read_to_string(reference_path).context(IoSnafu {
        path: reference_path.display().to_string(),
    })?;
    if produced != reference {
        warn!("Found differences with the reference file");
        print_diff(reference.as_str(), produced.as_str(), "\n");
        whatever!("Difference detected between the master dataset and the reference dataset")
    }
    info!("The master dataset matches {}", reference_path.display());
    Ok(())
}

fn page_source(args: &Args, config: &PipelineConfig) -> PipelineResult<Box<dyn PageSource>> {
    let dir = match &args.pages {
        Some(p) => Some(Path::new(p).to_path_buf()),
        None => config.page_directory(),
    };
    if let Some(d) = dir {
        info!("Reading saved pages from {}", d.display());
        return Ok(Box::new(DirPageSource::new(&d)));
    }
    match &config.source_url_template {
        Some(template) => Ok(Box::new(HttpPageSource::new(template, config.pause())?)),
        None => whatever!("No page source: set sourceUrlTemplate or pageDirectory"),
    }
}

pub fn run(args: &Args) -> PipelineResult<()> {
    let config = read_config(Path::new(&args.config))?;
    info!("Contest: {}", config.contest_name);

    if matches!(args.stage, Stage::Ingest | Stage::All) {
        let first = args.first.unwrap_or(config.first_constituency);
        let last = args.last.unwrap_or(config.last_constituency);
        let mut source = page_source(args, &config)?;
        run_ingest(&config, first, last, source.as_mut())?;
    }
    match args.stage {
        Stage::Analyze | Stage::All => {
            run_analyze(&config)?;
        }
        Stage::Master => {
            run_master(&config)?;
        }
        Stage::Ingest => {}
    }

    if let Some(reference) = &args.reference {
        if args.stage == Stage::Ingest {
            warn!("--reference is ignored for the ingest stage");
        } else {
            check_reference(&config.master(), Path::new(reference))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn candidate_box(
        status: &str,
        votes: &str,
        margin: Option<&str>,
        name: &str,
        party: &str,
    ) -> String {
        let m = margin
            .map(|x| format!(" <span>({})</span>", x))
            .unwrap_or_default();
        format!(
            r#"<div class="cand-box"><div class="cand-info">
                <div class="status"><div>{}</div><div>{}{}</div></div>
                <h5>{}</h5><h6>{}</h6>
            </div></div>"#,
            status, votes, m, name, party
        )
    }

    fn page(id: u32, name: &str, boxes: &[String]) -> String {
        format!(
            "<html><body><h2>Assembly Constituency {} - {} (Bihar)</h2>{}</body></html>",
            id,
            name,
            boxes.join("\n")
        )
    }

    /// Pages served from memory. A missing page is a fetch failure.
    struct MemoryPages {
        pages: HashMap<u32, String>,
        fetched: Vec<u32>,
    }

    impl PageSource for MemoryPages {
        fn location(&self, constituency_id: u32) -> String {
            format!("memory:{}", constituency_id)
        }

        fn fetch(&mut self, constituency_id: u32) -> PipelineResult<String> {
            self.fetched.push(constituency_id);
            match self.pages.get(&constituency_id) {
                Some(x) => Ok(x.clone()),
                None => whatever!("no page for {}", constituency_id),
            }
        }
    }

    fn sample_pages() -> MemoryPages {
        let mut pages = HashMap::new();
        pages.insert(
            1,
            page(
                1,
                "VALMIKI NAGAR",
                &[
                    candidate_box("won", "50000", Some("+12000"), "A", "P1"),
                    candidate_box("lost", "38000", Some("-12000"), "B", "P2"),
                    candidate_box("lost", "5000", None, "C", "P3"),
                ],
            ),
        );
        pages.insert(
            2,
            page(
                2,
                "RAMNAGAR",
                &[
                    candidate_box("won", "700", Some("+ 400"), "D", "P2"),
                    candidate_box("lost", "300", None, "E", "P1"),
                ],
            ),
        );
        // No candidates yet.
        pages.insert(3, page(3, "NARKATIAGANJ", &[]));
        // Unreadable vote count.
        pages.insert(
            4,
            page(4, "BAGAHA", &[candidate_box("won", "n/a", None, "F", "P1")]),
        );
        // Two winners.
        pages.insert(
            5,
            page(
                5,
                "LAURIYA",
                &[
                    candidate_box("won", "10", None, "G", "P1"),
                    candidate_box("won", "9", None, "H", "P2"),
                ],
            ),
        );
        MemoryPages {
            pages,
            fetched: Vec::new(),
        }
    }

    fn setup() -> (tempfile::TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("mapping.csv"),
            "AC_NO,AC_NAME,DISTRICT\n\
             1,Valmiki Nagar,Pashchim Champaran\n\
             2,Ramnagar,Pashchim Champaran\n",
        )
        .unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(
            &config_path,
            r#"{
                "contestName": "test",
                "pageDirectory": "pages",
                "firstConstituency": 1,
                "lastConstituency": 7,
                "pauseMillis": 0,
                "districtMappingPath": "mapping.csv"
            }"#,
        )
        .unwrap();
        let config = read_config(&config_path).unwrap();
        (dir, config)
    }

    #[test]
    fn ingest_skips_and_merges() {
        init();
        let (_dir, config) = setup();
        let mut source = sample_pages();
        let report = run_ingest(&config, 1, 7, &mut source).unwrap();
        assert_eq!(source.fetched, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(report.merged, vec![1, 2]);
        assert_eq!(report.rows_before, 0);
        assert_eq!(report.rows_after, 5);
        let reasons: Vec<u32> = report.skipped.iter().map(|(id, _)| *id).collect();
        assert_eq!(reasons, vec![3, 4, 5, 6]);
        assert_eq!(report.skipped[0].1, SkipReason::NoData);
        assert!(matches!(report.skipped[1].1, SkipReason::Unreadable(_)));
        assert_eq!(
            report.skipped[2].1,
            SkipReason::Rejected(ResultsError::WinnerCount {
                constituency_id: 5,
                winners: 2
            })
        );
        assert!(matches!(report.skipped[3].1, SkipReason::FetchFailed(_)));

        let rows = ResultsStore::new(&config.results()).load().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].constituency_name, "Valmiki Nagar");
        assert_eq!(rows[0].district.as_deref(), Some("Pashchim Champaran"));
        assert_eq!(rows[0].total_votes_polled, 93_000);
        assert_eq!(rows[3].margin, Some(400));
        assert_eq!(rows[4].total_votes_per_district, Some(94_000));
    }

    #[test]
    fn ingest_rejects_candidates_sharing_a_key() {
        init();
        let (_dir, config) = setup();
        // Two independents whose names are missing.
        let unnamed = |votes: &str| {
            format!(
                r#"<div class="cand-box"><div class="cand-info">
                    <div class="status"><div>lost</div><div>{}</div></div>
                    <h6>IND</h6>
                </div></div>"#,
                votes
            )
        };
        let mut pages = HashMap::new();
        pages.insert(
            1,
            page(
                1,
                "VALMIKI NAGAR",
                &[
                    candidate_box("won", "500", Some("+200"), "A", "P1"),
                    unnamed("300"),
                    unnamed("200"),
                ],
            ),
        );
        pages.insert(2, sample_pages().pages[&2].clone());
        let mut source = MemoryPages {
            pages,
            fetched: Vec::new(),
        };
        let report = run_ingest(&config, 1, 3, &mut source).unwrap();
        assert_eq!(report.merged, vec![2]);
        assert_eq!(
            report.skipped,
            vec![(
                1,
                SkipReason::Rejected(ResultsError::DuplicateCandidate {
                    constituency_id: 1,
                    candidate_name: "".to_string(),
                    party_name: "IND".to_string()
                })
            )]
        );

        // Nothing of the rejected page reached the store, which stays valid.
        let rows = ResultsStore::new(&config.results()).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.constituency_id == 2));
        assert!(run_analyze(&config).is_ok());
    }

    #[test]
    fn ingest_twice_changes_nothing() {
        init();
        let (_dir, config) = setup();
        run_ingest(&config, 1, 3, &mut sample_pages()).unwrap();
        let content = fs::read_to_string(config.results()).unwrap();
        let report = run_ingest(&config, 1, 3, &mut sample_pages()).unwrap();
        assert_eq!(report.rows_before, 5);
        assert_eq!(report.rows_after, 5);
        assert_eq!(fs::read_to_string(config.results()).unwrap(), content);
    }

    #[test]
    fn saved_pages_end_to_end() {
        init();
        let (dir, config) = setup();
        let pages_dir: PathBuf = config.page_directory().unwrap();
        fs::create_dir_all(&pages_dir).unwrap();
        for (id, html) in sample_pages().pages.iter() {
            fs::write(pages_dir.join(format!("{}.htm", id)), html).unwrap();
        }
        let mut source = DirPageSource::new(&pages_dir);
        run_ingest(&config, 1, 3, &mut source).unwrap();

        let analysis = run_analyze(&config).unwrap();
        assert_eq!(analysis.metrics.margins.rows.len(), 2);
        assert_eq!(analysis.master.len(), 5);
        let winner = &analysis.master[0];
        assert_eq!(winner.vote_percent, Some(53.76));
        assert_eq!(winner.margin_bucket, Some(MarginBucket::From10KTo25K));
        assert_eq!(winner.multi_cornered_count, Some(2));
        assert_eq!(winner.is_multi_cornered, 0);

        // The master stage rebuilds the same file from the artifacts.
        let master = fs::read_to_string(config.master()).unwrap();
        let reference = dir.path().join("reference.csv");
        fs::write(&reference, &master).unwrap();
        run_master(&config).unwrap();
        check_reference(&config.master(), &reference).unwrap();

        fs::write(&reference, "AC_NO\n").unwrap();
        assert!(matches!(
            check_reference(&config.master(), &reference),
            Err(PipelineError::Whatever { .. })
        ));
    }

    #[test]
    fn analyze_needs_results() {
        init();
        let (_dir, config) = setup();
        assert!(matches!(
            run_analyze(&config),
            Err(PipelineError::Whatever { .. })
        ));
    }

    #[test]
    fn analyze_rejects_a_corrupted_store() {
        init();
        let (_dir, config) = setup();
        fs::write(
            config.results(),
            "AC_NO,AC_NAME,Candidate,Party,Votes,Margin,Status,Total_Votes_Polled,DISTRICT,Total_Votes_Per_District\n\
             1,X,A,P1,10,5,won,15,,\n\
             1,X,B,P2,6,,lost,15,,\n",
        )
        .unwrap();
        assert!(matches!(
            run_analyze(&config),
            Err(PipelineError::Results {
                source: ResultsError::TotalVotesMismatch { .. }
            })
        ));
    }
}
