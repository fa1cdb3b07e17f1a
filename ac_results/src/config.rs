// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// The outcome of a candidate, as printed on the results page.
///
/// The page strings are matched case-sensitively: only `won` and `lost` are
/// accepted.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "won")]
    Won,
    #[serde(rename = "lost")]
    Lost,
}

impl Status {
    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "won" => Some(Status::Won),
            "lost" => Some(Status::Lost),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Won => "won",
            Status::Lost => "lost",
        }
    }

    pub fn is_won(&self) -> bool {
        matches!(self, Status::Won)
    }
}

/// A candidate as read from one constituency page, before the constituency
/// totals are known.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateEntry {
    pub candidate_name: String,
    pub party_name: String,
    pub votes: u64,
    /// Only meaningful for the winner. Losing candidates usually carry a
    /// negative value (the distance to the winner).
    pub margin: Option<i64>,
    pub status: Status,
}

/// One candidate in one constituency, as kept in the accumulated store.
///
/// Invariants (checked by the aggregator and by `store::check_invariants`):
/// - exactly one row per `constituency_id` has `Status::Won`
/// - `total_votes_polled` is the sum of `votes` over the rows of the constituency
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    #[serde(rename = "AC_NO")]
    pub constituency_id: u32,
    #[serde(rename = "AC_NAME")]
    pub constituency_name: String,
    #[serde(rename = "Candidate")]
    pub candidate_name: String,
    #[serde(rename = "Party")]
    pub party_name: String,
    #[serde(rename = "Votes")]
    pub votes: u64,
    #[serde(rename = "Margin")]
    pub margin: Option<i64>,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "Total_Votes_Polled")]
    pub total_votes_polled: u64,
    #[serde(rename = "DISTRICT")]
    pub district: Option<String>,
    #[serde(rename = "Total_Votes_Per_District")]
    pub total_votes_per_district: Option<u64>,
}

/// The uniqueness key of the accumulated store.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct ResultKey {
    pub constituency_id: u32,
    pub candidate_name: String,
    pub party_name: String,
}

impl CandidateResult {
    pub fn key(&self) -> ResultKey {
        ResultKey {
            constituency_id: self.constituency_id,
            candidate_name: self.candidate_name.clone(),
            party_name: self.party_name.clone(),
        }
    }

    /// The share of the constituency vote, in percent and rounded to 2 decimals.
    ///
    /// Not defined for a constituency where no vote was polled.
    pub fn vote_percent(&self) -> Option<f64> {
        if self.total_votes_polled == 0 {
            None
        } else {
            Some(round2(
                self.votes as f64 / self.total_votes_polled as f64 * 100.0,
            ))
        }
    }
}

/// All the candidates of one constituency, with the totals attached.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ConstituencyBatch {
    pub constituency_id: u32,
    pub rows: Vec<CandidateResult>,
}

/// One row of the external district mapping table.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DistrictMapping {
    #[serde(rename = "AC_NO")]
    pub constituency_id: u32,
    #[serde(rename = "AC_NAME")]
    pub constituency_name: String,
    #[serde(rename = "DISTRICT")]
    pub district_name: String,
}

// ******** Output data structures *********

/// Winning margin classes.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum MarginBucket {
    #[serde(rename = "<500")]
    Under500,
    #[serde(rename = "0.5-2K")]
    From500To2K,
    #[serde(rename = "2-10K")]
    From2KTo10K,
    #[serde(rename = "10-25K")]
    From10KTo25K,
    #[serde(rename = "25-50K")]
    From25KTo50K,
    #[serde(rename = ">50K")]
    Over50K,
}

impl MarginBucket {
    /// In increasing margin order.
    pub const ALL: [MarginBucket; 6] = [
        MarginBucket::Under500,
        MarginBucket::From500To2K,
        MarginBucket::From2KTo10K,
        MarginBucket::From10KTo25K,
        MarginBucket::From25KTo50K,
        MarginBucket::Over50K,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MarginBucket::Under500 => "<500",
            MarginBucket::From500To2K => "0.5-2K",
            MarginBucket::From2KTo10K => "2-10K",
            MarginBucket::From10KTo25K => "10-25K",
            MarginBucket::From25KTo50K => "25-50K",
            MarginBucket::Over50K => ">50K",
        }
    }

    /// The name of the one-hot indicator column.
    pub fn column(&self) -> &'static str {
        match self {
            MarginBucket::Under500 => "<500",
            MarginBucket::From500To2K => "0.5-2K",
            MarginBucket::From2KTo10K => "2_10K",
            MarginBucket::From10KTo25K => "10_25K",
            MarginBucket::From25KTo50K => "25_50K",
            MarginBucket::Over50K => "50K_plus",
        }
    }

    pub fn from_label(s: &str) -> Option<MarginBucket> {
        MarginBucket::ALL.iter().copied().find(|b| b.label() == s)
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A winning row, classified by margin.
#[derive(PartialEq, Debug, Clone)]
pub struct MarginBucketRow {
    pub result: CandidateResult,
    /// Absent when the winner has no usable margin.
    pub bucket: Option<MarginBucket>,
    /// Number of candidates of the constituency above the multi-cornered share.
    pub multi_cornered_count: u32,
}

impl MarginBucketRow {
    pub fn one_hot(&self) -> [u8; 6] {
        one_hot(self.bucket)
    }
}

pub fn one_hot(bucket: Option<MarginBucket>) -> [u8; 6] {
    let mut flags = [0u8; 6];
    if let Some(b) = bucket {
        flags[b.index()] = 1;
    }
    flags
}

/// Vote and seat statistics of one party over the whole dataset.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PartyMetrics {
    #[serde(rename = "Party")]
    pub party_name: String,
    #[serde(rename = "Votes")]
    pub total_votes: u64,
    #[serde(rename = "Vote_Share_%")]
    pub vote_share: f64,
    #[serde(rename = "Constituencies_Contested")]
    pub constituencies_contested: u32,
    #[serde(rename = "Seats_Won")]
    pub seats_won: u32,
    #[serde(rename = "Conversion_Percentage")]
    pub conversion_percentage: f64,
}

/// Party votes per seat won. A party without seats has no meaningful value.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum VotesPerSeat {
    Value(f64),
    NotApplicable,
}

impl VotesPerSeat {
    pub fn value(&self) -> Option<f64> {
        match self {
            VotesPerSeat::Value(v) => Some(*v),
            VotesPerSeat::NotApplicable => None,
        }
    }
}

/// One candidate result with every derived field attached.
#[derive(PartialEq, Debug, Clone)]
pub struct MasterRecord {
    pub result: CandidateResult,
    // Margin bucket fields, only for winners.
    pub margin_bucket: Option<MarginBucket>,
    pub bucket_flags: Option<[u8; 6]>,
    pub multi_cornered_count: Option<u32>,
    pub vote_percent: Option<f64>,
    pub is_multi_cornered: u8,
    /// Absent when the party is unknown to the party metrics.
    pub party: Option<PartyMetrics>,
    pub wasted_votes: u64,
    pub effective_votes: u64,
    pub votes_per_seat: VotesPerSeat,
}

/// Winners above and below the median winner vote percentage, for one party.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PartyMedianSplit {
    pub party_name: String,
    pub below_median: u32,
    pub above_median: u32,
}

/// Diagnostic summary of the winners' vote percentages. Never persisted.
#[derive(PartialEq, Debug, Clone)]
pub struct MedianReport {
    pub median_vote_percent: f64,
    pub parties: Vec<PartyMedianSplit>,
}

/// Errors raised when the data breaks one of the dataset invariants.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ResultsError {
    EmptyBatch {
        constituency_id: u32,
    },
    WinnerCount {
        constituency_id: u32,
        winners: usize,
    },
    TotalVotesMismatch {
        constituency_id: u32,
        expected: u64,
        found: u64,
    },
    /// Two candidates of one constituency share a name and a party.
    DuplicateCandidate {
        constituency_id: u32,
        candidate_name: String,
        party_name: String,
    },
    SeatsExceedContested {
        party_name: String,
        seats_won: u32,
        contested: u32,
    },
}

impl Error for ResultsError {}

impl Display for ResultsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultsError::EmptyBatch { constituency_id } => {
                write!(f, "constituency {}: no candidate", constituency_id)
            }
            ResultsError::WinnerCount {
                constituency_id,
                winners,
            } => write!(
                f,
                "constituency {}: expected exactly one winner, found {}",
                constituency_id, winners
            ),
            ResultsError::TotalVotesMismatch {
                constituency_id,
                expected,
                found,
            } => write!(
                f,
                "constituency {}: total votes polled is {} but candidate votes sum to {}",
                constituency_id, found, expected
            ),
            ResultsError::DuplicateCandidate {
                constituency_id,
                candidate_name,
                party_name,
            } => write!(
                f,
                "constituency {}: candidate {:?} of party {:?} appears more than once",
                constituency_id, candidate_name, party_name
            ),
            ResultsError::SeatsExceedContested {
                party_name,
                seats_won,
                contested,
            } => write!(
                f,
                "party {}: {} seats won for {} constituencies contested",
                party_name, seats_won, contested
            ),
        }
    }
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MetricsRules {
    /// A candidate counts towards the multi-cornered count when its share of the
    /// constituency vote is strictly above this percentage.
    pub multi_cornered_share_percent: u64,
    /// A contest is flagged as multi-cornered from this count on.
    pub multi_cornered_flag_threshold: u32,
    /// Count given to a constituency where no candidate passes the share.
    pub multi_cornered_default_count: u32,
    /// Lower edges of the margin buckets after the first one, which starts at 0.
    pub bucket_edges: [i64; 5],
}

impl MetricsRules {
    pub const DEFAULT_RULES: MetricsRules = MetricsRules {
        multi_cornered_share_percent: 10,
        multi_cornered_flag_threshold: 3,
        multi_cornered_default_count: 1,
        bucket_edges: [500, 2_000, 10_000, 25_000, 50_000],
    };
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
