use std::collections::HashSet;

pub use crate::config::*;

use log::debug;

/// A builder for the candidates of one constituency.
///
/// ```
/// use ac_results::builder::ConstituencyBuilder;
/// use ac_results::{ResultsError, Status};
///
/// let mut builder = ConstituencyBuilder::new(1, "Valmiki Nagar");
/// builder.add_candidate_simple("Anna", "ABC", 50_000, Status::Won)?;
/// builder.add_candidate_simple("Bob", "XYZ", 38_000, Status::Lost)?;
/// let batch = builder.build()?;
/// assert_eq!(batch.rows[0].total_votes_polled, 88_000);
///
/// # Ok::<(), ResultsError>(())
/// ```
pub struct ConstituencyBuilder {
    pub(crate) _constituency_id: u32,
    pub(crate) _constituency_name: String,
    pub(crate) _candidates: Vec<CandidateEntry>,
}

impl ConstituencyBuilder {
    pub fn new(constituency_id: u32, constituency_name: &str) -> ConstituencyBuilder {
        ConstituencyBuilder {
            _constituency_id: constituency_id,
            _constituency_name: constituency_name.to_string(),
            _candidates: Vec::new(),
        }
    }

    /// Adds a candidate without a margin.
    pub fn add_candidate_simple(
        &mut self,
        candidate_name: &str,
        party_name: &str,
        votes: u64,
        status: Status,
    ) -> Result<(), ResultsError> {
        self.add_candidate(&CandidateEntry {
            candidate_name: candidate_name.to_string(),
            party_name: party_name.to_string(),
            votes,
            margin: None,
            status,
        })
    }

    pub fn add_candidate(&mut self, entry: &CandidateEntry) -> Result<(), ResultsError> {
        self._candidates.push(entry.clone());
        Ok(())
    }

    pub fn build(&self) -> Result<ConstituencyBatch, ResultsError> {
        aggregate_constituency(
            self._constituency_id,
            &self._constituency_name,
            &self._candidates,
        )
    }
}

/// Attaches the constituency total to every candidate.
///
/// Fails when the constituency does not have exactly one winner, or when two
/// candidates share a name and a party: such a page is a data quality problem
/// and is never repaired here.
pub fn aggregate_constituency(
    constituency_id: u32,
    constituency_name: &str,
    candidates: &[CandidateEntry],
) -> Result<ConstituencyBatch, ResultsError> {
    if candidates.is_empty() {
        return Err(ResultsError::EmptyBatch { constituency_id });
    }
    let winners = candidates.iter().filter(|c| c.status.is_won()).count();
    if winners != 1 {
        return Err(ResultsError::WinnerCount {
            constituency_id,
            winners,
        });
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::with_capacity(candidates.len());
    for c in candidates {
        if !seen.insert((c.candidate_name.as_str(), c.party_name.as_str())) {
            return Err(ResultsError::DuplicateCandidate {
                constituency_id,
                candidate_name: c.candidate_name.clone(),
                party_name: c.party_name.clone(),
            });
        }
    }

    let total_votes_polled: u64 = candidates.iter().map(|c| c.votes).sum();
    debug!(
        "aggregate_constituency: {} ({:?}): {} candidates, {} votes",
        constituency_id,
        constituency_name,
        candidates.len(),
        total_votes_polled
    );

    let rows = candidates
        .iter()
        .map(|c| CandidateResult {
            constituency_id,
            constituency_name: constituency_name.to_string(),
            candidate_name: c.candidate_name.clone(),
            party_name: c.party_name.clone(),
            votes: c.votes,
            margin: c.margin,
            status: c.status,
            total_votes_polled,
            district: None,
            total_votes_per_district: None,
        })
        .collect();
    Ok(ConstituencyBatch {
        constituency_id,
        rows,
    })
}
