// Merging new batches into the accumulated results.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info};

use crate::config::*;
use crate::district::with_district_totals;

/// Appends `new_rows` to `existing` and drops every row whose key was already
/// seen, keeping the first occurrence.
///
/// Rows already in the store always win over a re-scraped copy of the same
/// candidate, even when the vote counts differ. The district totals are
/// recomputed over the merged table.
pub fn merge_batch(
    existing: Vec<CandidateResult>,
    new_rows: Vec<CandidateResult>,
) -> Vec<CandidateResult> {
    let num_existing = existing.len();
    let num_new = new_rows.len();
    let mut seen: HashSet<ResultKey> = HashSet::with_capacity(num_existing + num_new);
    let mut merged: Vec<CandidateResult> = Vec::with_capacity(num_existing + num_new);
    for r in existing.into_iter().chain(new_rows) {
        if seen.insert(r.key()) {
            merged.push(r);
        } else {
            debug!("merge_batch: dropping duplicate {:?}", r.key());
        }
    }
    info!(
        "merge_batch: {} existing rows + {} new rows -> {} rows",
        num_existing,
        num_new,
        merged.len()
    );
    with_district_totals(merged)
}

/// Checks the per-constituency invariants of the accumulated table:
/// one winner, and totals that match the candidate votes.
///
/// All the violations are returned, in constituency order.
pub fn check_invariants(rows: &[CandidateResult]) -> Vec<ResultsError> {
    let mut by_constituency: BTreeMap<u32, Vec<&CandidateResult>> = BTreeMap::new();
    for r in rows {
        by_constituency.entry(r.constituency_id).or_default().push(r);
    }
    let mut errors: Vec<ResultsError> = Vec::new();
    for (constituency_id, crows) in by_constituency {
        let winners = crows.iter().filter(|r| r.status.is_won()).count();
        if winners != 1 {
            errors.push(ResultsError::WinnerCount {
                constituency_id,
                winners,
            });
        }
        let expected: u64 = crows.iter().map(|r| r.votes).sum();
        if let Some(bad) = crows.iter().find(|r| r.total_votes_polled != expected) {
            errors.push(ResultsError::TotalVotesMismatch {
                constituency_id,
                expected,
                found: bad.total_votes_polled,
            });
        }
    }
    errors
}
