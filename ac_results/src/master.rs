// The master dataset: every candidate result with the margin and party views
// joined in, plus the per-row vote indicators.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};

use crate::config::*;

/// Left-joins the margin rows (on the result key) and the party metrics (on
/// the party name) onto the results. The output has one record per result, in
/// the order of `results`.
pub fn build_master(
    results: &[CandidateResult],
    margins: &[MarginBucketRow],
    parties: &[PartyMetrics],
    rules: &MetricsRules,
) -> Vec<MasterRecord> {
    let mut margins_by_key: HashMap<ResultKey, &MarginBucketRow> = HashMap::new();
    for m in margins {
        margins_by_key.entry(m.result.key()).or_insert(m);
    }
    let mut parties_by_name: HashMap<&str, &PartyMetrics> = HashMap::new();
    for p in parties {
        parties_by_name.entry(p.party_name.as_str()).or_insert(p);
    }
    debug!(
        "build_master: {} results, {} margin rows, {} parties",
        results.len(),
        margins_by_key.len(),
        parties_by_name.len()
    );

    results
        .iter()
        .map(|r| {
            master_record(
                r,
                margins_by_key.get(&r.key()).copied(),
                parties_by_name.get(r.party_name.as_str()).copied(),
                rules,
            )
        })
        .collect()
}

/// Computes the master record of a single result.
pub fn master_record(
    result: &CandidateResult,
    margin: Option<&MarginBucketRow>,
    party: Option<&PartyMetrics>,
    rules: &MetricsRules,
) -> MasterRecord {
    let multi_cornered_count = margin.map(|m| m.multi_cornered_count);
    let is_multi_cornered = match multi_cornered_count {
        Some(c) if c >= rules.multi_cornered_flag_threshold => 1,
        _ => 0,
    };
    let (wasted_votes, effective_votes) = if result.status.is_won() {
        (0, result.votes)
    } else {
        (result.votes, 0)
    };
    let votes_per_seat = match party {
        Some(p) if p.seats_won > 0 => {
            VotesPerSeat::Value(p.total_votes as f64 / p.seats_won as f64)
        }
        _ => VotesPerSeat::NotApplicable,
    };
    MasterRecord {
        result: result.clone(),
        margin_bucket: margin.and_then(|m| m.bucket),
        bucket_flags: margin.map(|m| m.one_hot()),
        multi_cornered_count,
        vote_percent: result.vote_percent(),
        is_multi_cornered,
        party: party.cloned(),
        wasted_votes,
        effective_votes,
        votes_per_seat,
    }
}

/// The median vote percentage of the winners, and for each party how many of
/// its winners are strictly below it. Winners without a vote percentage count
/// as above the median.
///
/// Returns nothing when there is no winner with a vote percentage.
pub fn median_report(records: &[MasterRecord]) -> Option<MedianReport> {
    let winners: Vec<&MasterRecord> = records
        .iter()
        .filter(|r| r.result.status.is_won())
        .collect();
    let mut percents: Vec<f64> = winners.iter().filter_map(|r| r.vote_percent).collect();
    if percents.is_empty() {
        return None;
    }
    percents.sort_by(|a, b| a.total_cmp(b));
    let mid = percents.len() / 2;
    let median_vote_percent = if percents.len() % 2 == 0 {
        (percents[mid - 1] + percents[mid]) / 2.0
    } else {
        percents[mid]
    };

    let mut splits: BTreeMap<&str, PartyMedianSplit> = BTreeMap::new();
    for w in winners {
        let name = w.result.party_name.as_str();
        let split = splits.entry(name).or_insert_with(|| PartyMedianSplit {
            party_name: name.to_string(),
            below_median: 0,
            above_median: 0,
        });
        match w.vote_percent {
            Some(vp) if vp < median_vote_percent => split.below_median += 1,
            _ => split.above_median += 1,
        }
    }
    info!(
        "median_report: median winner vote percentage is {}",
        median_vote_percent
    );
    Some(MedianReport {
        median_vote_percent,
        parties: splits.into_values().collect(),
    })
}
