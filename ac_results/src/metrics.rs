// Derived views over the accumulated results.
// Every view is recomputed from the full table, never from earlier outputs.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::*;

/// The margin bucket edges used for one computation.
///
/// The top bucket is closed by the largest winning margin of the dataset
/// (never below its lower edge). This upper edge moves as data accumulates:
/// two runs over different datasets may report different top buckets.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct MarginBins {
    pub edges: [i64; 5],
    pub upper: i64,
}

impl MarginBins {
    pub fn observe(rows: &[CandidateResult], rules: &MetricsRules) -> MarginBins {
        let last_edge = rules.bucket_edges[rules.bucket_edges.len() - 1];
        let observed = rows
            .iter()
            .filter(|r| r.status.is_won())
            .filter_map(|r| r.margin)
            .max();
        let upper = observed.map(|m| m.max(last_edge)).unwrap_or(last_edge);
        debug!(
            "MarginBins::observe: observed max {:?}, upper edge {}",
            observed, upper
        );
        MarginBins {
            edges: rules.bucket_edges,
            upper,
        }
    }

    /// Buckets are `[0, 500)`, `[500, 2000)`, ... and `[50000, upper]`.
    /// Negative margins and margins above the upper edge have no bucket.
    pub fn bucket(&self, margin: i64) -> Option<MarginBucket> {
        if margin < 0 || margin > self.upper {
            return None;
        }
        let idx = self.edges.iter().take_while(|e| margin >= **e).count();
        Some(MarginBucket::ALL[idx])
    }
}

/// The winners of the dataset, classified by margin.
#[derive(PartialEq, Debug, Clone)]
pub struct MarginBucketView {
    pub bins: MarginBins,
    pub rows: Vec<MarginBucketRow>,
}

/// All the derived views of one dataset.
#[derive(PartialEq, Debug, Clone)]
pub struct Metrics {
    pub parties: Vec<PartyMetrics>,
    pub margins: MarginBucketView,
}

pub fn compute_metrics(
    rows: &[CandidateResult],
    rules: &MetricsRules,
) -> Result<Metrics, ResultsError> {
    info!("compute_metrics: {} rows", rows.len());
    let parties = party_metrics(rows)?;
    let margins = margin_buckets(rows, rules);
    Ok(Metrics { parties, margins })
}

#[derive(Default)]
struct PartyAcc {
    votes: u64,
    contested: HashSet<u32>,
    seats_won: u32,
}

/// Vote and seat statistics per party, by decreasing number of votes.
///
/// Fails if a party appears to have won more seats than it contested, which
/// only happens when the table has several winners in one constituency.
pub fn party_metrics(rows: &[CandidateResult]) -> Result<Vec<PartyMetrics>, ResultsError> {
    let mut parties: BTreeMap<&str, PartyAcc> = BTreeMap::new();
    for r in rows {
        let acc = parties.entry(r.party_name.as_str()).or_default();
        acc.votes += r.votes;
        acc.contested.insert(r.constituency_id);
        if r.status.is_won() {
            acc.seats_won += 1;
        }
    }
    let total_votes: u64 = rows.iter().map(|r| r.votes).sum();

    let mut res: Vec<PartyMetrics> = Vec::with_capacity(parties.len());
    for (party_name, acc) in parties {
        let contested = acc.contested.len() as u32;
        if acc.seats_won > contested {
            return Err(ResultsError::SeatsExceedContested {
                party_name: party_name.to_string(),
                seats_won: acc.seats_won,
                contested,
            });
        }
        let vote_share = if total_votes == 0 {
            0.0
        } else {
            acc.votes as f64 / total_votes as f64 * 100.0
        };
        res.push(PartyMetrics {
            party_name: party_name.to_string(),
            total_votes: acc.votes,
            vote_share,
            constituencies_contested: contested,
            seats_won: acc.seats_won,
            conversion_percentage: round2(acc.seats_won as f64 / contested as f64 * 100.0),
        });
    }
    // The map is ordered by name: the sort is stable on ties.
    res.sort_by(|a, b| b.total_votes.cmp(&a.total_votes));
    Ok(res)
}

/// For each constituency, the number of candidates whose share of the vote is
/// strictly above the multi-cornered share.
///
/// Constituencies where nobody qualifies are absent from the map; see
/// `multi_cornered_count` for the default.
pub fn multi_cornered_counts(
    rows: &[CandidateResult],
    rules: &MetricsRules,
) -> HashMap<u32, u32> {
    let mut counts: HashMap<u32, u32> = HashMap::new();
    for r in rows {
        // Integer comparison of votes / total > percent / 100.
        if r.total_votes_polled > 0
            && r.votes * 100 > r.total_votes_polled * rules.multi_cornered_share_percent
        {
            *counts.entry(r.constituency_id).or_default() += 1;
        }
    }
    counts
}

pub fn multi_cornered_count(
    counts: &HashMap<u32, u32>,
    constituency_id: u32,
    rules: &MetricsRules,
) -> u32 {
    counts
        .get(&constituency_id)
        .copied()
        .unwrap_or(rules.multi_cornered_default_count)
}

/// Classifies every winner by margin and attaches the multi-cornered count of
/// its constituency.
pub fn margin_buckets(rows: &[CandidateResult], rules: &MetricsRules) -> MarginBucketView {
    let bins = MarginBins::observe(rows, rules);
    let counts = multi_cornered_counts(rows, rules);
    let mut res: Vec<MarginBucketRow> = Vec::new();
    for r in rows.iter().filter(|r| r.status.is_won()) {
        let bucket = r.margin.and_then(|m| bins.bucket(m));
        if bucket.is_none() {
            warn!(
                "margin_buckets: winner {:?} of constituency {} has no usable margin ({:?})",
                r.candidate_name, r.constituency_id, r.margin
            );
        }
        res.push(MarginBucketRow {
            result: r.clone(),
            bucket,
            multi_cornered_count: multi_cornered_count(&counts, r.constituency_id, rules),
        });
    }
    info!(
        "margin_buckets: {} winners, top bucket closed at {}",
        res.len(),
        bins.upper
    );
    MarginBucketView { bins, rows: res }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::aggregate_constituency;

    fn entry(
        name: &str,
        party: &str,
        votes: u64,
        margin: Option<i64>,
        won: bool,
    ) -> CandidateEntry {
        CandidateEntry {
            candidate_name: name.to_string(),
            party_name: party.to_string(),
            votes,
            margin,
            status: if won { Status::Won } else { Status::Lost },
        }
    }

    fn example_rows() -> Vec<CandidateResult> {
        aggregate_constituency(
            1,
            "Valmiki Nagar",
            &[
                entry("A", "P1", 50_000, Some(12_000), true),
                entry("B", "P2", 38_000, Some(-12_000), false),
                entry("C", "P3", 5_000, Some(-45_000), false),
            ],
        )
        .unwrap()
        .rows
    }

    fn bins(upper: i64) -> MarginBins {
        MarginBins {
            edges: MetricsRules::DEFAULT_RULES.bucket_edges,
            upper,
        }
    }

    #[test]
    fn three_candidate_example() {
        let rows = example_rows();
        assert_eq!(rows[0].total_votes_polled, 93_000);
        assert_eq!(rows[0].vote_percent(), Some(53.76));
        let view = margin_buckets(&rows, &MetricsRules::DEFAULT_RULES);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].bucket, Some(MarginBucket::From10KTo25K));
        assert_eq!(view.rows[0].one_hot(), [0, 0, 0, 1, 0, 0]);
        assert_eq!(view.rows[0].multi_cornered_count, 2);
    }

    #[test]
    fn bucket_boundaries_are_inclusive_lowest() {
        let b = bins(80_000);
        assert_eq!(b.bucket(0), Some(MarginBucket::Under500));
        assert_eq!(b.bucket(499), Some(MarginBucket::Under500));
        assert_eq!(b.bucket(500), Some(MarginBucket::From500To2K));
        assert_eq!(b.bucket(1_999), Some(MarginBucket::From500To2K));
        assert_eq!(b.bucket(2_000), Some(MarginBucket::From2KTo10K));
        assert_eq!(b.bucket(10_000), Some(MarginBucket::From10KTo25K));
        assert_eq!(b.bucket(25_000), Some(MarginBucket::From25KTo50K));
        assert_eq!(b.bucket(49_999), Some(MarginBucket::From25KTo50K));
        assert_eq!(b.bucket(50_000), Some(MarginBucket::Over50K));
        assert_eq!(b.bucket(80_000), Some(MarginBucket::Over50K));
        assert_eq!(b.bucket(80_001), None);
        assert_eq!(b.bucket(-1), None);
    }

    #[test]
    fn every_margin_up_to_upper_has_one_bucket() {
        let b = bins(60_000);
        let mut previous = MarginBucket::Under500;
        for m in (0..=60_000).step_by(7) {
            let bucket = b.bucket(m).unwrap();
            // Contiguous: buckets only move forward one step at a time.
            assert!(bucket.index() == previous.index() || bucket.index() == previous.index() + 1);
            previous = bucket;
        }
        assert_eq!(previous, MarginBucket::Over50K);
    }

    #[test]
    fn upper_edge_follows_the_data() {
        let rules = MetricsRules::DEFAULT_RULES;
        let small = example_rows();
        assert_eq!(MarginBins::observe(&small, &rules).upper, 50_000);

        let mut large = small.clone();
        large.extend(
            aggregate_constituency(2, "X", &[entry("D", "P1", 90_000, Some(70_000), true)])
                .unwrap()
                .rows,
        );
        // Losers' margins are not considered.
        large[1].margin = Some(100_000);
        assert_eq!(MarginBins::observe(&large, &rules).upper, 70_000);
    }

    #[test]
    fn winner_without_margin_has_no_bucket() {
        let rows = aggregate_constituency(
            5,
            "X",
            &[entry("A", "P1", 10, None, true), entry("B", "P2", 5, None, false)],
        )
        .unwrap()
        .rows;
        let view = margin_buckets(&rows, &MetricsRules::DEFAULT_RULES);
        assert_eq!(view.rows[0].bucket, None);
        assert_eq!(view.rows[0].one_hot(), [0; 6]);
    }

    #[test]
    fn multi_cornered_share_is_strict() {
        // 100 of 1000 is exactly 10 %, which does not count.
        let rows = aggregate_constituency(
            3,
            "X",
            &[
                entry("A", "P1", 500, Some(100), true),
                entry("B", "P2", 400, None, false),
                entry("C", "P3", 100, None, false),
            ],
        )
        .unwrap()
        .rows;
        let counts = multi_cornered_counts(&rows, &MetricsRules::DEFAULT_RULES);
        assert_eq!(counts.get(&3), Some(&2));
    }

    #[test]
    fn multi_cornered_defaults_to_one() {
        // Nobody polled any vote, so no candidate passes the share.
        let rows = aggregate_constituency(
            8,
            "X",
            &[entry("A", "P1", 0, Some(0), true), entry("B", "P2", 0, None, false)],
        )
        .unwrap()
        .rows;
        let view = margin_buckets(&rows, &MetricsRules::DEFAULT_RULES);
        assert_eq!(view.rows[0].multi_cornered_count, 1);
    }

    #[test]
    fn party_metrics_conversion() {
        let mut rows = example_rows();
        rows.extend(
            aggregate_constituency(
                2,
                "Y",
                &[
                    entry("D", "P2", 30_000, Some(1_000), true),
                    entry("E", "P1", 29_000, None, false),
                ],
            )
            .unwrap()
            .rows,
        );
        rows.extend(
            aggregate_constituency(
                3,
                "Z",
                &[
                    entry("F", "P1", 20_000, Some(2_000), true),
                    entry("G", "P2", 18_000, None, false),
                ],
            )
            .unwrap()
            .rows,
        );
        let parties = party_metrics(&rows).unwrap();
        let names: Vec<&str> = parties.iter().map(|p| p.party_name.as_str()).collect();
        assert_eq!(names, vec!["P1", "P2", "P3"]);

        let p1 = &parties[0];
        assert_eq!(p1.total_votes, 99_000);
        assert_eq!(p1.constituencies_contested, 3);
        assert_eq!(p1.seats_won, 2);
        assert_eq!(p1.conversion_percentage, 66.67);

        let p3 = &parties[2];
        assert_eq!(p3.seats_won, 0);
        assert_eq!(p3.conversion_percentage, 0.0);

        let share: f64 = parties.iter().map(|p| p.vote_share).sum();
        assert!((share - 100.0).abs() < 1e-9);
        for p in parties.iter() {
            assert!(p.seats_won <= p.constituencies_contested);
            assert!((0.0..=100.0).contains(&p.conversion_percentage));
        }
    }

    #[test]
    fn party_with_too_many_seats_is_an_error() {
        let mut rows = example_rows();
        rows[1].party_name = "P1".to_string();
        rows[1].status = Status::Won;
        assert_eq!(
            party_metrics(&rows),
            Err(ResultsError::SeatsExceedContested {
                party_name: "P1".to_string(),
                seats_won: 2,
                contested: 1
            })
        );
    }
}
