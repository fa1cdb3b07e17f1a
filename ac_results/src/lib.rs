mod config;
use log::{info, warn};

pub use crate::config::*;

pub mod builder;
pub mod district;
pub mod manual;
pub mod master;
pub mod metrics;
pub mod store;

pub use crate::metrics::{MarginBins, MarginBucketView, Metrics};

/// The derived tables of one analysis run.
#[derive(PartialEq, Debug, Clone)]
pub struct Analysis {
    pub metrics: Metrics,
    pub master: Vec<MasterRecord>,
    pub median: Option<MedianReport>,
}

/// Runs the full analysis over the accumulated results.
///
/// Arguments:
/// * `results` the complete accumulated table (not only the latest batch)
/// * `rules` the thresholds of the derived metrics
///
/// The table is checked first: a constituency without exactly one winner, or
/// whose totals do not match, aborts the analysis. All the violations are
/// logged before the first one is returned.
pub fn run_analysis(
    results: &[CandidateResult],
    rules: &MetricsRules,
) -> Result<Analysis, ResultsError> {
    info!("run_analysis: processing {} results", results.len());
    let violations = store::check_invariants(results);
    if let Some(first) = violations.first() {
        for v in violations.iter() {
            warn!("run_analysis: {}", v);
        }
        return Err(first.clone());
    }

    let metrics = metrics::compute_metrics(results, rules)?;
    let master = master::build_master(
        results,
        &metrics.margins.rows,
        &metrics.parties,
        rules,
    );
    let median = master::median_report(&master);
    Ok(Analysis {
        metrics,
        master,
        median,
    })
}
