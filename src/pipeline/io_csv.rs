// Reading and writing the CSV artifacts.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use ac_results::store::merge_batch;
use ac_results::*;

use crate::pipeline::io_common::{display_path, replace_atomically};
use crate::pipeline::*;

/// Reads all the records of a CSV file with a header row.
pub fn read_records<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let p = display_path(path);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path: p.clone() })?;
    let mut res: Vec<T> = Vec::new();
    for (idx, rec) in rdr.deserialize().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let r: T = rec.context(CsvLineParseSnafu {
            path: p.clone(),
            lineno,
        })?;
        res.push(r);
    }
    debug!("read_records: {} records from {}", res.len(), p);
    Ok(res)
}

/// Replaces the file at `path` with the given records.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> PipelineResult<()> {
    let p = display_path(path);
    replace_atomically(path, |f| {
        let mut wtr = csv::Writer::from_writer(f);
        for r in records {
            wtr.serialize(r).context(CsvWriteSnafu { path: p.clone() })?;
        }
        wtr.flush().context(IoSnafu { path: p.clone() })?;
        Ok(())
    })?;
    info!("Wrote {} rows to {}", records.len(), p);
    Ok(())
}

pub fn read_district_mapping(path: &Path) -> PipelineResult<Vec<DistrictMapping>> {
    read_records(path)
}

/// The accumulated results file.
///
/// This is the only writer of the file. A merge reads the whole file, merges
/// in memory and replaces the file in one rename.
pub struct ResultsStore {
    path: PathBuf,
}

impl ResultsStore {
    pub fn new(path: &Path) -> ResultsStore {
        ResultsStore {
            path: path.to_path_buf(),
        }
    }

    /// The accumulated rows. A missing file is an empty store.
    pub fn load(&self) -> PipelineResult<Vec<CandidateResult>> {
        match read_records(&self.path) {
            Err(PipelineError::CsvOpen { source, .. }) if is_not_found(&source) => {
                info!(
                    "No results file at {}: starting from an empty store",
                    display_path(&self.path)
                );
                Ok(Vec::new())
            }
            x => x,
        }
    }

    /// Merges new rows into the store and returns the merged rows.
    ///
    /// Rows already stored take precedence over new rows with the same key.
    pub fn merge_batch(
        &self,
        new_rows: Vec<CandidateResult>,
    ) -> PipelineResult<Vec<CandidateResult>> {
        let existing = self.load()?;
        self.replace_merged(existing, new_rows)
    }

    /// Replaces the store with `existing` merged with `new_rows`.
    ///
    /// `existing` must be the content returned by `load` in the same run.
    pub fn replace_merged(
        &self,
        existing: Vec<CandidateResult>,
        new_rows: Vec<CandidateResult>,
    ) -> PipelineResult<Vec<CandidateResult>> {
        let merged = merge_batch(existing, new_rows);
        write_records(&self.path, &merged)?;
        Ok(merged)
    }
}

fn is_not_found(e: &csv::Error) -> bool {
    matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound)
}

/// A row of the margin bucket file.
#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct MarginBucketRecord {
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
    #[serde(rename = "Margin_Bucket")]
    pub margin_bucket: Option<MarginBucket>,
    #[serde(rename = "<500")]
    pub under_500: u8,
    #[serde(rename = "0.5-2K")]
    pub from_500_to_2k: u8,
    #[serde(rename = "2_10K")]
    pub from_2k_to_10k: u8,
    #[serde(rename = "10_25K")]
    pub from_10k_to_25k: u8,
    #[serde(rename = "25_50K")]
    pub from_25k_to_50k: u8,
    #[serde(rename = "50K_plus")]
    pub over_50k: u8,
    #[serde(rename = "Multi_Cornered_Count")]
    pub multi_cornered_count: u32,
}

impl From<&MarginBucketRow> for MarginBucketRecord {
    fn from(m: &MarginBucketRow) -> Self {
        let r = &m.result;
        let flags = m.one_hot();
        MarginBucketRecord {
            constituency_id: r.constituency_id,
            constituency_name: r.constituency_name.clone(),
            candidate_name: r.candidate_name.clone(),
            party_name: r.party_name.clone(),
            votes: r.votes,
            margin: r.margin,
            status: r.status,
            total_votes_polled: r.total_votes_polled,
            district: r.district.clone(),
            total_votes_per_district: r.total_votes_per_district,
            margin_bucket: m.bucket,
            under_500: flags[0],
            from_500_to_2k: flags[1],
            from_2k_to_10k: flags[2],
            from_10k_to_25k: flags[3],
            from_25k_to_50k: flags[4],
            over_50k: flags[5],
            multi_cornered_count: m.multi_cornered_count,
        }
    }
}

impl From<MarginBucketRecord> for MarginBucketRow {
    // The indicator columns are derived from the bucket and not read back.
    fn from(m: MarginBucketRecord) -> Self {
        MarginBucketRow {
            result: CandidateResult {
                constituency_id: m.constituency_id,
                constituency_name: m.constituency_name,
                candidate_name: m.candidate_name,
                party_name: m.party_name,
                votes: m.votes,
                margin: m.margin,
                status: m.status,
                total_votes_polled: m.total_votes_polled,
                district: m.district,
                total_votes_per_district: m.total_votes_per_district,
            },
            bucket: m.margin_bucket,
            multi_cornered_count: m.multi_cornered_count,
        }
    }
}

pub fn write_margin_buckets(path: &Path, rows: &[MarginBucketRow]) -> PipelineResult<()> {
    let records: Vec<MarginBucketRecord> = rows.iter().map(MarginBucketRecord::from).collect();
    write_records(path, &records)
}

pub fn read_margin_buckets(path: &Path) -> PipelineResult<Vec<MarginBucketRow>> {
    let records: Vec<MarginBucketRecord> = read_records(path)?;
    Ok(records.into_iter().map(MarginBucketRow::from).collect())
}

pub fn write_party_metrics(path: &Path, parties: &[PartyMetrics]) -> PipelineResult<()> {
    write_records(path, parties)
}

pub fn read_party_metrics(path: &Path) -> PipelineResult<Vec<PartyMetrics>> {
    read_records(path)
}

/// A row of the master dataset. Empty cells stand for missing values.
#[derive(PartialEq, Debug, Clone, Serialize)]
pub struct MasterCsvRecord {
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
    #[serde(rename = "Margin_Bucket")]
    pub margin_bucket: Option<MarginBucket>,
    #[serde(rename = "<500")]
    pub under_500: Option<u8>,
    #[serde(rename = "0.5-2K")]
    pub from_500_to_2k: Option<u8>,
    #[serde(rename = "2_10K")]
    pub from_2k_to_10k: Option<u8>,
    #[serde(rename = "10_25K")]
    pub from_10k_to_25k: Option<u8>,
    #[serde(rename = "25_50K")]
    pub from_25k_to_50k: Option<u8>,
    #[serde(rename = "50K_plus")]
    pub over_50k: Option<u8>,
    #[serde(rename = "Multi_Cornered_Count")]
    pub multi_cornered_count: Option<u32>,
    #[serde(rename = "Vote_Percent")]
    pub vote_percent: Option<f64>,
    #[serde(rename = "Is_Multi_Cornered")]
    pub is_multi_cornered: u8,
    #[serde(rename = "Party_Total_Votes")]
    pub party_total_votes: Option<u64>,
    #[serde(rename = "Party_Vote_Share_%")]
    pub party_vote_share: Option<f64>,
    #[serde(rename = "Party_Constituencies_Contested")]
    pub party_constituencies_contested: Option<u32>,
    #[serde(rename = "Party_Seats_Won")]
    pub party_seats_won: Option<u32>,
    #[serde(rename = "Party_Conversion_Percentage")]
    pub party_conversion_percentage: Option<f64>,
    #[serde(rename = "Wasted_Votes")]
    pub wasted_votes: u64,
    #[serde(rename = "Effective_Votes")]
    pub effective_votes: u64,
    /// Empty when the party won no seat.
    #[serde(rename = "Votes_per_Seat")]
    pub votes_per_seat: Option<f64>,
}

impl From<&MasterRecord> for MasterCsvRecord {
    fn from(m: &MasterRecord) -> Self {
        let r = &m.result;
        let flag = |idx: usize| m.bucket_flags.map(|f| f[idx]);
        let party = m.party.as_ref();
        MasterCsvRecord {
            constituency_id: r.constituency_id,
            constituency_name: r.constituency_name.clone(),
            candidate_name: r.candidate_name.clone(),
            party_name: r.party_name.clone(),
            votes: r.votes,
            margin: r.margin,
            status: r.status,
            total_votes_polled: r.total_votes_polled,
            district: r.district.clone(),
            total_votes_per_district: r.total_votes_per_district,
            margin_bucket: m.margin_bucket,
            under_500: flag(0),
            from_500_to_2k: flag(1),
            from_2k_to_10k: flag(2),
            from_10k_to_25k: flag(3),
            from_25k_to_50k: flag(4),
            over_50k: flag(5),
            multi_cornered_count: m.multi_cornered_count,
            vote_percent: m.vote_percent,
            is_multi_cornered: m.is_multi_cornered,
            party_total_votes: party.map(|p| p.total_votes),
            party_vote_share: party.map(|p| p.vote_share),
            party_constituencies_contested: party.map(|p| p.constituencies_contested),
            party_seats_won: party.map(|p| p.seats_won),
            party_conversion_percentage: party.map(|p| p.conversion_percentage),
            wasted_votes: m.wasted_votes,
            effective_votes: m.effective_votes,
            votes_per_seat: m.votes_per_seat.value(),
        }
    }
}

pub fn write_master(path: &Path, records: &[MasterRecord]) -> PipelineResult<()> {
    let rows: Vec<MasterCsvRecord> = records.iter().map(MasterCsvRecord::from).collect();
    write_records(path, &rows)
}
