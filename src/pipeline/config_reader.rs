use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::pipeline::io_common::{display_path, resolve_path};
use crate::pipeline::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    /// URL of a constituency page, with `{}` in place of the constituency id.
    #[serde(rename = "sourceUrlTemplate")]
    pub source_url_template: Option<String>,
    /// Saved pages, read instead of the website when set.
    #[serde(rename = "pageDirectory")]
    pub page_directory: Option<String>,
    #[serde(rename = "firstConstituency")]
    pub first_constituency: u32,
    /// Exclusive.
    #[serde(rename = "lastConstituency")]
    pub last_constituency: u32,
    #[serde(rename = "pauseMillis")]
    pub pause_millis: Option<u64>,
    #[serde(rename = "districtMappingPath")]
    pub district_mapping_path: String,
    #[serde(rename = "resultsPath")]
    pub results_path: Option<String>,
    #[serde(rename = "marginBucketsPath")]
    pub margin_buckets_path: Option<String>,
    #[serde(rename = "partyMetricsPath")]
    pub party_metrics_path: Option<String>,
    #[serde(rename = "masterPath")]
    pub master_path: Option<String>,

    /// The directory of the configuration file.
    #[serde(skip)]
    pub root: PathBuf,
}

pub const DEFAULT_PAUSE_MILLIS: u64 = 2000;

impl PipelineConfig {
    fn path_or(&self, p: &Option<String>, default: &str) -> PathBuf {
        resolve_path(&self.root, p.as_deref().unwrap_or(default))
    }

    pub fn district_mapping(&self) -> PathBuf {
        resolve_path(&self.root, &self.district_mapping_path)
    }

    pub fn results(&self) -> PathBuf {
        self.path_or(&self.results_path, "results.csv")
    }

    pub fn margin_buckets(&self) -> PathBuf {
        self.path_or(&self.margin_buckets_path, "margin_buckets.csv")
    }

    pub fn party_metrics(&self) -> PathBuf {
        self.path_or(&self.party_metrics_path, "party_metrics.csv")
    }

    pub fn master(&self) -> PathBuf {
        self.path_or(&self.master_path, "master.csv")
    }

    pub fn page_directory(&self) -> Option<PathBuf> {
        self.page_directory
            .as_ref()
            .map(|p| resolve_path(&self.root, p))
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_millis.unwrap_or(DEFAULT_PAUSE_MILLIS))
    }
}

pub fn read_config(path: &Path) -> PipelineResult<PipelineConfig> {
    let p = display_path(path);
    let config_str = fs::read_to_string(path).context(OpeningConfigSnafu { path: p.clone() })?;
    let mut config: PipelineConfig =
        serde_json::from_str(&config_str).context(ParsingConfigSnafu { path: p })?;
    config.root = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if config.first_constituency >= config.last_constituency {
        whatever!(
            "Empty constituency range: {}..{}",
            config.first_constituency,
            config.last_constituency
        );
    }
    debug!("read_config: {:?}", config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("bihar.json");
        fs::write(
            &p,
            r#"{
                "contestName": "Bihar 2025",
                "sourceUrlTemplate": "https://results.example/candidateswise-S04{}.htm",
                "firstConstituency": 1,
                "lastConstituency": 244,
                "districtMappingPath": "ac_district.csv"
            }"#,
        )
        .unwrap();
        let config = read_config(&p).unwrap();
        assert_eq!(config.contest_name, "Bihar 2025");
        assert_eq!(config.root, dir.path());
        assert_eq!(config.pause(), Duration::from_millis(2000));
        assert_eq!(config.district_mapping(), dir.path().join("ac_district.csv"));
        assert_eq!(config.results(), dir.path().join("results.csv"));
        assert_eq!(config.master(), dir.path().join("master.csv"));
        assert_eq!(config.page_directory(), None);
    }

    #[test]
    fn explicit_paths() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("c.json");
        fs::write(
            &p,
            r#"{
                "contestName": "x",
                "pageDirectory": "pages",
                "firstConstituency": 3,
                "lastConstituency": 4,
                "pauseMillis": 0,
                "districtMappingPath": "/srv/mapping.csv",
                "resultsPath": "out/all.csv"
            }"#,
        )
        .unwrap();
        let config = read_config(&p).unwrap();
        assert_eq!(config.pause(), Duration::from_millis(0));
        assert_eq!(config.district_mapping(), PathBuf::from("/srv/mapping.csv"));
        assert_eq!(config.results(), dir.path().join("out").join("all.csv"));
        assert_eq!(config.page_directory(), Some(dir.path().join("pages")));
    }

    #[test]
    fn bad_configs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_config(&dir.path().join("missing.json")),
            Err(PipelineError::OpeningConfig { .. })
        ));

        let p = dir.path().join("bad.json");
        fs::write(&p, r#"{"contestName": "x"}"#).unwrap();
        assert!(matches!(
            read_config(&p),
            Err(PipelineError::ParsingConfig { .. })
        ));

        fs::write(
            &p,
            r#"{"contestName": "x", "firstConstituency": 5, "lastConstituency": 5,
                "districtMappingPath": "m.csv"}"#,
        )
        .unwrap();
        assert!(matches!(read_config(&p), Err(PipelineError::Whatever { .. })));
    }
}
