use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Eq, PartialEq, Debug, Clone, Copy)]
pub enum Stage {
    /// Fetch the constituency pages and merge them into the results file.
    Ingest,
    /// Recompute the margin buckets, the party metrics and the master dataset.
    Analyze,
    /// Rebuild the master dataset from the files written by the analyze stage.
    Master,
    /// Ingest, then analyze.
    All,
}

/// Collects assembly constituency results and computes the derived datasets.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON configuration of the contest. Relative paths in this file are
    /// resolved against its directory.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (default all) The stage to run.
    #[clap(short, long, value_enum, default_value = "all")]
    pub stage: Stage,

    /// (optional) The first constituency to ingest. Overrides firstConstituency.
    #[clap(long, value_parser)]
    pub first: Option<u32>,

    /// (optional) The constituency after the last one to ingest. Overrides lastConstituency.
    #[clap(long, value_parser)]
    pub last: Option<u32>,

    /// (directory, optional) Read the pages saved as <constituency id>.htm in this directory
    /// instead of fetching them. Overrides pageDirectory.
    #[clap(short, long, value_parser)]
    pub pages: Option<String>,

    /// (file path) A reference master dataset in CSV format. If provided, acresults will
    /// check that the master dataset matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
