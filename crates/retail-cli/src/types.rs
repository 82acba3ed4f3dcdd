use std::path::PathBuf;

use retail_load::{LoadAborted, LoadReport};
use retail_model::SourceKind;
use retail_transform::EnrichmentStats;

/// Where the load stage writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    /// Stop after the file outputs.
    Skip,
    /// In-process warehouse; nothing leaves the machine.
    Memory,
    Postgres,
}

#[derive(Debug)]
pub struct SourceSummary {
    pub kind: SourceKind,
    pub rows: usize,
    pub date_fallbacks: Option<usize>,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Skipped,
    Completed(Vec<LoadReport>),
    Aborted(LoadAborted),
}

impl LoadOutcome {
    pub fn reports(&self) -> &[LoadReport] {
        match self {
            Self::Skipped => &[],
            Self::Completed(reports) => reports,
            Self::Aborted(aborted) => &aborted.reports,
        }
    }
}

#[derive(Debug)]
pub struct RunResult {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub sources: Vec<SourceSummary>,
    pub stats: EnrichmentStats,
    pub fact_sales: PathBuf,
    pub load_report: Option<PathBuf>,
    pub target: LoadTarget,
    pub load: LoadOutcome,
}

impl RunResult {
    /// A table lost rows, was refused, or the load phase was aborted.
    pub fn has_errors(&self) -> bool {
        matches!(self.load, LoadOutcome::Aborted(_))
            || self
                .load
                .reports()
                .iter()
                .any(|report| report.is_truncated() || report.batch_error.is_some())
    }
}
