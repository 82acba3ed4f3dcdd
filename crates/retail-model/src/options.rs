//! Configuration options shared across pipeline stages.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a table load reacts to the first rejected row.
///
/// The same policy applies to every destination table in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPolicy {
    /// Stop the table at the first failed row and commit what was inserted.
    #[default]
    FailFast,
    /// Record the failed row and keep inserting the rest of the batch.
    SkipAndContinue,
}

impl LoadPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::SkipAndContinue => "skip-and-continue",
        }
    }
}

impl fmt::Display for LoadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
