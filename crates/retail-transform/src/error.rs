use retail_model::{ModelError, SourceKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    /// Date normalization could not address the extract's date column.
    #[error("normalizing {kind}: {source}")]
    Normalize {
        kind: SourceKind,
        #[source]
        source: ModelError,
    },
    /// A join or derivation step referenced a column its input lacks.
    #[error("fact assembly step '{step}' failed: {source}")]
    Join {
        step: &'static str,
        #[source]
        source: ModelError,
    },
}

pub type Result<T> = std::result::Result<T, TransformError>;
