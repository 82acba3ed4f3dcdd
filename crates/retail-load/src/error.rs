use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Why a row, a table or the warehouse connection failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
#[non_exhaustive]
pub enum LoadError {
    /// The warehouse connection could not be opened or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// A row insert or the table batch ran past its deadline.
    #[error("timed out after {elapsed_ms} ms")]
    Timeout {
        /// Time spent before giving up.
        elapsed_ms: u64,
    },

    /// The warehouse rejected the row on a key or integrity constraint.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A source value could not be converted to the column type.
    #[error("cannot store '{value}' in {column} as {expected}")]
    Coercion {
        column: String,
        value: String,
        expected: &'static str,
    },

    /// Any other statement-level rejection.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The source relation lacks destination columns.
    #[error("missing source columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl LoadError {
    /// Returns whether the same row may succeed if attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }

    /// Connection loss ends the whole load phase.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Short cause name for summaries and structured logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout { .. } => "timeout",
            Self::Constraint(_) => "constraint",
            Self::Coercion { .. } => "coercion",
            Self::Rejected(_) => "rejected",
            Self::MissingColumns(_) => "missing_columns",
        }
    }
}

impl From<tokio_postgres::Error> for LoadError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        if let Some(code) = err.code() {
            return Self::from_sqlstate(code, err.to_string());
        }
        let io_failure = std::error::Error::source(&err)
            .is_some_and(|source| source.downcast_ref::<std::io::Error>().is_some());
        if io_failure {
            Self::Connection(err.to_string())
        } else {
            Self::Rejected(err.to_string())
        }
    }
}

impl LoadError {
    /// Classifies a server-reported error by its SQLSTATE.
    pub(crate) fn from_sqlstate(code: &SqlState, message: String) -> Self {
        // Class 23 is "integrity constraint violation".
        if code.code().starts_with("23") {
            Self::Constraint(message)
        } else if *code == SqlState::QUERY_CANCELED {
            // Raised by `statement_timeout` and by a cancel request.
            Self::Timeout { elapsed_ms: 0 }
        } else {
            Self::Rejected(message)
        }
    }
}

/// A connection failure that ended the load phase.
///
/// Tables committed before the failure stay committed; `reports` holds one
/// entry per table that was started, the interrupted one last.
#[derive(Debug, Clone, Error)]
#[error("load aborted at {table}: {cause}")]
pub struct LoadAborted {
    pub table: String,
    #[source]
    pub cause: LoadError,
    pub reports: Vec<crate::loader::LoadReport>,
}

/// Identifies the failed row in reports: `payment_id=5` or `order_id=1, product_id=3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKey(pub Vec<(String, Option<String>)>);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (column, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            match value {
                Some(value) => write!(f, "{column}={value}")?,
                None => write!(f, "{column}=null")?,
            }
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_causes_are_retryable() {
        assert!(LoadError::Connection("reset".into()).is_retryable());
        assert!(LoadError::Timeout { elapsed_ms: 50 }.is_retryable());
        assert!(!LoadError::Constraint("duplicate key".into()).is_retryable());
        assert!(
            !LoadError::Coercion {
                column: "price".into(),
                value: "n/a".into(),
                expected: "DOUBLE PRECISION",
            }
            .is_retryable()
        );
        assert!(!LoadError::Rejected("syntax".into()).is_retryable());
    }

    #[test]
    fn only_connection_loss_is_fatal() {
        assert!(LoadError::Connection("gone".into()).is_fatal());
        assert!(!LoadError::Timeout { elapsed_ms: 1 }.is_fatal());
    }

    #[test]
    fn sqlstates_map_to_causes() {
        assert!(matches!(
            LoadError::from_sqlstate(&SqlState::UNIQUE_VIOLATION, "dup".into()),
            LoadError::Constraint(_)
        ));
        assert_eq!(
            LoadError::from_sqlstate(&SqlState::QUERY_CANCELED, "canceling statement".into()),
            LoadError::Timeout { elapsed_ms: 0 }
        );
        assert!(matches!(
            LoadError::from_sqlstate(&SqlState::SYNTAX_ERROR, "syntax".into()),
            LoadError::Rejected(_)
        ));
    }

    #[test]
    fn row_key_renders_every_column() {
        let key = RowKey(vec![
            ("order_id".into(), Some("1".into())),
            ("product_id".into(), None),
        ]);
        assert_eq!(key.to_string(), "order_id=1, product_id=null");
    }
}
