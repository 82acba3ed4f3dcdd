use thiserror::Error;

/// Errors raised while building or reshaping relations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// A column was looked up by name and is not part of the header.
    #[error("column '{column}' not found in {relation}")]
    ColumnNotFound { relation: String, column: String },

    /// A derived column would shadow an existing one.
    #[error("column '{column}' already exists in {relation}")]
    DuplicateColumn { relation: String, column: String },

    /// A row does not have one cell per header column.
    #[error("row in {relation} has {found} cells, expected {expected}")]
    RowArity {
        relation: String,
        expected: usize,
        found: usize,
    },

    /// A named source is missing columns its schema requires.
    #[error("{table} is missing expected columns: {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    /// A run was assembled without one of the required extracts.
    #[error("missing source extracts: {}", .sources.join(", "))]
    MissingSources { sources: Vec<String> },
}

pub type Result<T> = std::result::Result<T, ModelError>;
