//! Typed values bound to insert statements.

use std::fmt;

use chrono::NaiveDateTime;
use retail_model::{CellValue, ColumnDef, ColumnType, is_date_column};
use retail_transform::{DateFormats, parse_timestamp};

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
            Self::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Converts one source cell for `column`.
///
/// Columns whose name mentions `date` go through the permissive timestamp
/// parse and become `NULL` when nothing matches. Numeric columns must parse;
/// anything else is a [`LoadError::Coercion`].
pub fn coerce_cell(
    cell: Option<&CellValue>,
    column: &ColumnDef,
    formats: &DateFormats,
) -> Result<SqlValue, LoadError> {
    let Some(text) = cell.and_then(CellValue::non_blank) else {
        return Ok(SqlValue::Null);
    };
    if is_date_column(&column.name) {
        return Ok(coerce_timestamp(text, formats));
    }
    let coercion_error = || LoadError::Coercion {
        column: column.name.clone(),
        value: text.to_string(),
        expected: column.column_type.sql_type(),
    };
    match column.column_type {
        ColumnType::Integer => parse_integer(text).map(SqlValue::Integer).ok_or_else(coercion_error),
        ColumnType::Decimal => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(SqlValue::Float)
            .ok_or_else(coercion_error),
        ColumnType::Text => Ok(SqlValue::Text(text.to_string())),
        ColumnType::Timestamp => Ok(coerce_timestamp(text, formats)),
    }
}

fn coerce_timestamp(text: &str, formats: &DateFormats) -> SqlValue {
    parse_timestamp(text, formats).map_or(SqlValue::Null, SqlValue::Timestamp)
}

/// Integers may arrive as `12` or, after a float round trip, `12.0`.
fn parse_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let whole = trimmed.strip_suffix(".0")?;
    whole.parse::<i64>().ok()
}
