//! Date normalization across heterogeneous extract encodings.
//!
//! Every extract writes dates its own way (`2024-03-15 10:00:00`,
//! `15-03-2024`, `03/15/2024`, ...). Values are tried against an ordered
//! pattern list and the first pattern that parses wins. Day-first and
//! month-first patterns overlap (`03-04-2024` parses as both), so the list
//! order decides the result and must not be reshuffled casually.
//!
//! A value that no pattern accepts is kept verbatim: rows are never dropped
//! or blanked because of a date.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use retail_model::{CellValue, Relation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Canonical date rendering.
pub const CANONICAL_DATE: &str = "%Y-%m-%d";
/// Canonical date rendering with a time component.
pub const CANONICAL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Patterns tried by default, in order.
pub const DEFAULT_PATTERNS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%m/%d/%Y",
];

/// Ordered list of accepted input patterns (chrono `strftime` syntax).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateFormats {
    patterns: Vec<String>,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS)
    }
}

impl DateFormats {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Tries each pattern in order and returns the first successful parse.
    pub fn parse(&self, value: &str) -> Option<ParsedDate> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.patterns
            .iter()
            .find_map(|pattern| parse_with(trimmed, pattern))
    }
}

fn has_time_component(pattern: &str) -> bool {
    ["%H", "%I", "%M", "%S", "%T", "%R"]
        .iter()
        .any(|token| pattern.contains(token))
}

/// Checks that `value` has exactly the digit layout `pattern` describes.
///
/// chrono alone is too lenient for this: `%Y` takes any number of digits
/// and a sign, and a space in the pattern matches any run of whitespace,
/// including none. Here `%Y` is four digits, the other numeric fields are
/// one or two digits, and every literal must appear verbatim. Patterns with
/// other specifiers are left to chrono.
pub(crate) fn matches_layout(value: &str, pattern: &str) -> bool {
    let mut input = value.as_bytes();
    let mut layout = pattern.as_bytes();
    while let Some((&head, rest)) = layout.split_first() {
        layout = rest;
        if head != b'%' {
            match input.split_first() {
                Some((&next, tail)) if next == head => input = tail,
                _ => return false,
            }
            continue;
        }
        let Some((&field, rest)) = layout.split_first() else {
            return false;
        };
        layout = rest;
        let (min, max) = match field {
            b'Y' => (4, 4),
            b'm' | b'd' | b'H' | b'M' | b'S' => (1, 2),
            b'%' => match input.split_first() {
                Some((b'%', tail)) => {
                    input = tail;
                    continue;
                }
                _ => return false,
            },
            _ => return true,
        };
        let digits = input
            .iter()
            .take(max)
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        if digits < min {
            return false;
        }
        input = &input[digits..];
    }
    input.is_empty()
}

fn parse_with(value: &str, pattern: &str) -> Option<ParsedDate> {
    if !matches_layout(value, pattern) {
        return None;
    }
    if has_time_component(pattern) {
        NaiveDateTime::parse_from_str(value, pattern)
            .ok()
            .map(ParsedDate::DateTime)
    } else {
        NaiveDate::parse_from_str(value, pattern)
            .ok()
            .map(ParsedDate::Date)
    }
}

/// A successfully parsed value and the granularity its pattern carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedDate {
    DateTime(NaiveDateTime),
    Date(NaiveDate),
}

impl ParsedDate {
    pub fn date(self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date(),
            Self::Date(d) => d,
        }
    }

    /// Timestamp value; date-only parses land on midnight.
    pub fn to_timestamp(self) -> NaiveDateTime {
        match self {
            Self::DateTime(dt) => dt,
            Self::Date(d) => d.and_time(NaiveTime::MIN),
        }
    }

    pub fn render(self, precision: DatePrecision) -> String {
        match (self, precision) {
            (Self::DateTime(dt), DatePrecision::PreserveTime) => {
                dt.format(CANONICAL_DATETIME).to_string()
            }
            _ => self.date().format(CANONICAL_DATE).to_string(),
        }
    }
}

/// How much of a parsed value survives normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    /// Always `YYYY-MM-DD`.
    #[default]
    DateOnly,
    /// `YYYY-MM-DD HH:MM:SS` when the input carried a time, else `YYYY-MM-DD`.
    PreserveTime,
}

/// Outcome of normalizing one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedDate {
    /// Parsed and rendered in canonical form.
    Canonical(String),
    /// No pattern matched; the original text is kept.
    Unparsed(String),
    /// Empty or whitespace-only input.
    Absent,
}

impl NormalizedDate {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Canonical(value) | Self::Unparsed(value) => Some(value),
            Self::Absent => None,
        }
    }

    pub fn into_cell(self) -> CellValue {
        match self {
            Self::Canonical(value) | Self::Unparsed(value) => CellValue::Text(value),
            Self::Absent => CellValue::Missing,
        }
    }
}

/// Normalizes one value to canonical form.
///
/// Empty input is [`NormalizedDate::Absent`]; input no pattern accepts comes
/// back unchanged as [`NormalizedDate::Unparsed`].
pub fn normalize_date(value: &str, formats: &DateFormats, precision: DatePrecision) -> NormalizedDate {
    if value.trim().is_empty() {
        return NormalizedDate::Absent;
    }
    match formats.parse(value) {
        Some(parsed) => NormalizedDate::Canonical(parsed.render(precision)),
        None => NormalizedDate::Unparsed(value.to_string()),
    }
}

/// Permissive typed parse used when loading: absent on total failure.
pub fn parse_timestamp(value: &str, formats: &DateFormats) -> Option<NaiveDateTime> {
    formats.parse(value).map(ParsedDate::to_timestamp)
}

/// A normalized relation and how many values kept their original text.
#[derive(Debug, Clone)]
pub struct ColumnNormalization {
    pub relation: Relation,
    pub fallbacks: usize,
}

/// Returns a copy of `relation` with `column` normalized.
pub fn normalize_column(
    relation: &Relation,
    column: &str,
    formats: &DateFormats,
    precision: DatePrecision,
) -> retail_model::Result<ColumnNormalization> {
    let mut fallbacks = 0usize;
    let normalized = relation.map_column(column, |cell| match cell {
        CellValue::Missing => CellValue::Missing,
        CellValue::Text(value) => {
            let result = normalize_date(value, formats, precision);
            if matches!(result, NormalizedDate::Unparsed(_)) {
                fallbacks += 1;
                debug!(relation = relation.name(), column, "date kept in original form");
            }
            result.into_cell()
        }
    })?;
    Ok(ColumnNormalization {
        relation: normalized,
        fallbacks,
    })
}
