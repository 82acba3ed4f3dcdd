//! Calendar attributes derived from canonical dates.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use thiserror::Error;

use crate::datetime::{CANONICAL_DATE, CANONICAL_DATETIME, matches_layout};

/// Label written when a date cannot be classified.
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalError {
    /// The value does not start with a `YYYY-MM-DD` date.
    #[error("'{value}' is not a canonical date")]
    NotCanonical { value: String },
    /// The value is not a full `YYYY-MM-DD HH:MM:SS` timestamp.
    #[error("'{value}' is not a canonical timestamp")]
    NotTimestamp { value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// Meteorological season of a month number; `None` outside 1-12.
    pub const fn from_month(month: u32) -> Option<Self> {
        match month {
            12 | 1 | 2 => Some(Self::Winter),
            3..=5 => Some(Self::Spring),
            6..=8 => Some(Self::Summer),
            9..=11 => Some(Self::Fall),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayCategory {
    Weekday,
    Weekend,
}

impl DayCategory {
    pub const fn from_weekday(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sat | Weekday::Sun => Self::Weekend,
            _ => Self::Weekday,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekday => "Weekday",
            Self::Weekend => "Weekend",
        }
    }
}

impl fmt::Display for DayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Season of a canonical date.
///
/// Accepts `YYYY-MM-DD`, optionally followed by a space or `T` and a time.
pub fn season(date: &str) -> Result<Season, TemporalError> {
    let not_canonical = || TemporalError::NotCanonical {
        value: date.to_string(),
    };
    let trimmed = date.trim();
    let (day, rest) = trimmed
        .split_at_checked(10)
        .ok_or_else(not_canonical)?;
    if !(rest.is_empty() || rest.starts_with([' ', 'T'])) || !matches_layout(day, CANONICAL_DATE) {
        return Err(not_canonical());
    }
    let parsed = NaiveDate::parse_from_str(day, CANONICAL_DATE).map_err(|_| not_canonical())?;
    Season::from_month(parsed.month()).ok_or_else(not_canonical)
}

/// Weekday/weekend category of a full `YYYY-MM-DD HH:MM:SS` timestamp.
///
/// Date-only values are rejected.
pub fn day_category(timestamp: &str) -> Result<DayCategory, TemporalError> {
    let not_timestamp = || TemporalError::NotTimestamp {
        value: timestamp.to_string(),
    };
    let trimmed = timestamp.trim();
    if !matches_layout(trimmed, CANONICAL_DATETIME) {
        return Err(not_timestamp());
    }
    let parsed =
        NaiveDateTime::parse_from_str(trimmed, CANONICAL_DATETIME).map_err(|_| not_timestamp())?;
    Ok(DayCategory::from_weekday(parsed.weekday()))
}

/// Season label for a cell, or [`UNKNOWN`].
pub fn season_label(date: Option<&str>) -> &'static str {
    date.and_then(|value| season(value).ok())
        .map_or(UNKNOWN, Season::as_str)
}

/// Day-category label for a cell, or [`UNKNOWN`].
pub fn day_category_label(timestamp: Option<&str>) -> &'static str {
    timestamp
        .and_then(|value| day_category(value).ok())
        .map_or(UNKNOWN, DayCategory::as_str)
}
