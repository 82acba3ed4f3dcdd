//! Retail transform stage.
//!
//! - **datetime**: ordered-pattern date normalization and typed parsing
//! - **temporal**: season and weekday/weekend classification
//! - **join**: hash-indexed inner and left-outer joins
//! - **enrich**: sales fact assembly from the normalized extracts

pub mod datetime;
pub mod enrich;
pub mod error;
pub mod join;
pub mod temporal;

pub use datetime::{
    DateFormats, DatePrecision, NormalizedDate, ParsedDate, normalize_column, normalize_date,
    parse_timestamp,
};
pub use enrich::{
    EnrichedTables, EnrichmentOptions, EnrichmentStats, FACT_SALES, build_fact_sales, enrich,
    normalize_sources,
};
pub use error::{Result, TransformError};
pub use join::{COLLISION_SUFFIX, JoinKeys, JoinKind, inner_join, join, left_join};
pub use temporal::{DayCategory, Season, TemporalError, UNKNOWN, day_category, season};
