//! Warehouse loading for the retail ETL.
//!
//! - **loader**: [`BulkLoader`], load policies, retries and per-table reports
//! - **value**: typed SQL values and per-column coercion
//! - **warehouse**: the [`Warehouse`] handle the loader writes through
//! - **memory** / **postgres**: the two warehouse implementations

pub mod error;
pub mod loader;
pub mod memory;
pub mod postgres;
pub mod value;
pub mod warehouse;

pub use error::{LoadAborted, LoadError, Result, RowKey};
pub use loader::{BulkLoader, LoadOptions, LoadReport, RetryPolicy, RowFailure, warehouse_batches};
pub use memory::MemoryWarehouse;
pub use postgres::{PostgresConfig, PostgresWarehouse};
pub use value::{SqlValue, coerce_cell};
pub use warehouse::Warehouse;
