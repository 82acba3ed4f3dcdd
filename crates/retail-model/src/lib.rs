//! Data model for the retail ETL.
//!
//! - **relation**: untyped in-memory relations shared by every stage
//! - **schema**: source header contracts and warehouse table descriptors
//! - **sources**: the complete set of extracts for one run
//! - **options**: cross-stage processing options

pub mod error;
pub mod options;
pub mod relation;
pub mod schema;
pub mod sources;

pub use error::{ModelError, Result};
pub use options::LoadPolicy;
pub use relation::{CellValue, Relation, RowView};
pub use schema::{ColumnDef, ColumnType, SourceKind, TableSchema, WarehouseTable, is_date_column};
pub use sources::SourceTables;
