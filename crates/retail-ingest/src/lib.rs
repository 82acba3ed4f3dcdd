//! Extract ingestion for the retail ETL: CSV loading, extract discovery and
//! the file sink for derived relations.

pub mod csv_table;
pub mod discovery;
pub mod error;
pub mod sink;

pub use csv_table::{read_relation, write_relation};
pub use discovery::{discover_extracts, list_csv_files, load_sources};
pub use error::{IngestError, Result};
pub use sink::export_relation;
