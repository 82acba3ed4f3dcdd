//! File sink for derived relations.

use std::path::{Path, PathBuf};

use retail_model::Relation;
use tracing::info;

use crate::csv_table::write_relation;
use crate::error::{IngestError, Result};

/// Writes `relation` to `<output_dir>/<relation name>.csv`, creating the
/// directory when needed. Returns the written path.
pub fn export_relation(output_dir: &Path, relation: &Relation) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|source| IngestError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let path = output_dir.join(format!("{}.csv", relation.name()));
    write_relation(&path, relation)?;
    info!(
        relation = relation.name(),
        rows = relation.len(),
        path = %path.display(),
        "exported relation"
    );
    Ok(path)
}
