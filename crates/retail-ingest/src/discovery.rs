//! Extract discovery and loading.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use retail_model::{SourceKind, SourceTables};
use tracing::{info, warn};

use crate::csv_table::read_relation;
use crate::error::{IngestError, Result};

/// Lists all CSV files in a directory.
///
/// Returns files sorted by filename.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry_result in entries {
        let entry = entry_result.map_err(|e| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Matches CSV files to source kinds by file stem (`payments.csv` -> payments).
///
/// Unrecognised CSV files are ignored with a warning. Every kind must be
/// present.
pub fn discover_extracts(dir: &Path) -> Result<BTreeMap<SourceKind, PathBuf>> {
    let mut found = BTreeMap::new();
    for path in list_csv_files(dir)? {
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        match SourceKind::from_name(stem) {
            Some(kind) => {
                found.entry(kind).or_insert(path);
            }
            None => warn!(path = %path.display(), "ignoring unrecognised csv file"),
        }
    }

    let missing: Vec<String> = SourceKind::ALL
        .into_iter()
        .filter(|kind| !found.contains_key(kind))
        .map(SourceKind::file_name)
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingExtracts {
            dir: dir.to_path_buf(),
            files: missing,
        });
    }
    Ok(found)
}

/// Discovers, reads and header-checks every extract in `dir`.
pub fn load_sources(dir: &Path) -> Result<SourceTables> {
    let mut tables = BTreeMap::new();
    for (kind, path) in discover_extracts(dir)? {
        let relation = read_relation(&path, kind.name())?;
        kind.validate_header(relation.columns())
            .map_err(|source| IngestError::Schema {
                path: path.clone(),
                source,
            })?;
        info!(source = %kind, rows = relation.len(), "loaded extract");
        tables.insert(kind, relation);
    }
    SourceTables::new(tables).map_err(|source| IngestError::Schema {
        path: dir.to_path_buf(),
        source,
    })
}
