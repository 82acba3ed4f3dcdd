use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use retail_model::{CellValue, Relation};
use tracing::debug;

use crate::error::{IngestError, Result};

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

fn normalize_cell(raw: &str) -> CellValue {
    CellValue::from_raw(raw.trim_matches('\u{feff}'))
}

/// Reads a headed CSV file into a relation named `name`.
///
/// Short records are padded with missing cells, extra trailing fields are
/// dropped, and fully blank records are skipped.
pub fn read_relation(path: &Path, name: &str) -> Result<Relation> {
    let csv_error = |source| IngestError::CsvRead {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(normalize_header)
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(IngestError::EmptyCsv {
            path: path.to_path_buf(),
        });
    }

    let width = headers.len();
    let mut relation = Relation::new(name, headers);
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(|value| value.trim().is_empty()) {
            skipped += 1;
            continue;
        }
        let row: Vec<CellValue> = (0..width)
            .map(|idx| record.get(idx).map_or(CellValue::Missing, normalize_cell))
            .collect();
        relation
            .push_row(row)
            .map_err(|source| IngestError::Schema {
                path: path.to_path_buf(),
                source,
            })?;
    }
    debug!(
        relation = name,
        path = %path.display(),
        rows = relation.len(),
        skipped_blank = skipped,
        "read csv"
    );
    Ok(relation)
}

/// Writes a relation as a headed CSV file. Missing cells are written empty.
pub fn write_relation(path: &Path, relation: &Relation) -> Result<()> {
    let csv_error = |source| IngestError::CsvWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = WriterBuilder::new().from_path(path).map_err(csv_error)?;
    writer.write_record(relation.columns()).map_err(csv_error)?;
    for row in relation.rows() {
        writer
            .write_record(row.cells().iter().map(|cell| cell.as_str().unwrap_or("")))
            .map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|err| csv_error(csv::Error::from(err)))?;
    debug!(
        relation = relation.name(),
        path = %path.display(),
        rows = relation.len(),
        "wrote csv"
    );
    Ok(())
}
