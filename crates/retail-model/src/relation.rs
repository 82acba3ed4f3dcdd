//! In-memory tabular relations.
//!
//! A [`Relation`] is an ordered header plus positional rows. Transform steps
//! never edit a relation in place: [`Relation::map_column`],
//! [`Relation::add_column`] and [`Relation::project`] all return a new one.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// A single cell. Source data is untyped text; blanks are `Missing`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum CellValue {
    Text(String),
    Missing,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Builds a cell from raw input text, mapping blank input to `Missing`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::Missing
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::Missing => None,
        }
    }

    /// Text content, or `None` for missing and blank cells.
    pub fn non_blank(&self) -> Option<&str> {
        self.as_str().filter(|value| !value.trim().is_empty())
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Missing, Self::Text)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Named relation with an ordered header and positional rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Relation {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a relation from string slices; handy for fixtures.
    ///
    /// Blank strings become [`CellValue::Missing`].
    pub fn from_text_rows(name: &str, columns: &[&str], rows: &[&[&str]]) -> Result<Self> {
        let mut relation = Self::new(name, columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            relation.push_row(row.iter().map(|value| CellValue::from_raw(value)).collect())?;
        }
        Ok(relation)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the same rows under a different name.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends a row; the row must have one cell per column.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ModelError::RowArity {
                relation: self.name.clone(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Like [`Relation::column_index`] but reports the relation on failure.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| ModelError::ColumnNotFound {
                relation: self.name.clone(),
                column: column.to_string(),
            })
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(index))
    }

    pub fn row(&self, index: usize) -> Option<RowView<'_>> {
        self.rows.get(index).map(|cells| RowView {
            index,
            columns: &self.columns,
            cells,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().enumerate().map(|(index, cells)| RowView {
            index,
            columns: &self.columns,
            cells,
        })
    }

    /// Returns a copy with `column` rewritten cell by cell.
    pub fn map_column<F>(&self, column: &str, mut convert: F) -> Result<Self>
    where
        F: FnMut(&CellValue) -> CellValue,
    {
        let index = self.require_column(column)?;
        let rows = self
            .rows
            .iter()
            .map(|cells| {
                let mut next = cells.clone();
                next[index] = convert(&cells[index]);
                next
            })
            .collect();
        Ok(Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Returns a copy with a derived column appended at the end.
    pub fn add_column<F>(&self, column: &str, mut derive: F) -> Result<Self>
    where
        F: FnMut(RowView<'_>) -> CellValue,
    {
        if self.has_column(column) {
            return Err(ModelError::DuplicateColumn {
                relation: self.name.clone(),
                column: column.to_string(),
            });
        }
        let mut columns = self.columns.clone();
        columns.push(column.to_string());
        let rows = self
            .rows()
            .map(|row| {
                let mut next = row.cells.to_vec();
                next.push(derive(row));
                next
            })
            .collect();
        Ok(Self {
            name: self.name.clone(),
            columns,
            rows,
        })
    }

    /// Selects columns in the given order. Unknown columns come back as
    /// all-missing columns rather than an error.
    pub fn project(&self, columns: &[&str]) -> Self {
        let indices: Vec<Option<usize>> = columns
            .iter()
            .map(|column| self.column_index(column))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|cells| {
                indices
                    .iter()
                    .map(|index| index.map_or(CellValue::Missing, |i| cells[i].clone()))
                    .collect()
            })
            .collect();
        Self {
            name: self.name.clone(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        }
    }
}

/// Borrowed view of one row with by-name access.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    index: usize,
    columns: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> RowView<'a> {
    /// Zero-based position of the row in its relation.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cells(&self) -> &'a [CellValue] {
        self.cells
    }

    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.cells.get(index)
    }

    /// Text of `column`, or `None` if the column is absent or the cell missing.
    pub fn text(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(CellValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Relation {
        Relation::from_text_rows(
            "sales_orders",
            &["order_id", "order_date"],
            &[&["1", "2024-03-15"], &["2", ""]],
        )
        .expect("fixture")
    }

    #[test]
    fn blank_cells_are_missing() {
        let relation = orders();
        assert_eq!(relation.value(1, "order_date"), Some(&CellValue::Missing));
        assert_eq!(
            relation.value(0, "order_date"),
            Some(&CellValue::text("2024-03-15"))
        );
    }

    #[test]
    fn push_row_checks_arity() {
        let mut relation = orders();
        let err = relation
            .push_row(vec![CellValue::text("3")])
            .expect_err("short row");
        assert_eq!(
            err,
            ModelError::RowArity {
                relation: "sales_orders".to_string(),
                expected: 2,
                found: 1,
            }
        );
    }

    #[test]
    fn map_column_leaves_source_untouched() {
        let relation = orders();
        let mapped = relation
            .map_column("order_id", |_| CellValue::text("x"))
            .expect("map");
        assert_eq!(mapped.value(0, "order_id"), Some(&CellValue::text("x")));
        assert_eq!(relation.value(0, "order_id"), Some(&CellValue::text("1")));
    }

    #[test]
    fn add_column_rejects_duplicates() {
        let relation = orders();
        assert!(matches!(
            relation.add_column("order_id", |_| CellValue::Missing),
            Err(ModelError::DuplicateColumn { .. })
        ));
        let derived = relation
            .add_column("has_date", |row| {
                CellValue::text(if row.text("order_date").is_some() { "Y" } else { "N" })
            })
            .expect("derive");
        assert_eq!(derived.columns().last().map(String::as_str), Some("has_date"));
        assert_eq!(derived.value(1, "has_date"), Some(&CellValue::text("N")));
    }

    #[test]
    fn project_fills_unknown_columns() {
        let projected = orders().project(&["order_date", "store_id"]);
        assert_eq!(projected.columns(), ["order_date", "store_id"]);
        assert_eq!(projected.value(0, "store_id"), Some(&CellValue::Missing));
    }
}
