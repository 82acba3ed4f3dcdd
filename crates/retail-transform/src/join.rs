//! Keyed equality joins between relations.
//!
//! # Output header
//!
//! All left columns in order, then the right columns in order. The right
//! key is dropped only when it has the same name as the left key, so a
//! `payment_id = invoice_id` join keeps both identifiers. Any other right
//! column whose name is already taken gets [`COLLISION_SUFFIX`] appended
//! (`store_id_right`), then a counter (`store_id_right_2`, ...). The rule is
//! stable so chained joins can address a column by name.
//!
//! # Matching
//!
//! Keys compare as text. Missing or blank keys match nothing. The right
//! relation is indexed once per call; output follows left row order, then
//! right row order within a key.

use std::collections::HashMap;

use retail_model::{CellValue, Relation};

/// Suffix for right-side columns that collide with an existing name.
pub const COLLISION_SUFFIX: &str = "_right";

/// Join key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinKeys {
    /// Same column name on both sides.
    Shared(String),
    /// Different column names on each side.
    Pair { left: String, right: String },
}

impl JoinKeys {
    pub fn shared(column: impl Into<String>) -> Self {
        Self::Shared(column.into())
    }

    pub fn pair(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::Pair {
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn left(&self) -> &str {
        match self {
            Self::Shared(column) => column,
            Self::Pair { left, .. } => left,
        }
    }

    pub fn right(&self) -> &str {
        match self {
            Self::Shared(column) => column,
            Self::Pair { right, .. } => right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// Rows whose keys match on both sides; everything else is dropped.
pub fn inner_join(left: &Relation, right: &Relation, keys: &JoinKeys) -> retail_model::Result<Relation> {
    join(left, right, keys, JoinKind::Inner)
}

/// Every left row at least once; unmatched rows get missing right columns.
pub fn left_join(left: &Relation, right: &Relation, keys: &JoinKeys) -> retail_model::Result<Relation> {
    join(left, right, keys, JoinKind::LeftOuter)
}

pub fn join(
    left: &Relation,
    right: &Relation,
    keys: &JoinKeys,
    kind: JoinKind,
) -> retail_model::Result<Relation> {
    let left_key = left.require_column(keys.left())?;
    let right_key = right.require_column(keys.right())?;

    let mut columns = left.columns().to_vec();
    let mut right_slots = Vec::with_capacity(right.columns().len());
    for (idx, name) in right.columns().iter().enumerate() {
        if idx == right_key && name == keys.left() {
            continue;
        }
        let output_name = disambiguate(&columns, name);
        columns.push(output_name);
        right_slots.push(idx);
    }

    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for row in right.rows() {
        if let Some(key) = row.cells()[right_key].non_blank() {
            index.entry(key).or_default().push(row.index());
        }
    }

    let mut output = Relation::new(left.name(), columns);
    for row in left.rows() {
        let matches = row.cells()[left_key]
            .non_blank()
            .and_then(|key| index.get(key));
        match matches {
            Some(right_rows) => {
                for &right_idx in right_rows {
                    // Index entries come from `right.rows()`, so the row exists.
                    let Some(right_row) = right.row(right_idx) else {
                        continue;
                    };
                    let mut cells = row.cells().to_vec();
                    cells.extend(right_slots.iter().map(|&slot| right_row.cells()[slot].clone()));
                    output.push_row(cells)?;
                }
            }
            None if kind == JoinKind::LeftOuter => {
                let mut cells = row.cells().to_vec();
                cells.extend(std::iter::repeat_n(CellValue::Missing, right_slots.len()));
                output.push_row(cells)?;
            }
            None => {}
        }
    }
    Ok(output)
}

fn disambiguate(existing: &[String], name: &str) -> String {
    if !existing.iter().any(|column| column == name) {
        return name.to_string();
    }
    let mut candidate = format!("{name}{COLLISION_SUFFIX}");
    let mut counter = 2usize;
    while existing.iter().any(|column| *column == candidate) {
        candidate = format!("{name}{COLLISION_SUFFIX}_{counter}");
        counter += 1;
    }
    candidate
}
