//! In-process warehouse for dry runs and tests.

use std::collections::{BTreeMap, HashSet, VecDeque};

use retail_model::TableSchema;
use tracing::debug;

use crate::error::{LoadError, Result};
use crate::value::SqlValue;
use crate::warehouse::Warehouse;

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Vec<SqlValue>>,
    keys: HashSet<String>,
}

#[derive(Debug)]
struct OpenBatch {
    table: String,
    rows: Vec<Vec<SqlValue>>,
    keys: HashSet<String>,
}

#[derive(Debug)]
struct ScriptedFailure {
    table: String,
    call: usize,
    error: LoadError,
}

/// Stores committed rows per table and enforces declared primary keys.
///
/// Failures can be scripted against the n-th insert call of a table to
/// exercise the loader's policies; each scripted failure fires once.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: BTreeMap<String, MemoryTable>,
    open: Option<OpenBatch>,
    insert_calls: BTreeMap<String, usize>,
    scripted: VecDeque<ScriptedFailure>,
    disconnected: bool,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `call`-th (zero-based) insert into `table` with `error`.
    #[must_use]
    pub fn fail_insert(mut self, table: &str, call: usize, error: LoadError) -> Self {
        self.scripted.push_back(ScriptedFailure {
            table: table.to_string(),
            call,
            error,
        });
        self
    }

    /// Simulates a lost connection: the open batch is discarded and every
    /// later call fails with [`LoadError::Connection`].
    pub fn disconnect(&mut self) {
        self.open = None;
        self.disconnected = true;
    }

    /// Committed rows of `table`.
    pub fn rows(&self, table: &str) -> &[Vec<SqlValue>] {
        self.tables
            .get(table)
            .map(|table| table.rows.as_slice())
            .unwrap_or_default()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.disconnected {
            Err(LoadError::Connection("memory warehouse disconnected".into()))
        } else {
            Ok(())
        }
    }

    fn take_scripted(&mut self, table: &str, call: usize) -> Option<LoadError> {
        let position = self
            .scripted
            .iter()
            .position(|failure| failure.table == table && failure.call == call)?;
        let failure = self.scripted.remove(position)?;
        if failure.error.is_fatal() {
            self.disconnect();
        }
        Some(failure.error)
    }
}

fn render_key(schema: &TableSchema, row: &[SqlValue]) -> Option<String> {
    if !schema.unique_key {
        return None;
    }
    let parts: Vec<String> = schema
        .key_indices()
        .into_iter()
        .map(|idx| row.get(idx).map(ToString::to_string).unwrap_or_default())
        .collect();
    Some(parts.join("|"))
}

impl Warehouse for MemoryWarehouse {
    fn prepare(&mut self, schema: &TableSchema) -> Result<()> {
        self.ensure_connected()?;
        self.tables.entry(schema.name.clone()).or_default();
        Ok(())
    }

    fn begin(&mut self, schema: &TableSchema) -> Result<()> {
        self.ensure_connected()?;
        if let Some(open) = &self.open {
            return Err(LoadError::Rejected(format!(
                "batch for {} is still open",
                open.table
            )));
        }
        self.open = Some(OpenBatch {
            table: schema.name.clone(),
            rows: Vec::new(),
            keys: HashSet::new(),
        });
        Ok(())
    }

    fn insert(&mut self, schema: &TableSchema, row: &[SqlValue]) -> Result<()> {
        self.ensure_connected()?;
        let call = {
            let counter = self.insert_calls.entry(schema.name.clone()).or_default();
            let call = *counter;
            *counter += 1;
            call
        };
        if let Some(error) = self.take_scripted(&schema.name, call) {
            return Err(error);
        }
        if row.len() != schema.columns.len() {
            return Err(LoadError::Rejected(format!(
                "{} expects {} values, got {}",
                schema.name,
                schema.columns.len(),
                row.len()
            )));
        }
        let committed = self.tables.get(&schema.name);
        let Some(open) = self.open.as_mut().filter(|open| open.table == schema.name) else {
            return Err(LoadError::Rejected(format!("no open batch for {}", schema.name)));
        };
        if let Some(key) = render_key(schema, row) {
            let taken = open.keys.contains(&key)
                || committed.is_some_and(|table| table.keys.contains(&key));
            if taken {
                return Err(LoadError::Constraint(format!(
                    "duplicate key ({}) in {}",
                    schema.key_columns.join(", "),
                    schema.name
                )));
            }
            open.keys.insert(key);
        }
        open.rows.push(row.to_vec());
        Ok(())
    }

    fn commit(&mut self, schema: &TableSchema) -> Result<()> {
        self.ensure_connected()?;
        let Some(open) = self.open.take() else {
            return Err(LoadError::Rejected(format!("no open batch for {}", schema.name)));
        };
        let table = self.tables.entry(open.table).or_default();
        debug!(table = %schema.name, rows = open.rows.len(), "memory batch committed");
        table.rows.extend(open.rows);
        table.keys.extend(open.keys);
        Ok(())
    }

    fn rollback(&mut self, _schema: &TableSchema) -> Result<()> {
        self.open = None;
        Ok(())
    }

    fn row_count(&mut self, table: &str) -> Result<u64> {
        self.ensure_connected()?;
        Ok(self.rows(table).len() as u64)
    }
}
