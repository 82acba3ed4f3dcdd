//! Table batches into the warehouse.
//!
//! Rows of one table are inserted in source order inside a single batch and
//! committed once at the end. What happens after a rejected row is decided
//! by [`LoadPolicy`] and applies to every table:
//!
//! - `FailFast` stops the table at the first failed row and still commits
//!   the rows before it. The remaining rows are reported as not attempted.
//! - `SkipAndContinue` records the failure and moves on to the next row.
//!
//! Transient causes (connection, timeout) are retried with exponential
//! backoff first. A connection failure that outlives its retries aborts the
//! whole load phase.

use std::thread;
use std::time::{Duration, Instant};

use retail_model::{CellValue, LoadPolicy, Relation, RowView, SourceTables, TableSchema, WarehouseTable};
use retail_transform::DateFormats;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::error::{LoadAborted, LoadError, Result, RowKey};
use crate::value::{SqlValue, coerce_cell};
use crate::warehouse::Warehouse;

/// Bounded exponential backoff for retryable failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Runs `op` until it succeeds, fails for good, or runs out of attempts.
/// Returns the outcome and the number of attempts made.
fn with_retry<T>(policy: &RetryPolicy, mut op: impl FnMut() -> Result<T>) -> (Result<T>, u32) {
    let mut attempt = 1;
    loop {
        match op() {
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                debug!(attempt, delay_ms = delay.as_millis(), error = %err, "retrying");
                thread::sleep(delay);
                attempt += 1;
            }
            outcome => return (outcome, attempt),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub policy: LoadPolicy,
    pub retry: RetryPolicy,
    /// Deadline for one table batch; rows left when it passes are not attempted.
    pub batch_timeout: Option<Duration>,
    /// Refuse a table whose source lacks destination columns.
    pub require_columns: bool,
    /// Re-read the row count after commit.
    pub verify_counts: bool,
    /// Patterns for the timestamp coercion of date columns.
    pub date_formats: DateFormats,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            policy: LoadPolicy::default(),
            retry: RetryPolicy::default(),
            batch_timeout: None,
            require_columns: false,
            verify_counts: true,
            date_formats: DateFormats::default(),
        }
    }
}

/// One row that did not make it into the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Zero-based position in the source relation.
    pub row_index: usize,
    /// Rendered key columns, e.g. `payment_id=5`.
    pub key: String,
    pub cause: LoadError,
    /// Attempts made; 0 when the batch deadline passed before the row.
    pub attempts: u32,
}

/// Outcome of loading one table.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub policy: LoadPolicy,
    pub source_rows: usize,
    /// Rows committed by this batch.
    pub inserted: usize,
    pub failures: Vec<RowFailure>,
    /// Rows never sent because the batch stopped early.
    pub not_attempted: usize,
    /// Destination columns absent from the source; loaded as NULL.
    pub missing_columns: Vec<String>,
    /// Row count read back after commit, when requested.
    pub readback_rows: Option<u64>,
    /// Table-level failure: refused before the first row, or commit failed.
    pub batch_error: Option<LoadError>,
}

impl LoadReport {
    fn new(schema: &TableSchema, source_rows: usize, policy: LoadPolicy) -> Self {
        Self {
            table: schema.name.clone(),
            policy,
            source_rows,
            inserted: 0,
            failures: Vec::new(),
            not_attempted: 0,
            missing_columns: Vec::new(),
            readback_rows: None,
            batch_error: None,
        }
    }

    /// Source rows that are not in the warehouse after this batch.
    pub fn not_loaded(&self) -> usize {
        self.source_rows.saturating_sub(self.inserted)
    }

    /// Fewer rows committed than the source held.
    pub fn is_truncated(&self) -> bool {
        self.inserted < self.source_rows
    }
}

/// Pairs every warehouse table with the relation it is loaded from.
pub fn warehouse_batches<'a>(
    sources: &'a SourceTables,
    fact_sales: &'a Relation,
) -> Vec<(TableSchema, &'a Relation)> {
    WarehouseTable::ALL
        .into_iter()
        .map(|table| {
            let relation = table.source().map_or(fact_sales, |kind| sources.get(kind));
            (table.schema(), relation)
        })
        .collect()
}

/// Maps relations onto destination tables and inserts them row by row.
pub struct BulkLoader<W> {
    warehouse: W,
    options: LoadOptions,
}

impl<W: Warehouse> BulkLoader<W> {
    pub fn new(warehouse: W, options: LoadOptions) -> Self {
        Self { warehouse, options }
    }

    /// Loads every batch in order, stopping at the first fatal failure.
    pub fn load_all(
        &mut self,
        batches: &[(TableSchema, &Relation)],
    ) -> std::result::Result<Vec<LoadReport>, LoadAborted> {
        let mut reports = Vec::with_capacity(batches.len());
        for (schema, relation) in batches {
            match self.load_table(schema, relation) {
                Ok(report) => reports.push(report),
                Err(mut aborted) => {
                    reports.append(&mut aborted.reports);
                    aborted.reports = reports;
                    return Err(aborted);
                }
            }
        }
        Ok(reports)
    }

    /// Loads `relation` into a table described only by column names.
    pub fn load_columns(
        &mut self,
        table: &str,
        relation: &Relation,
        columns: &[&str],
    ) -> std::result::Result<LoadReport, LoadAborted> {
        self.load_table(&TableSchema::from_column_names(table, columns), relation)
    }

    pub fn load_table(
        &mut self,
        schema: &TableSchema,
        relation: &Relation,
    ) -> std::result::Result<LoadReport, LoadAborted> {
        let span = info_span!("load_table", table = %schema.name, rows = relation.len());
        let _guard = span.enter();

        let total = relation.len();
        let mut report = LoadReport::new(schema, total, self.options.policy);
        report.missing_columns = schema.missing_columns(relation);
        if !report.missing_columns.is_empty() {
            warn!(
                columns = %report.missing_columns.join(", "),
                "source lacks destination columns"
            );
            if self.options.require_columns {
                report.batch_error = Some(LoadError::MissingColumns(report.missing_columns.clone()));
                report.not_attempted = total;
                return Ok(report);
            }
        }

        let (prepared, _) = with_retry(&self.options.retry, || self.warehouse.prepare(schema));
        let (begun, _) = match prepared {
            Ok(()) => with_retry(&self.options.retry, || self.warehouse.begin(schema)),
            Err(err) => (Err(err), 0),
        };
        if let Err(cause) = begun {
            report.not_attempted = total;
            return self.batch_failed(schema, report, cause);
        }

        let sources: Vec<Option<usize>> = schema
            .columns
            .iter()
            .map(|column| relation.column_index(&column.name))
            .collect();
        let key_sources: Vec<(&str, Option<usize>)> = schema
            .key_columns
            .iter()
            .map(|key| (key.as_str(), relation.column_index(key)))
            .collect();

        let started = Instant::now();
        let mut pending = 0usize;
        for row in relation.rows() {
            let remaining = total - row.index() - 1;
            if let Some(limit) = self.options.batch_timeout
                && started.elapsed() >= limit
            {
                warn!(row = row.index(), "batch deadline passed");
                report.failures.push(RowFailure {
                    row_index: row.index(),
                    key: row_key(&row, &key_sources).to_string(),
                    cause: LoadError::Timeout {
                        elapsed_ms: millis(started.elapsed()),
                    },
                    attempts: 0,
                });
                report.not_attempted = remaining;
                break;
            }

            let outcome = match coerce_row(schema, &sources, &row, &self.options.date_formats) {
                Ok(values) => {
                    with_retry(&self.options.retry, || self.warehouse.insert(schema, &values))
                }
                Err(cause) => (Err(cause), 1),
            };
            let (cause, attempts) = match outcome {
                (Ok(()), _) => {
                    pending += 1;
                    continue;
                }
                (Err(cause), attempts) => (cause, attempts),
            };

            let key = row_key(&row, &key_sources).to_string();
            warn!(
                row = row.index(),
                key = %key,
                kind = cause.kind(),
                attempts,
                error = %cause,
                "row rejected"
            );
            let fatal = cause.is_fatal();
            report.failures.push(RowFailure {
                row_index: row.index(),
                key,
                cause: cause.clone(),
                attempts,
            });
            if fatal {
                // The open batch died with the connection.
                report.not_attempted = remaining;
                return Err(LoadAborted {
                    table: schema.name.clone(),
                    cause,
                    reports: vec![report],
                });
            }
            if self.options.policy == LoadPolicy::FailFast {
                report.not_attempted = remaining;
                break;
            }
        }

        if let Err(cause) = self.warehouse.commit(schema) {
            return self.batch_failed(schema, report, cause);
        }
        report.inserted = pending;

        if self.options.verify_counts {
            match self.warehouse.row_count(&schema.name) {
                Ok(count) => report.readback_rows = Some(count),
                Err(cause) if cause.is_fatal() => {
                    return Err(LoadAborted {
                        table: schema.name.clone(),
                        cause,
                        reports: vec![report],
                    });
                }
                Err(cause) => warn!(error = %cause, "row count read-back failed"),
            }
        }

        if report.is_truncated() {
            warn!(
                inserted = report.inserted,
                failed = report.failures.len(),
                not_attempted = report.not_attempted,
                policy = %report.policy,
                "table truncated"
            );
        } else {
            info!(inserted = report.inserted, "table loaded");
        }
        Ok(report)
    }

    /// Records a table-level failure; fatal causes abort the load phase.
    fn batch_failed(
        &mut self,
        schema: &TableSchema,
        mut report: LoadReport,
        cause: LoadError,
    ) -> std::result::Result<LoadReport, LoadAborted> {
        report.inserted = 0;
        if cause.is_fatal() {
            return Err(LoadAborted {
                table: report.table.clone(),
                cause,
                reports: vec![report],
            });
        }
        warn!(error = %cause, "table batch failed");
        if let Err(error) = self.warehouse.rollback(schema) {
            debug!(%error, "rollback after failed batch");
        }
        report.batch_error = Some(cause);
        Ok(report)
    }
}

fn coerce_row(
    schema: &TableSchema,
    sources: &[Option<usize>],
    row: &RowView<'_>,
    formats: &DateFormats,
) -> Result<Vec<SqlValue>> {
    schema
        .columns
        .iter()
        .zip(sources)
        .map(|(column, source)| {
            let cell = source.and_then(|idx| row.cells().get(idx));
            coerce_cell(cell, column, formats)
        })
        .collect()
}

fn row_key(row: &RowView<'_>, key_sources: &[(&str, Option<usize>)]) -> RowKey {
    RowKey(
        key_sources
            .iter()
            .map(|(column, source)| {
                let value = source
                    .and_then(|idx| row.cells().get(idx))
                    .and_then(CellValue::as_str)
                    .map(str::to_string);
                ((*column).to_string(), value)
            })
            .collect(),
    )
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
