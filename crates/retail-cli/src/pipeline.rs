//! Staged run: ingest, enrich, export, load.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use retail_ingest::{export_relation, load_sources};
use retail_load::{
    BulkLoader, LoadOptions, LoadReport, MemoryWarehouse, PostgresWarehouse, Warehouse,
    warehouse_batches,
};
use retail_model::{Relation, RowView, SourceKind};
use retail_transform::enrich::{DAY_CATEGORY_COLUMN, SEASON_COLUMN};
use retail_transform::{EnrichedTables, UNKNOWN, enrich};
use tracing::{error, info, info_span, trace};

use crate::config::PipelineConfig;
use crate::logging::redact_value;
use crate::types::{LoadOutcome, LoadTarget, RunResult, SourceSummary};

/// File name of the per-table load results in the output directory.
pub const LOAD_REPORT_FILE: &str = "load_report.json";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: PipelineConfig,
    pub target: LoadTarget,
}

pub fn run(options: &RunOptions) -> Result<RunResult> {
    let run_span = info_span!("run", data_dir = %options.data_dir.display());
    let _run_guard = run_span.enter();

    // Stage 1: read and validate the extracts.
    let ingest_start = Instant::now();
    let sources = info_span!("ingest")
        .in_scope(|| load_sources(&options.data_dir))
        .with_context(|| format!("load extracts from {}", options.data_dir.display()))?;
    info!(
        rows = sources.total_rows(),
        duration_ms = ingest_start.elapsed().as_millis(),
        "ingest complete"
    );

    // Stage 2: normalize dates and assemble fact_sales.
    let enrich_start = Instant::now();
    let enriched = info_span!("enrich")
        .in_scope(|| enrich(&sources, &options.config.dates))
        .context("enrich extracts")?;
    log_unclassified_orders(&enriched.fact_sales);
    info!(
        fact_rows = enriched.fact_sales.len(),
        duration_ms = enrich_start.elapsed().as_millis(),
        "enrich complete"
    );

    // Stage 3: file output.
    let fact_sales = info_span!("export")
        .in_scope(|| export_relation(&options.output_dir, &enriched.fact_sales))
        .context("write fact_sales")?;

    // Stage 4: warehouse load.
    let load = info_span!("load", target = ?options.target)
        .in_scope(|| load_stage(options, &enriched))?;
    let load_report = match &load {
        LoadOutcome::Skipped => None,
        outcome => Some(write_load_report(&options.output_dir, outcome.reports())?),
    };

    let source_summaries = SourceKind::ALL
        .into_iter()
        .map(|kind| SourceSummary {
            kind,
            rows: sources.get(kind).len(),
            date_fallbacks: enriched.stats.date_fallbacks.get(&kind).copied(),
        })
        .collect();

    Ok(RunResult {
        data_dir: options.data_dir.clone(),
        output_dir: options.output_dir.clone(),
        sources: source_summaries,
        stats: enriched.stats,
        fact_sales,
        load_report,
        target: options.target,
        load,
    })
}

fn load_stage(options: &RunOptions, enriched: &EnrichedTables) -> Result<LoadOutcome> {
    let load_options = options.config.load_options();
    match options.target {
        LoadTarget::Skip => {
            info!("warehouse load skipped");
            Ok(LoadOutcome::Skipped)
        }
        LoadTarget::Memory => Ok(load_into(MemoryWarehouse::new(), load_options, enriched)),
        LoadTarget::Postgres => {
            let warehouse = &options.config.warehouse;
            let handle = PostgresWarehouse::connect(&warehouse.postgres()).with_context(|| {
                format!(
                    "connect to warehouse {}:{}/{}",
                    warehouse.host, warehouse.port, warehouse.service
                )
            })?;
            Ok(load_into(handle, load_options, enriched))
        }
    }
}

/// Loads every warehouse table through `warehouse`, which is released on return.
pub fn load_into<W: Warehouse>(
    warehouse: W,
    options: LoadOptions,
    enriched: &EnrichedTables,
) -> LoadOutcome {
    let batches = warehouse_batches(&enriched.sources, &enriched.fact_sales);
    let mut loader = BulkLoader::new(warehouse, options);
    match loader.load_all(&batches) {
        Ok(reports) => LoadOutcome::Completed(reports),
        Err(aborted) => {
            error!(table = %aborted.table, error = %aborted.cause, "load phase aborted");
            LoadOutcome::Aborted(aborted)
        }
    }
}

fn write_load_report(output_dir: &Path, reports: &[LoadReport]) -> Result<PathBuf> {
    let path = output_dir.join(LOAD_REPORT_FILE);
    let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, reports)
        .with_context(|| format!("write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(path)
}

/// A fact row whose order date produced an `Unknown` season or day category.
fn is_unclassified(row: &RowView<'_>) -> bool {
    [SEASON_COLUMN, DAY_CATEGORY_COLUMN]
        .into_iter()
        .any(|column| row.text(column) == Some(UNKNOWN))
}

fn log_unclassified_orders(fact_sales: &Relation) {
    for row in fact_sales.rows().filter(is_unclassified) {
        trace!(
            order_id = row.text("order_id").unwrap_or_default(),
            order_date = redact_value(row.text("order_date").unwrap_or_default()),
            season = row.text(SEASON_COLUMN).unwrap_or_default(),
            day_category = row.text(DAY_CATEGORY_COLUMN).unwrap_or_default(),
            "order date not classified"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn either_unknown_label_marks_a_row_unclassified() {
        let facts = Relation::from_text_rows(
            "fact_sales",
            &["order_id", "order_date", SEASON_COLUMN, DAY_CATEGORY_COLUMN],
            &[
                &["1", "2024-03-16 09:15:00", "Spring", "Weekend"],
                &["2", "2024-07-03", "Summer", UNKNOWN],
                &["3", "15/03/2024 10:00:00", UNKNOWN, UNKNOWN],
            ],
        )
        .expect("fixture");
        let flagged: Vec<_> = facts
            .rows()
            .filter(is_unclassified)
            .filter_map(|row| row.text("order_id"))
            .collect();
        assert_eq!(flagged, ["2", "3"]);
    }
}
