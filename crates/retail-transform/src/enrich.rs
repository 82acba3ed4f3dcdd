//! Sales fact assembly.
//!
//! Normalizes the date columns of every extract, then builds `fact_sales`
//! in a fixed order:
//!
//! 1. sales orders ⋈ order details on `order_id` (one row per order line)
//! 2. payments ⋈ invoices on `payment_id = invoice_id`
//! 3. step 2 ⋈ sales orders on `order_id` (store and customer context)
//! 4. step 1 ⟕ step 3 on `order_id` (payment and invoice are optional)
//! 5. `season` and `day_category` derived from `order_date`
//!
//! Step 4 is a left join: an order line with no payment or invoice is kept
//! with those columns missing. Dates that could not be normalized classify
//! as [`UNKNOWN`](crate::temporal::UNKNOWN) instead of failing the batch.

use std::collections::BTreeMap;

use retail_model::{CellValue, Relation, SourceKind, SourceTables};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::datetime::{DateFormats, DatePrecision, normalize_column};
use crate::error::{Result, TransformError};
use crate::join::{JoinKeys, inner_join, left_join};
use crate::temporal::{UNKNOWN, day_category_label, season_label};

/// Name of the assembled fact relation.
pub const FACT_SALES: &str = "fact_sales";
pub const SEASON_COLUMN: &str = "season";
pub const DAY_CATEGORY_COLUMN: &str = "day_category";

/// Date parsing configuration for the enrichment run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichmentOptions {
    /// Patterns used for every extract without an override.
    #[serde(default)]
    pub date_formats: DateFormats,
    /// Per-extract pattern lists, for extracts with a known fixed format.
    #[serde(default)]
    pub source_formats: BTreeMap<SourceKind, DateFormats>,
}

impl EnrichmentOptions {
    pub fn formats_for(&self, kind: SourceKind) -> &DateFormats {
        self.source_formats.get(&kind).unwrap_or(&self.date_formats)
    }

    /// Order dates keep their clock so the day category can be derived.
    pub fn precision_for(kind: SourceKind) -> DatePrecision {
        match kind {
            SourceKind::SalesOrders => DatePrecision::PreserveTime,
            _ => DatePrecision::DateOnly,
        }
    }
}

/// Row counts and fallbacks observed while enriching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentStats {
    /// Values per extract left in their original form by the normalizer.
    pub date_fallbacks: BTreeMap<SourceKind, usize>,
    pub order_lines: usize,
    pub payment_invoices: usize,
    pub payment_contexts: usize,
    pub fact_rows: usize,
    /// Fact rows without payment/invoice data.
    pub lines_without_payment: usize,
    pub unknown_seasons: usize,
    pub unknown_day_categories: usize,
}

impl EnrichmentStats {
    pub fn total_date_fallbacks(&self) -> usize {
        self.date_fallbacks.values().sum()
    }
}

/// Result of an enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichedTables {
    /// Extracts with normalized date columns.
    pub sources: SourceTables,
    pub fact_sales: Relation,
    pub stats: EnrichmentStats,
}

/// Normalizes every extract's date column. Returns new relations.
pub fn normalize_sources(
    sources: &SourceTables,
    options: &EnrichmentOptions,
) -> Result<(SourceTables, BTreeMap<SourceKind, usize>)> {
    let mut normalized = sources.clone();
    let mut fallbacks = BTreeMap::new();
    for (kind, relation) in sources.iter() {
        let Some(column) = kind.date_column() else {
            continue;
        };
        let result = normalize_column(
            relation,
            column,
            options.formats_for(kind),
            EnrichmentOptions::precision_for(kind),
        )
        .map_err(|source| TransformError::Normalize { kind, source })?;
        if result.fallbacks > 0 {
            info!(
                source = %kind,
                column,
                count = result.fallbacks,
                "dates left in original form"
            );
        }
        fallbacks.insert(kind, result.fallbacks);
        normalized = normalized.with(kind, result.relation);
    }
    Ok((normalized, fallbacks))
}

/// Builds `fact_sales` from already-normalized extracts.
pub fn build_fact_sales(sources: &SourceTables) -> Result<(Relation, EnrichmentStats)> {
    let orders = sources.get(SourceKind::SalesOrders);
    let details = sources.get(SourceKind::OrderDetails);
    let payments = sources.get(SourceKind::Payments);
    let invoices = sources.get(SourceKind::Invoices);
    let order_key = JoinKeys::shared("order_id");
    let mut stats = EnrichmentStats::default();

    let order_lines = info_span!("join", step = "order_lines")
        .in_scope(|| inner_join(orders, details, &order_key))
        .map_err(|source| TransformError::Join {
            step: "order_lines",
            source,
        })?;
    stats.order_lines = order_lines.len();

    let payment_invoices = info_span!("join", step = "payment_invoices")
        .in_scope(|| inner_join(payments, invoices, &JoinKeys::pair("payment_id", "invoice_id")))
        .map_err(|source| TransformError::Join {
            step: "payment_invoices",
            source,
        })?;
    stats.payment_invoices = payment_invoices.len();

    let payment_contexts = info_span!("join", step = "payment_contexts")
        .in_scope(|| inner_join(&payment_invoices, orders, &order_key))
        .map_err(|source| TransformError::Join {
            step: "payment_contexts",
            source,
        })?;
    stats.payment_contexts = payment_contexts.len();

    let facts = info_span!("join", step = "fact_lines")
        .in_scope(|| left_join(&order_lines, &payment_contexts, &order_key))
        .map_err(|source| TransformError::Join {
            step: "fact_lines",
            source,
        })?;
    stats.lines_without_payment = facts
        .rows()
        .filter(|row| row.text("payment_id").is_none())
        .count();

    let facts = facts
        .add_column(SEASON_COLUMN, |row| {
            CellValue::text(season_label(row.text("order_date")))
        })
        .and_then(|facts| {
            facts.add_column(DAY_CATEGORY_COLUMN, |row| {
                CellValue::text(day_category_label(row.text("order_date")))
            })
        })
        .map_err(|source| TransformError::Join {
            step: "derive_calendar",
            source,
        })?
        .renamed(FACT_SALES);

    stats.fact_rows = facts.len();
    stats.unknown_seasons = count_label(&facts, SEASON_COLUMN, UNKNOWN);
    stats.unknown_day_categories = count_label(&facts, DAY_CATEGORY_COLUMN, UNKNOWN);
    Ok((facts, stats))
}

fn count_label(relation: &Relation, column: &str, label: &str) -> usize {
    relation
        .rows()
        .filter(|row| row.text(column) == Some(label))
        .count()
}

/// Normalizes the extracts and assembles `fact_sales`.
pub fn enrich(sources: &SourceTables, options: &EnrichmentOptions) -> Result<EnrichedTables> {
    let (normalized, fallbacks) =
        info_span!("normalize_dates").in_scope(|| normalize_sources(sources, options))?;
    let (fact_sales, mut stats) = info_span!("build_fact_sales").in_scope(|| build_fact_sales(&normalized))?;
    stats.date_fallbacks = fallbacks;

    info!(
        order_lines = stats.order_lines,
        payment_invoices = stats.payment_invoices,
        fact_rows = stats.fact_rows,
        lines_without_payment = stats.lines_without_payment,
        date_fallbacks = stats.total_date_fallbacks(),
        unknown_seasons = stats.unknown_seasons,
        unknown_day_categories = stats.unknown_day_categories,
        "enrichment complete"
    );
    Ok(EnrichedTables {
        sources: normalized,
        fact_sales,
        stats,
    })
}
