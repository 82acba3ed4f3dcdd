use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use retail_cli::types::{LoadOutcome, LoadTarget, RunResult};
use retail_load::LoadReport;

pub fn print_summary(result: &RunResult) {
    println!("Data: {}", result.data_dir.display());
    println!("Output: {}", result.output_dir.display());
    println!("Fact table: {}", result.fact_sales.display());
    if let Some(path) = &result.load_report {
        println!("Load report: {}", path.display());
    }
    print_source_table(result);
    print_enrichment_table(result);
    if !matches!(result.load, LoadOutcome::Skipped) {
        print_load_table(result);
        print_failure_table(result.load.reports());
    }
    if let LoadOutcome::Aborted(aborted) = &result.load {
        eprintln!("Load aborted at {}: {}", aborted.table, aborted.cause);
    }
}

fn print_source_table(result: &RunResult) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Source"),
        header_cell("Rows"),
        header_cell("Dates kept as-is"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    for source in &result.sources {
        table.add_row(vec![
            name_cell(source.kind.name()),
            Cell::new(source.rows),
            count_cell(source.date_fallbacks, Color::Yellow),
        ]);
    }
    println!("{table}");
}

fn print_enrichment_table(result: &RunResult) {
    let stats = &result.stats;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Step"), header_cell("Rows")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows = [
        ("Order lines", Cell::new(stats.order_lines)),
        ("Payment/invoice pairs", Cell::new(stats.payment_invoices)),
        ("Payment contexts", Cell::new(stats.payment_contexts)),
        ("Fact rows", Cell::new(stats.fact_rows).add_attribute(Attribute::Bold)),
        (
            "Lines without payment",
            count_cell(Some(stats.lines_without_payment), Color::Yellow),
        ),
        (
            "Unknown season",
            count_cell(Some(stats.unknown_seasons), Color::Yellow),
        ),
        (
            "Unknown day category",
            count_cell(Some(stats.unknown_day_categories), Color::Yellow),
        ),
    ];
    for (label, cell) in rows {
        table.add_row(vec![Cell::new(label), cell]);
    }
    println!("{table}");
}

fn print_load_table(result: &RunResult) {
    let reports = result.load.reports();
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Source rows"),
        header_cell("Inserted"),
        header_cell("Failed"),
        header_cell("Not attempted"),
        header_cell("Read back"),
        header_cell("Status"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=5 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_source = 0usize;
    let mut total_inserted = 0usize;
    let mut total_failed = 0usize;
    let mut total_skipped = 0usize;
    for report in reports {
        total_source += report.source_rows;
        total_inserted += report.inserted;
        total_failed += report.failures.len();
        total_skipped += report.not_attempted;
        table.add_row(vec![
            name_cell(&report.table),
            Cell::new(report.source_rows),
            Cell::new(report.inserted),
            count_cell(Some(report.failures.len()), Color::Red),
            count_cell(Some(report.not_attempted), Color::Yellow),
            report
                .readback_rows
                .map_or_else(|| dim_cell("-"), Cell::new),
            status_cell(report),
        ]);
    }
    let target = match result.target {
        LoadTarget::Memory => "in-memory (dry run)",
        LoadTarget::Postgres => "PostgreSQL",
        LoadTarget::Skip => "-",
    };
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(total_source).add_attribute(Attribute::Bold),
        Cell::new(total_inserted).add_attribute(Attribute::Bold),
        count_cell(Some(total_failed), Color::Red).add_attribute(Attribute::Bold),
        count_cell(Some(total_skipped), Color::Yellow).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell(target),
    ]);
    println!("{table}");
}

fn print_failure_table(reports: &[LoadReport]) {
    let failures: Vec<_> = reports
        .iter()
        .flat_map(|report| report.failures.iter().map(move |failure| (&report.table, failure)))
        .collect();
    if failures.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Row"),
        header_cell("Key"),
        header_cell("Cause"),
        header_cell("Attempts"),
        header_cell("Detail"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for (table_name, failure) in failures {
        table.add_row(vec![
            name_cell(table_name),
            Cell::new(failure.row_index),
            Cell::new(&failure.key),
            Cell::new(failure.cause.kind()).fg(Color::Red),
            Cell::new(failure.attempts),
            Cell::new(failure.cause.to_string()),
        ]);
    }
    println!();
    println!("Rejected rows:");
    println!("{table}");
}

fn status_cell(report: &LoadReport) -> Cell {
    if let Some(error) = &report.batch_error {
        return Cell::new(format!("failed: {}", error.kind()))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold);
    }
    if report.is_truncated() {
        return Cell::new(format!("truncated ({})", report.policy))
            .fg(Color::Red)
            .add_attribute(Attribute::Bold);
    }
    if report.missing_columns.is_empty() {
        Cell::new("✓").fg(Color::Green).add_attribute(Attribute::Bold)
    } else {
        Cell::new(format!("null: {}", report.missing_columns.join(", "))).fg(Color::Yellow)
    }
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn count_cell(count: Option<usize>, color: Color) -> Cell {
    match count {
        Some(value) if value > 0 => Cell::new(value).fg(color).add_attribute(Attribute::Bold),
        Some(value) => dim_cell(value),
        None => dim_cell("-"),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn name_cell(name: &str) -> Cell {
    Cell::new(name)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
