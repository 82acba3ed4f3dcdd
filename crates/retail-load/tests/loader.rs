//! Table loads against the in-memory warehouse.

use std::time::Duration;

use proptest::prelude::*;
use retail_load::{BulkLoader, LoadError, LoadOptions, MemoryWarehouse, RetryPolicy, SqlValue};
use retail_model::{LoadPolicy, Relation, WarehouseTable};

fn options(policy: LoadPolicy) -> LoadOptions {
    LoadOptions {
        policy,
        retry: RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::none()
        },
        ..LoadOptions::default()
    }
}

/// Ten payments; the third repeats the first payment id.
fn payments_with_duplicate() -> Relation {
    let ids = ["1", "2", "1", "4", "5", "6", "7", "8", "9", "10"];
    let mut relation = Relation::new(
        "payments",
        ["payment_id", "payment_method", "amount", "status", "payment_date"]
            .map(String::from)
            .to_vec(),
    );
    for id in ids {
        relation
            .push_row(
                [id, "Cash", "15.99", "Completed", "03/15/2024"]
                    .map(retail_model::CellValue::from_raw)
                    .to_vec(),
            )
            .expect("row");
    }
    relation
}

fn stores(count: usize) -> Relation {
    let mut relation = Relation::new("stores", ["store_id", "city", "name"].map(String::from).to_vec());
    for id in 1..=count {
        relation
            .push_row(
                [id.to_string().as_str(), "Leeds", "Harbour Fish"]
                    .map(retail_model::CellValue::from_raw)
                    .to_vec(),
            )
            .expect("row");
    }
    relation
}

#[test]
fn fail_fast_commits_rows_before_the_failure() {
    let mut warehouse = MemoryWarehouse::new();
    let schema = WarehouseTable::Payments.schema();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
        .load_table(&schema, &payments_with_duplicate())
        .expect("no fatal failure");

    assert_eq!(report.source_rows, 10);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.not_attempted, 7);
    assert_eq!(report.not_loaded(), 8);
    assert!(report.is_truncated());
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.row_index, 2);
    assert_eq!(failure.key, "payment_id=1");
    assert!(matches!(failure.cause, LoadError::Constraint(_)));
    assert_eq!(failure.attempts, 1);
    assert_eq!(report.readback_rows, Some(2));
    assert_eq!(warehouse.rows("DT_Payments").len(), 2);
}

#[test]
fn skip_and_continue_loads_every_other_row() {
    let mut warehouse = MemoryWarehouse::new();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::SkipAndContinue))
        .load_table(&WarehouseTable::Payments.schema(), &payments_with_duplicate())
        .expect("no fatal failure");

    assert_eq!(report.inserted, 9);
    assert_eq!(report.not_attempted, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].row_index, 2);
    assert_eq!(warehouse.rows("DT_Payments").len(), 9);
}

#[test]
fn date_columns_are_stored_as_timestamps_or_null() {
    let unparseable = payments_with_duplicate()
        .map_column("payment_date", |_| {
            retail_model::CellValue::text("15/03/2024 10:00:00")
        })
        .expect("column");
    let mut relation_ok = Relation::new("payments", unparseable.columns().to_vec());
    relation_ok
        .push_row(
            ["1", "Cash", "1.00", "Completed", "03/15/2024"]
                .map(retail_model::CellValue::from_raw)
                .to_vec(),
        )
        .expect("row");

    let mut warehouse = MemoryWarehouse::new();
    let schema = WarehouseTable::Payments.schema();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
        .load_table(&schema, &relation_ok)
        .expect("load");
    assert_eq!(report.inserted, 1);
    assert!(matches!(warehouse.rows("DT_Payments")[0][3], SqlValue::Timestamp(_)));

    let mut warehouse = MemoryWarehouse::new();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::SkipAndContinue))
        .load_table(&schema, &unparseable)
        .expect("load");
    assert_eq!(report.inserted, 9);
    assert!(
        warehouse
            .rows("DT_Payments")
            .iter()
            .all(|row| row[3] == SqlValue::Null)
    );
}

#[test]
fn transient_failures_are_retried() {
    let mut warehouse = MemoryWarehouse::new()
        .fail_insert("DT_Stores", 1, LoadError::Timeout { elapsed_ms: 5 })
        .fail_insert("DT_Stores", 2, LoadError::Timeout { elapsed_ms: 5 });
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
        .load_table(&WarehouseTable::Stores.schema(), &stores(3))
        .expect("load");

    assert_eq!(report.inserted, 3);
    assert!(report.failures.is_empty());
    assert_eq!(warehouse.rows("DT_Stores").len(), 3);
}

#[test]
fn retries_are_bounded() {
    let mut warehouse = MemoryWarehouse::new()
        .fail_insert("DT_Stores", 1, LoadError::Timeout { elapsed_ms: 5 })
        .fail_insert("DT_Stores", 2, LoadError::Timeout { elapsed_ms: 5 })
        .fail_insert("DT_Stores", 3, LoadError::Timeout { elapsed_ms: 5 });
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
        .load_table(&WarehouseTable::Stores.schema(), &stores(4))
        .expect("timeouts are not fatal");

    assert_eq!(report.inserted, 1);
    assert_eq!(report.failures[0].row_index, 1);
    assert_eq!(report.failures[0].attempts, 3);
    assert_eq!(report.failures[0].key, "store_id=2");
    assert!(matches!(report.failures[0].cause, LoadError::Timeout { .. }));
    assert_eq!(report.not_attempted, 2);
}

#[test]
fn non_numeric_values_fail_without_retry() {
    let products = Relation::from_text_rows(
        "products",
        &["product_id", "name", "category", "price"],
        &[
            &["1", "Grilled Salmon", "Fish", "15.99"],
            &["2", "Fish Tacos", "Fish", "n/a"],
            &["3", "Chips", "Sides", "3.50"],
        ],
    )
    .expect("fixture");
    let mut warehouse = MemoryWarehouse::new();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::SkipAndContinue))
        .load_table(&WarehouseTable::Products.schema(), &products)
        .expect("load");

    assert_eq!(report.inserted, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, "product_id=2");
    assert_eq!(report.failures[0].attempts, 1);
    assert!(matches!(report.failures[0].cause, LoadError::Coercion { .. }));
}

#[test]
fn missing_columns_load_as_null_unless_required() {
    let customers = Relation::from_text_rows(
        "customers",
        &["customer_id", "name"],
        &[&["11", "Ada"], &["12", "Grace"]],
    )
    .expect("fixture");
    let schema = WarehouseTable::Customers.schema();

    let mut warehouse = MemoryWarehouse::new();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
        .load_table(&schema, &customers)
        .expect("load");
    assert_eq!(report.missing_columns, vec!["zip_code".to_string()]);
    assert_eq!(report.inserted, 2);
    assert_eq!(warehouse.rows("DT_Customers")[0][2], SqlValue::Null);

    let mut warehouse = MemoryWarehouse::new();
    let strict = LoadOptions {
        require_columns: true,
        ..options(LoadPolicy::FailFast)
    };
    let report = BulkLoader::new(&mut warehouse, strict)
        .load_table(&schema, &customers)
        .expect("refusal is not fatal");
    assert_eq!(report.inserted, 0);
    assert_eq!(report.not_attempted, 2);
    assert_eq!(
        report.batch_error,
        Some(LoadError::MissingColumns(vec!["zip_code".to_string()]))
    );
    assert!(warehouse.rows("DT_Customers").is_empty());
}

#[test]
fn connection_loss_aborts_the_remaining_tables() {
    let customers = Relation::from_text_rows(
        "customers",
        &["customer_id", "name", "zip_code"],
        &[&["11", "Ada", "10115"]],
    )
    .expect("fixture");
    let stores = stores(3);
    let payments = payments_with_duplicate();
    let batches = [
        (WarehouseTable::Customers.schema(), &customers),
        (WarehouseTable::Stores.schema(), &stores),
        (WarehouseTable::Payments.schema(), &payments),
    ];

    let mut warehouse = MemoryWarehouse::new().fail_insert(
        "DT_Stores",
        1,
        LoadError::Connection("server closed the connection".into()),
    );
    let aborted = BulkLoader::new(&mut warehouse, options(LoadPolicy::SkipAndContinue))
        .load_all(&batches)
        .expect_err("connection loss is fatal");

    assert_eq!(aborted.table, "DT_Stores");
    assert!(matches!(aborted.cause, LoadError::Connection(_)));
    assert_eq!(aborted.reports.len(), 2);
    assert_eq!(aborted.reports[0].inserted, 1);
    let stores_report = &aborted.reports[1];
    assert_eq!(stores_report.inserted, 0);
    assert_eq!(stores_report.failures[0].attempts, 3);
    assert_eq!(stores_report.not_attempted, 1);

    assert_eq!(warehouse.rows("DT_Customers").len(), 1);
    assert!(warehouse.rows("DT_Stores").is_empty());
    assert!(warehouse.rows("DT_Payments").is_empty());
}

#[test]
fn expired_batch_deadline_stops_the_table() {
    let mut warehouse = MemoryWarehouse::new();
    let options = LoadOptions {
        batch_timeout: Some(Duration::ZERO),
        ..options(LoadPolicy::SkipAndContinue)
    };
    let report = BulkLoader::new(&mut warehouse, options)
        .load_table(&WarehouseTable::Stores.schema(), &stores(5))
        .expect("timeouts are not fatal");

    assert_eq!(report.inserted, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].attempts, 0);
    assert!(matches!(report.failures[0].cause, LoadError::Timeout { .. }));
    assert_eq!(report.not_attempted, 4);
    assert_eq!(report.not_loaded(), 5);
}

#[test]
fn untyped_column_lists_load_by_name() {
    let orders = Relation::from_text_rows(
        "sales_orders",
        &["order_id", "order_date"],
        &[&["1", "2024-03-15 10:00:00"]],
    )
    .expect("fixture");
    let mut warehouse = MemoryWarehouse::new();
    let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
        .load_columns("STG_Orders", &orders, &["order_id", "order_date", "channel"])
        .expect("load");

    assert_eq!(report.inserted, 1);
    assert_eq!(report.missing_columns, vec!["channel".to_string()]);
    let row = &warehouse.rows("STG_Orders")[0];
    assert_eq!(row[0], SqlValue::Text("1".into()));
    assert!(matches!(row[1], SqlValue::Timestamp(_)));
    assert_eq!(row[2], SqlValue::Null);
}

proptest! {
    #[test]
    fn clean_loads_read_back_the_source_count(count in 0usize..40) {
        let mut warehouse = MemoryWarehouse::new();
        let report = BulkLoader::new(&mut warehouse, options(LoadPolicy::FailFast))
            .load_table(&WarehouseTable::Stores.schema(), &stores(count))
            .expect("load");
        prop_assert!(report.failures.is_empty());
        prop_assert_eq!(report.inserted, count);
        prop_assert_eq!(report.readback_rows, Some(count as u64));
    }
}
