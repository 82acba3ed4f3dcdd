//! End-to-end runs over extracts written to a temp directory.

use std::fs;
use std::path::Path;

use retail_cli::config::PipelineConfig;
use retail_cli::pipeline::{LOAD_REPORT_FILE, RunOptions, run};
use retail_cli::types::{LoadOutcome, LoadTarget};
use retail_model::{LoadPolicy, SourceKind};

fn write_extracts(dir: &Path, payments: &str) {
    let files = [
        (
            "customers.csv",
            "customer_id,name,zip_code\n11,Ada Byron,10115\n12,Grace Hopper,20095\n",
        ),
        (
            "products.csv",
            "product_id,name,category,price\n1,Grilled Salmon,Fish,15.99\n2,Fish Tacos,Fish,12.99\n",
        ),
        ("stores.csv", "store_id,name,city\n3,Harbour Fish,Leeds\n"),
        (
            "inventory.csv",
            "store_id,product_id,stock_quantity,last_updated\n3,1,48,02/05/2024\n",
        ),
        ("payments.csv", payments),
        (
            "invoices.csv",
            "invoice_id,order_id,invoice_date,total_invoice_amount\n1,1,16-03-2024,31.98\n",
        ),
        (
            "order_details.csv",
            "order_id,product_id,quantity,unit_price,total_price\n\
             1,1,2,15.99,31.98\n\
             2,2,1,12.99,12.99\n\
             7,1,1,15.99,15.99\n",
        ),
        (
            "sales_orders.csv",
            "order_id,store_id,customer_id,order_date,total_amount\n\
             1,3,11,2024-03-16 10:00:00,31.98\n\
             2,3,12,15/03/2024 10:00:00,12.99\n",
        ),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("write extract");
    }
}

const PAYMENTS: &str =
    "payment_id,payment_method,amount,status,payment_date\n1,Cash,31.98,Completed,03/16/2024\n";

fn options(data_dir: &Path, target: LoadTarget) -> RunOptions {
    RunOptions {
        data_dir: data_dir.to_path_buf(),
        output_dir: data_dir.join("output"),
        config: PipelineConfig::default(),
        target,
    }
}

#[test]
fn dry_run_loads_every_table() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path(), PAYMENTS);

    let result = run(&options(dir.path(), LoadTarget::Memory)).expect("run");

    assert!(!result.has_errors());
    assert_eq!(result.stats.fact_rows, 2);
    assert_eq!(result.stats.unknown_seasons, 1);
    let inventory = result
        .sources
        .iter()
        .find(|source| source.kind == SourceKind::Inventory)
        .expect("inventory summary");
    assert_eq!(inventory.date_fallbacks, Some(0));

    let LoadOutcome::Completed(reports) = &result.load else {
        panic!("load did not complete: {:?}", result.load);
    };
    let tables: Vec<&str> = reports.iter().map(|report| report.table.as_str()).collect();
    assert_eq!(
        tables,
        ["DT_Customers", "DT_Products", "DT_Stores", "DT_Payments", "DT_Invoices", "FT_Sales"]
    );
    for report in reports {
        assert_eq!(report.inserted, report.source_rows, "{}", report.table);
        assert_eq!(report.readback_rows, Some(report.source_rows as u64));
    }
}

#[test]
fn fact_sales_is_written_to_the_output_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path(), PAYMENTS);

    let result = run(&options(dir.path(), LoadTarget::Skip)).expect("run");

    assert!(matches!(result.load, LoadOutcome::Skipped));
    assert!(result.load_report.is_none());
    let csv = fs::read_to_string(&result.fact_sales).expect("fact_sales.csv");
    insta::assert_snapshot!(csv, @r"
    order_id,store_id,customer_id,order_date,total_amount,product_id,quantity,unit_price,total_price,payment_id,payment_method,amount,status,payment_date,invoice_id,invoice_date,total_invoice_amount,store_id_right,customer_id_right,order_date_right,total_amount_right,season,day_category
    1,3,11,2024-03-16 10:00:00,31.98,1,2,15.99,31.98,1,Cash,31.98,Completed,2024-03-16,1,2024-03-16,31.98,3,11,2024-03-16 10:00:00,31.98,Spring,Weekend
    2,3,12,15/03/2024 10:00:00,12.99,2,1,12.99,12.99,,,,,,,,,,,,,Unknown,Unknown
    ");
}

#[test]
fn truncated_table_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(
        dir.path(),
        "payment_id,payment_method,amount,status,payment_date\n\
         1,Cash,31.98,Completed,03/16/2024\n\
         1,Cash,31.98,Completed,03/16/2024\n\
         2,Credit Card,12.99,Pending,03/15/2024\n",
    );

    let result = run(&options(dir.path(), LoadTarget::Memory)).expect("run");

    assert!(result.has_errors());
    let payments = result
        .load
        .reports()
        .iter()
        .find(|report| report.table == "DT_Payments")
        .expect("payments report");
    assert_eq!(payments.policy, LoadPolicy::FailFast);
    assert_eq!(payments.inserted, 1);
    assert_eq!(payments.failures[0].key, "payment_id=1");
    assert_eq!(payments.not_attempted, 1);

    let report_path = result.load_report.expect("load report written");
    assert!(report_path.ends_with(LOAD_REPORT_FILE));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(report_path).expect("read report"))
            .expect("valid json");
    assert_eq!(json[3]["table"], "DT_Payments");
    assert_eq!(json[3]["failures"][0]["cause"]["kind"], "constraint");
}

#[test]
fn missing_extract_fails_the_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path(), PAYMENTS);
    fs::remove_file(dir.path().join("order_details.csv")).expect("remove");

    let err = run(&options(dir.path(), LoadTarget::Memory)).expect_err("incomplete extracts");
    assert!(format!("{err:#}").contains("order_details.csv"));
}
