use std::fs;
use std::path::Path;

use retail_ingest::{IngestError, discover_extracts, export_relation, load_sources};
use retail_model::{CellValue, ModelError, Relation, SourceKind};

fn write_extracts(dir: &Path) {
    let files = [
        ("customers.csv", "customer_id,name,zip_code\n1,Ada Byron,10115\n"),
        ("products.csv", "product_id,name,category,price\n1,Grilled Salmon,Fish,15.99\n"),
        ("stores.csv", "store_id,name,city\n1,Harbour Fish,Leeds\n"),
        (
            "inventory.csv",
            "store_id,product_id,stock_quantity,last_updated\n1,1,48,2024-05-02\n",
        ),
        (
            "payments.csv",
            "payment_id,payment_method,amount,status,payment_date\n1,Cash,31.98,Completed,03/15/2024\n",
        ),
        (
            "invoices.csv",
            "invoice_id,order_id,invoice_date,total_invoice_amount\n1,1,15-03-2024,31.98\n",
        ),
        (
            "order_details.csv",
            "order_id,product_id,quantity,unit_price,total_price\n1,1,2,15.99,31.98\n",
        ),
        (
            "sales_orders.csv",
            "order_id,store_id,customer_id,order_date,total_amount\n1,1,1,2024-03-15 10:00:00,31.98\n",
        ),
    ];
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("write extract");
    }
}

#[test]
fn discovers_every_extract_and_ignores_others() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path());
    fs::write(dir.path().join("returns.csv"), "a\n1\n").expect("write extra");
    fs::write(dir.path().join("notes.txt"), "not csv").expect("write extra");

    let found = discover_extracts(dir.path()).expect("discover");

    assert_eq!(found.len(), SourceKind::ALL.len());
    assert!(found[&SourceKind::OrderDetails].ends_with("order_details.csv"));
}

#[test]
fn missing_extract_is_named() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path());
    fs::remove_file(dir.path().join("invoices.csv")).expect("remove");

    match discover_extracts(dir.path()) {
        Err(IngestError::MissingExtracts { files, .. }) => {
            assert_eq!(files, vec!["invoices.csv".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn load_sources_reads_all_tables() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path());

    let sources = load_sources(dir.path()).expect("load");

    assert_eq!(sources.total_rows(), 8);
    assert_eq!(
        sources.get(SourceKind::Payments).value(0, "payment_date"),
        Some(&CellValue::text("03/15/2024"))
    );
}

#[test]
fn misnamed_header_fails_at_ingest() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_extracts(dir.path());
    fs::write(
        dir.path().join("invoices.csv"),
        "invoice_id,order_id,invoice_date,totat_invoice_amount\n1,1,15-03-2024,31.98\n",
    )
    .expect("rewrite");

    let err = load_sources(dir.path()).expect_err("bad header");
    match err {
        IngestError::Schema {
            source: ModelError::MissingColumns { table, columns },
            ..
        } => {
            assert_eq!(table, "invoices");
            assert_eq!(columns, vec!["total_invoice_amount".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_directory_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = discover_extracts(&dir.path().join("nope")).expect_err("no dir");
    assert!(matches!(err, IngestError::DirectoryNotFound { .. }));
}

#[test]
fn export_creates_output_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let output = dir.path().join("output");
    let relation =
        Relation::from_text_rows("fact_sales", &["order_id"], &[&["1"]]).expect("fixture");

    let path = export_relation(&output, &relation).expect("export");

    assert_eq!(path, output.join("fact_sales.csv"));
    assert!(path.is_file());
}
