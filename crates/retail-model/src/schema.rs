//! Source and warehouse schema descriptors.
//!
//! Sources are validated once when they are read so a misnamed header fails
//! at ingest time instead of surfacing as nulls in the warehouse.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::relation::Relation;

/// The fixed set of upstream extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Customers,
    Products,
    Stores,
    Inventory,
    Payments,
    Invoices,
    OrderDetails,
    SalesOrders,
}

impl SourceKind {
    pub const ALL: [SourceKind; 8] = [
        SourceKind::Customers,
        SourceKind::Products,
        SourceKind::Stores,
        SourceKind::Inventory,
        SourceKind::Payments,
        SourceKind::Invoices,
        SourceKind::OrderDetails,
        SourceKind::SalesOrders,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Products => "products",
            Self::Stores => "stores",
            Self::Inventory => "inventory",
            Self::Payments => "payments",
            Self::Invoices => "invoices",
            Self::OrderDetails => "order_details",
            Self::SalesOrders => "sales_orders",
        }
    }

    /// Header every extract of this kind must carry (order not enforced).
    pub const fn expected_columns(self) -> &'static [&'static str] {
        match self {
            Self::Customers => &["customer_id", "name", "zip_code"],
            Self::Products => &["product_id", "name", "category", "price"],
            Self::Stores => &["store_id", "city", "name"],
            Self::Inventory => &["store_id", "product_id", "stock_quantity", "last_updated"],
            Self::Payments => &[
                "payment_id",
                "payment_method",
                "amount",
                "status",
                "payment_date",
            ],
            Self::Invoices => &[
                "invoice_id",
                "order_id",
                "total_invoice_amount",
                "invoice_date",
            ],
            Self::OrderDetails => &[
                "order_id",
                "product_id",
                "quantity",
                "unit_price",
                "total_price",
            ],
            Self::SalesOrders => &[
                "order_id",
                "store_id",
                "customer_id",
                "order_date",
                "total_amount",
            ],
        }
    }

    /// Date column that the normalizer rewrites, if any.
    pub const fn date_column(self) -> Option<&'static str> {
        match self {
            Self::Inventory => Some("last_updated"),
            Self::Payments => Some("payment_date"),
            Self::Invoices => Some("invoice_date"),
            Self::SalesOrders => Some("order_date"),
            Self::Customers | Self::Products | Self::Stores | Self::OrderDetails => None,
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.csv", self.name())
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Checks a header against [`SourceKind::expected_columns`].
    pub fn validate_header<S: AsRef<str>>(self, header: &[S]) -> Result<()> {
        let missing: Vec<String> = self
            .expected_columns()
            .iter()
            .filter(|expected| !header.iter().any(|name| name.as_ref() == **expected))
            .map(|expected| (*expected).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ModelError::MissingColumns {
                table: self.name().to_string(),
                columns: missing,
            })
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage type of a warehouse column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Decimal,
    Text,
    Timestamp,
}

impl ColumnType {
    pub const fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "BIGINT",
            Self::Decimal => "DOUBLE PRECISION",
            Self::Text => "TEXT",
            Self::Timestamp => "TIMESTAMP",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

/// True when a column name carries date semantics (`*date*`, any case).
pub fn is_date_column(name: &str) -> bool {
    name.to_ascii_lowercase().contains("date")
}

/// Destination table: ordered typed columns plus the columns that identify a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Columns rendered into failure reports to identify a row.
    pub key_columns: Vec<String>,
    /// Whether `key_columns` is declared as the primary key.
    pub unique_key: bool,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            key_columns: Vec::new(),
            unique_key: false,
        }
    }

    /// Descriptor from bare column names: `*date*` columns are timestamps,
    /// everything else text. No key columns.
    pub fn from_column_names(name: impl Into<String>, columns: &[&str]) -> Self {
        columns.iter().fold(Self::new(name), |schema, column| {
            let column_type = if is_date_column(column) {
                ColumnType::Timestamp
            } else {
                ColumnType::Text
            };
            schema.column(column, column_type)
        })
    }

    #[must_use]
    pub fn column(mut self, name: &str, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.to_string(),
            column_type,
        });
        self
    }

    #[must_use]
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.key_columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.unique_key = true;
        self
    }

    /// Identifying columns that are not enforced unique.
    #[must_use]
    pub fn identified_by(mut self, columns: &[&str]) -> Self {
        self.key_columns = columns.iter().map(|c| (*c).to_string()).collect();
        self.unique_key = false;
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn key_indices(&self) -> Vec<usize> {
        self.key_columns
            .iter()
            .filter_map(|key| self.columns.iter().position(|c| &c.name == key))
            .collect()
    }

    /// Destination columns with no counterpart in `relation`.
    pub fn missing_columns(&self, relation: &Relation) -> Vec<String> {
        self.columns
            .iter()
            .filter(|column| !relation.has_column(&column.name))
            .map(|column| column.name.clone())
            .collect()
    }

    pub fn create_table_sql(&self) -> String {
        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("    {} {}", column.name, column.column_type.sql_type()))
            .collect();
        if self.unique_key && !self.key_columns.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", self.key_columns.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.name,
            lines.join(",\n")
        )
    }

    /// Positional (`$1, $2, ...`) insert statement in column order.
    pub fn insert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("${i}")).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.name,
            self.column_names().join(", "),
            placeholders.join(", ")
        )
    }
}

/// The warehouse tables and the relation each one is loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseTable {
    Customers,
    Products,
    Stores,
    Payments,
    Invoices,
    Sales,
}

impl WarehouseTable {
    /// Load order: dimensions first, then the fact table.
    pub const ALL: [WarehouseTable; 6] = [
        WarehouseTable::Customers,
        WarehouseTable::Products,
        WarehouseTable::Stores,
        WarehouseTable::Payments,
        WarehouseTable::Invoices,
        WarehouseTable::Sales,
    ];

    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Customers => "DT_Customers",
            Self::Products => "DT_Products",
            Self::Stores => "DT_Stores",
            Self::Payments => "DT_Payments",
            Self::Invoices => "DT_Invoices",
            Self::Sales => "FT_Sales",
        }
    }

    /// Source extract feeding this table; `None` for the derived fact table.
    pub const fn source(self) -> Option<SourceKind> {
        match self {
            Self::Customers => Some(SourceKind::Customers),
            Self::Products => Some(SourceKind::Products),
            Self::Stores => Some(SourceKind::Stores),
            Self::Payments => Some(SourceKind::Payments),
            Self::Invoices => Some(SourceKind::Invoices),
            Self::Sales => None,
        }
    }

    pub fn schema(self) -> TableSchema {
        use ColumnType::{Decimal, Integer, Text, Timestamp};

        let schema = TableSchema::new(self.table_name());
        match self {
            Self::Customers => schema
                .column("customer_id", Integer)
                .column("name", Text)
                .column("zip_code", Text)
                .primary_key(&["customer_id"]),
            Self::Products => schema
                .column("product_id", Integer)
                .column("name", Text)
                .column("category", Text)
                .column("price", Decimal)
                .primary_key(&["product_id"]),
            Self::Stores => schema
                .column("store_id", Integer)
                .column("city", Text)
                .column("name", Text)
                .primary_key(&["store_id"]),
            Self::Payments => schema
                .column("payment_id", Integer)
                .column("payment_method", Text)
                .column("status", Text)
                .column("payment_date", Timestamp)
                .primary_key(&["payment_id"]),
            Self::Invoices => schema
                .column("invoice_id", Integer)
                .column("total_invoice_amount", Decimal)
                .column("order_id", Integer)
                .column("invoice_date", Timestamp)
                .primary_key(&["invoice_id"]),
            // One order can list the same product twice, so the fact key is
            // not unique.
            Self::Sales => schema
                .column("order_id", Integer)
                .column("customer_id", Integer)
                .column("store_id", Integer)
                .column("product_id", Integer)
                .column("order_date", Timestamp)
                .column("season", Text)
                .column("day_category", Text)
                .column("quantity", Integer)
                .column("unit_price", Decimal)
                .column("total_price", Decimal)
                .column("payment_id", Integer)
                .column("invoice_id", Integer)
                .identified_by(&["order_id", "product_id"]),
        }
    }
}

impl fmt::Display for WarehouseTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}
