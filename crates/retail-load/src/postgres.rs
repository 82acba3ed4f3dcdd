//! PostgreSQL warehouse over `tokio-postgres`.
//!
//! The loader is synchronous, so the client is driven through a private
//! current-thread runtime. Each table batch runs in one transaction and each
//! row in its own savepoint: a rejected row is rolled back on its own and
//! the rows before it can still be committed.
//!
//! The row timeout is enforced twice. The server gets it as
//! `statement_timeout` for the batch transaction, and a row that outlives it
//! on the client is cancelled before its savepoint is rolled back.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::NaiveDateTime;
use retail_model::{ColumnType, TableSchema};
use tokio::runtime::Runtime;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Statement};
use tracing::{debug, info, warn};

use crate::error::{LoadError, Result};
use crate::value::SqlValue;
use crate::warehouse::Warehouse;

/// Connection parameters for [`PostgresWarehouse::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    /// Database (service) name.
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    /// Upper bound for a single row insert.
    pub row_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "retail".to_string(),
            user: "postgres".to_string(),
            password: None,
            connect_timeout: Duration::from_secs(10),
            row_timeout: Duration::from_secs(5),
        }
    }
}

pub struct PostgresWarehouse {
    client: Client,
    statements: HashMap<String, Statement>,
    row_timeout: Duration,
    runtime: Runtime,
}

impl PostgresWarehouse {
    pub fn connect(config: &PostgresConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| LoadError::Connection(format!("starting runtime: {err}")))?;

        let mut pg = tokio_postgres::Config::new();
        pg.host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user)
            .connect_timeout(config.connect_timeout);
        if let Some(password) = &config.password {
            pg.password(password);
        }

        let (client, connection) = runtime
            .block_on(pg.connect(NoTls))
            .map_err(|err| LoadError::Connection(err.to_string()))?;
        runtime.spawn(async move {
            if let Err(error) = connection.await {
                warn!(%error, "warehouse connection closed with error");
            }
        });
        info!(
            host = %config.host,
            port = config.port,
            dbname = %config.dbname,
            "connected to warehouse"
        );

        Ok(Self {
            client,
            statements: HashMap::new(),
            row_timeout: config.row_timeout,
            runtime,
        })
    }

    fn batch_execute(&self, sql: &str) -> Result<()> {
        self.runtime
            .block_on(self.client.batch_execute(sql))
            .map_err(LoadError::from)
    }
}

impl Drop for PostgresWarehouse {
    fn drop(&mut self) {
        debug!("releasing warehouse connection");
    }
}

fn to_param(value: &SqlValue, column_type: ColumnType) -> Box<dyn ToSql + Sync> {
    match value {
        SqlValue::Null => match column_type {
            ColumnType::Integer => Box::new(None::<i64>),
            ColumnType::Decimal => Box::new(None::<f64>),
            ColumnType::Text => Box::new(None::<String>),
            ColumnType::Timestamp => Box::new(None::<NaiveDateTime>),
        },
        SqlValue::Integer(value) => Box::new(*value),
        SqlValue::Float(value) => Box::new(*value),
        SqlValue::Text(value) => Box::new(value.clone()),
        SqlValue::Timestamp(value) => Box::new(*value),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Opens the batch transaction with a server-side bound on every statement.
fn begin_sql(row_timeout: Duration) -> String {
    format!(
        "BEGIN; SET LOCAL statement_timeout = {}",
        millis(row_timeout).max(1)
    )
}

/// Awaits a warehouse round trip for at most `limit`. No answer in time
/// means the connection can no longer be trusted.
async fn bounded<T>(
    limit: Duration,
    what: &str,
    request: impl Future<Output = std::result::Result<T, tokio_postgres::Error>>,
) -> Result<T> {
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result.map_err(LoadError::from),
        Err(_) => Err(LoadError::Connection(format!(
            "no answer to {what} within {} ms",
            millis(limit)
        ))),
    }
}

async fn insert_row(
    client: &Client,
    statement: &Statement,
    params: &[&(dyn ToSql + Sync)],
    row_timeout: Duration,
) -> Result<()> {
    bounded(row_timeout, "savepoint", client.batch_execute("SAVEPOINT retail_row")).await?;
    let started = Instant::now();
    let outcome = match tokio::time::timeout(row_timeout, client.execute(statement, params)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => match LoadError::from(err) {
            LoadError::Timeout { .. } => Err(LoadError::Timeout {
                elapsed_ms: millis(started.elapsed()),
            }),
            other => Err(other),
        },
        Err(_) => {
            // Dropping the future leaves the statement running on the server.
            bounded(row_timeout, "cancel request", client.cancel_token().cancel_query(NoTls)).await?;
            Err(LoadError::Timeout {
                elapsed_ms: millis(started.elapsed()),
            })
        }
    };
    let settle = match outcome {
        Ok(()) => "RELEASE SAVEPOINT retail_row",
        Err(_) => "ROLLBACK TO SAVEPOINT retail_row",
    };
    bounded(row_timeout, "savepoint", client.batch_execute(settle)).await?;
    outcome
}

impl Warehouse for PostgresWarehouse {
    fn prepare(&mut self, schema: &TableSchema) -> Result<()> {
        self.batch_execute(&schema.create_table_sql())?;
        let statement = self
            .runtime
            .block_on(self.client.prepare(&schema.insert_sql()))?;
        self.statements.insert(schema.name.clone(), statement);
        Ok(())
    }

    fn begin(&mut self, _schema: &TableSchema) -> Result<()> {
        self.batch_execute(&begin_sql(self.row_timeout))
    }

    fn insert(&mut self, schema: &TableSchema, row: &[SqlValue]) -> Result<()> {
        let Some(statement) = self.statements.get(&schema.name) else {
            return Err(LoadError::Rejected(format!("{} was not prepared", schema.name)));
        };
        let params: Vec<Box<dyn ToSql + Sync>> = schema
            .columns
            .iter()
            .zip(row)
            .map(|(column, value)| to_param(value, column.column_type))
            .collect();
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(AsRef::as_ref).collect();
        self.runtime
            .block_on(insert_row(&self.client, statement, &refs, self.row_timeout))
    }

    fn commit(&mut self, _schema: &TableSchema) -> Result<()> {
        self.batch_execute("COMMIT")
    }

    fn rollback(&mut self, _schema: &TableSchema) -> Result<()> {
        self.batch_execute("ROLLBACK")
    }

    fn row_count(&mut self, table: &str) -> Result<u64> {
        let row = self
            .runtime
            .block_on(self.client.query_one(&format!("SELECT COUNT(*) FROM {table}"), &[]))?;
        let count: i64 = row.try_get(0)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
