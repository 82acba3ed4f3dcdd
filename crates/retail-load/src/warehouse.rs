//! The destination handle the loader writes through.

use retail_model::TableSchema;

use crate::error::Result;
use crate::value::SqlValue;

/// A relational destination for table batches.
///
/// The loader drives one table at a time: `prepare`, `begin`, one `insert`
/// per row in source order, then `commit`. A failed `insert` must leave the
/// open batch usable, so earlier rows can still be committed.
///
/// Handles are passed to the loader explicitly and release their
/// connection when dropped.
pub trait Warehouse {
    /// Creates the table if it does not exist yet.
    fn prepare(&mut self, schema: &TableSchema) -> Result<()>;

    /// Opens the batch for `schema`.
    fn begin(&mut self, schema: &TableSchema) -> Result<()>;

    /// Inserts one row; `row` follows `schema.columns` order.
    fn insert(&mut self, schema: &TableSchema, row: &[SqlValue]) -> Result<()>;

    /// Makes every row inserted since `begin` durable.
    fn commit(&mut self, schema: &TableSchema) -> Result<()>;

    /// Discards the open batch.
    fn rollback(&mut self, schema: &TableSchema) -> Result<()>;

    /// Rows currently stored in `table`.
    fn row_count(&mut self, table: &str) -> Result<u64>;
}

impl<W: Warehouse + ?Sized> Warehouse for &mut W {
    fn prepare(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).prepare(schema)
    }

    fn begin(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).begin(schema)
    }

    fn insert(&mut self, schema: &TableSchema, row: &[SqlValue]) -> Result<()> {
        (**self).insert(schema, row)
    }

    fn commit(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).commit(schema)
    }

    fn rollback(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).rollback(schema)
    }

    fn row_count(&mut self, table: &str) -> Result<u64> {
        (**self).row_count(table)
    }
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn prepare(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).prepare(schema)
    }

    fn begin(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).begin(schema)
    }

    fn insert(&mut self, schema: &TableSchema, row: &[SqlValue]) -> Result<()> {
        (**self).insert(schema, row)
    }

    fn commit(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).commit(schema)
    }

    fn rollback(&mut self, schema: &TableSchema) -> Result<()> {
        (**self).rollback(schema)
    }

    fn row_count(&mut self, table: &str) -> Result<u64> {
        (**self).row_count(table)
    }
}
