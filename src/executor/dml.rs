//! DML (Data Manipulation Language) operators
//!
//! INSERT and DELETE drain their child into the page cache and report how
//! many rows they wrote as a single `(count INT)` row. Each open (or rewind)
//! writes at most once: after the count row the operator is exhausted.

use std::sync::Arc;

use super::operator::{BoxedOperator, OpIterator, Operator, OperatorState};
use crate::core::{DataType, DatabaseError, Result, Row, Schema, Value};
use crate::storage::{Catalog, PageCache};
use crate::transaction::TransactionId;

fn count_schema() -> Result<Schema> {
    Schema::named(&[(DataType::Int, "count")])
}

fn count_row(count: usize) -> Result<Row> {
    let count = i32::try_from(count).map_err(|_| {
        DatabaseError::InvalidArgument(format!("row count {count} does not fit in INT"))
    })?;
    Ok(Row::new(vec![Value::Int(count)]))
}

/// Failures of the write path surface as storage errors; aborts pass through
fn write_error(err: DatabaseError) -> DatabaseError {
    match err {
        DatabaseError::Io(e) => DatabaseError::StorageIo(e.to_string()),
        other => other,
    }
}

/// Insert - writes every child row into one table
pub struct Insert {
    txn: TransactionId,
    cache: Arc<dyn PageCache>,
    table_id: u32,
    child: BoxedOperator,
    schema: Schema,
    done: bool,
    state: OperatorState,
}

impl Insert {
    /// Fails with `SchemaMismatch` if the child's rows do not fit the table
    pub fn new(
        txn: TransactionId,
        cache: Arc<dyn PageCache>,
        catalog: &Catalog,
        table_id: u32,
        child: BoxedOperator,
    ) -> Result<Self> {
        let table_schema = catalog.schema(table_id)?;
        if child.schema() != &table_schema {
            return Err(DatabaseError::SchemaMismatch(format!(
                "cannot insert ({}) into table with ({table_schema})",
                child.schema()
            )));
        }

        Ok(Self {
            txn,
            cache,
            table_id,
            child,
            schema: count_schema()?,
            done: false,
            state: OperatorState::default(),
        })
    }

    #[must_use]
    pub const fn table_id(&self) -> u32 {
        self.table_id
    }

    #[must_use]
    pub fn into_child(self) -> BoxedOperator {
        self.child
    }
}

impl Operator for Insert {
    fn name(&self) -> &'static str {
        "insert"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0;
        while self.child.has_next()? {
            let row = self.child.next()?;
            self.cache
                .insert_row(self.txn, self.table_id, &row)
                .map_err(write_error)?;
            count += 1;
        }

        tracing::debug!(txn = %self.txn, table_id = self.table_id, count, "inserted rows");
        count_row(count).map(Some)
    }

    fn rewind_inner(&mut self) -> Result<()> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn close_inner(&mut self) {
        self.child.close();
    }

    fn output_schema(&self) -> &Schema {
        &self.schema
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}

/// Delete - removes every child row, addressed by its record id
pub struct Delete {
    txn: TransactionId,
    cache: Arc<dyn PageCache>,
    child: BoxedOperator,
    schema: Schema,
    done: bool,
    state: OperatorState,
}

impl Delete {
    pub fn new(
        txn: TransactionId,
        cache: Arc<dyn PageCache>,
        child: BoxedOperator,
    ) -> Result<Self> {
        Ok(Self {
            txn,
            cache,
            child,
            schema: count_schema()?,
            done: false,
            state: OperatorState::default(),
        })
    }

    #[must_use]
    pub fn into_child(self) -> BoxedOperator {
        self.child
    }
}

impl Operator for Delete {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.child.open()?;
        self.done = false;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0;
        while self.child.has_next()? {
            let row = self.child.next()?;
            self.cache.delete_row(self.txn, &row).map_err(write_error)?;
            count += 1;
        }

        tracing::debug!(txn = %self.txn, count, "deleted rows");
        count_row(count).map(Some)
    }

    fn rewind_inner(&mut self) -> Result<()> {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn close_inner(&mut self) {
        self.child.close();
    }

    fn output_schema(&self) -> &Schema {
        &self.schema
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}
