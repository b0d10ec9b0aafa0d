use std::sync::Arc;

use super::operator::{OpIterator, Operator, OperatorState};
use crate::core::{Result, Row, Schema};
use crate::storage::{Catalog, HeapFile, HeapScan, PageCache};
use crate::transaction::TransactionId;

/// Sequential scan - leaf operator reading every row of one table.
///
/// Rows keep their record id so a `Delete` above can address them.
pub struct SeqScan {
    scan: HeapScan,
    schema: Schema,
    alias: Option<String>,
    state: OperatorState,
}

impl SeqScan {
    /// Scan `file`; with an alias, field names become `alias.name`
    pub fn new(
        file: Arc<HeapFile>,
        txn: TransactionId,
        cache: Arc<dyn PageCache>,
        alias: Option<&str>,
    ) -> Self {
        let schema = match alias {
            Some(alias) => file.schema().with_alias(alias),
            None => file.schema().clone(),
        };
        Self {
            scan: file.scan(txn, cache),
            schema,
            alias: alias.map(str::to_string),
            state: OperatorState::default(),
        }
    }

    pub fn from_catalog(
        catalog: &Catalog,
        table_id: u32,
        txn: TransactionId,
        cache: Arc<dyn PageCache>,
        alias: Option<&str>,
    ) -> Result<Self> {
        let file = catalog.heap_file(table_id)?;
        Ok(Self::new(file, txn, cache, alias))
    }

    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}

impl Operator for SeqScan {
    fn name(&self) -> &'static str {
        "seq_scan"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.scan.open()
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        if self.scan.has_next()? {
            self.scan.next().map(Some)
        } else {
            Ok(None)
        }
    }

    fn rewind_inner(&mut self) -> Result<()> {
        self.scan.rewind()
    }

    fn close_inner(&mut self) {
        self.scan.close();
    }

    fn output_schema(&self) -> &Schema {
        &self.schema
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        Vec::new()
    }
}
