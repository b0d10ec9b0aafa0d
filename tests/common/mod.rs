// Shared fixtures for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use heapql::executor::{drain, Insert, OpIterator, RowsIterator, SeqScan};
use heapql::{
    BufferPool, Catalog, DataType, HeapFile, Row, Schema, TransactionId, TransactionManager, Value,
};
use tempfile::TempDir;

pub struct TestDb {
    pub dir: TempDir,
    pub catalog: Arc<Catalog>,
    pub pool: Arc<BufferPool>,
    pub tm: TransactionManager,
}

impl TestDb {
    pub fn new() -> Self {
        Self::with_pool(50, Duration::from_millis(100))
    }

    pub fn with_pool(pages: usize, lock_timeout: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(Catalog::new());
        let pool = Arc::new(BufferPool::new(Arc::clone(&catalog), pages, lock_timeout));
        Self {
            dir,
            catalog,
            pool,
            tm: TransactionManager::new(),
        }
    }

    pub fn create_table(&self, name: &str, schema: Schema) -> u32 {
        let file = HeapFile::open(self.dir.path().join(format!("{name}.dat")), schema).unwrap();
        self.catalog.add_table(file, name)
    }

    pub fn num_pages(&self, table_id: u32) -> usize {
        self.catalog.heap_file(table_id).unwrap().num_pages().unwrap()
    }

    /// Insert rows through the Insert operator; returns the reported count
    pub fn insert(&self, txn: TransactionId, table_id: u32, rows: Vec<Row>) -> i32 {
        let schema = self.catalog.schema(table_id).unwrap();
        let child = Box::new(RowsIterator::new(schema, rows).unwrap());
        let mut insert =
            Insert::new(txn, self.pool.clone(), &self.catalog, table_id, child).unwrap();
        insert.open().unwrap();
        let count = insert.next().unwrap().values[0].as_int().unwrap();
        insert.close();
        count
    }

    pub fn scan(&self, txn: TransactionId, table_id: u32) -> SeqScan {
        SeqScan::from_catalog(&self.catalog, table_id, txn, self.pool.clone(), None).unwrap()
    }

    pub fn scan_all(&self, txn: TransactionId, table_id: u32) -> Vec<Row> {
        let mut scan = self.scan(txn, table_id);
        scan.open().unwrap();
        let rows = drain(&mut scan).unwrap();
        scan.close();
        rows
    }

    pub fn commit(&self, txn: TransactionId) {
        self.pool.transaction_complete(txn, true).unwrap();
    }
}

/// `(id INT, name TEXT)`: 136-byte rows, 60 per page
pub fn people_schema() -> Schema {
    Schema::named(&[(DataType::Int, "id"), (DataType::Text, "name")]).unwrap()
}

pub fn person(id: i32) -> Row {
    Row::new(vec![Value::Int(id), Value::Text(format!("person-{id}"))])
}

pub fn people(ids: impl IntoIterator<Item = i32>) -> Vec<Row> {
    ids.into_iter().map(person).collect()
}

/// Sorted ids of a `people_schema` row set
pub fn ids(rows: &[Row]) -> Vec<i32> {
    let mut ids: Vec<i32> = rows.iter().map(|r| r.values[0].as_int().unwrap()).collect();
    ids.sort_unstable();
    ids
}
