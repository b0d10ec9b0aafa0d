//! Page cache contract consumed by heap storage and the DML operators.
//!
//! Every page access made by this crate goes through a `PageCache`. The
//! cache decides about locking, eviction and durability; callers only state
//! their access intent. Errors such as `TransactionAborted` must reach the
//! caller unchanged.

use std::sync::Arc;

use parking_lot::RwLock;

use super::page::{HeapPage, PageId};
use crate::core::{Result, Row};
use crate::transaction::{Permission, TransactionId};

/// Shared, lockable reference to a cached page
pub type PageHandle = Arc<RwLock<HeapPage>>;

pub trait PageCache: Send + Sync {
    /// Fetch a page on behalf of `txn`, blocking until `perm` is grantable
    fn fetch_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> Result<PageHandle>;

    /// Add `row` to table `table_id`; returns the pages that were modified
    fn insert_row(&self, txn: TransactionId, table_id: u32, row: &Row) -> Result<Vec<PageHandle>>;

    /// Remove the row addressed by `row.record_id`; returns the pages that were modified
    fn delete_row(&self, txn: TransactionId, row: &Row) -> Result<Vec<PageHandle>>;
}
