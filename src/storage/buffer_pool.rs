use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::catalog::Catalog;
use super::page::PageId;
use super::page_cache::{PageCache, PageHandle};
use crate::config::EngineConfig;
use crate::core::{DatabaseError, Result, Row};
use crate::transaction::{LockManager, Permission, TransactionId};

/// Simple LRU order for page eviction
struct LruCache {
    /// Queue of page IDs (most recently used at back)
    queue: VecDeque<PageId>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Mark page as recently used
    fn touch(&mut self, page_id: PageId) {
        self.queue.retain(|&id| id != page_id);
        self.queue.push_back(page_id);
    }

    /// Pages from least to most recently used
    fn candidates(&self) -> impl Iterator<Item = PageId> + '_ {
        self.queue.iter().copied()
    }

    fn remove(&mut self, page_id: PageId) {
        self.queue.retain(|&id| id != page_id);
    }
}

struct PoolState {
    pages: HashMap<PageId, PageHandle>,
    /// Dirty pages and the transaction that dirtied them
    dirty: HashMap<PageId, TransactionId>,
    lru: LruCache,
    hits: u64,
    misses: u64,
}

/// Snapshot of buffer pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolStats {
    pub size: usize,
    pub capacity: usize,
    pub dirty: usize,
    pub hits: u64,
    pub misses: u64,
}

impl BufferPoolStats {
    /// Get cache hit rate
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Buffer Pool - cache of pages in RAM.
///
/// Every fetch first takes the page lock matching the requested permission,
/// so concurrent transactions see each other's pages only after commit.
/// Dirty pages stay in memory until their transaction completes: they are
/// written on commit and thrown away on abort. Pages that are dirty, or that
/// a caller still holds a handle to, are never evicted.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    locks: LockManager,
    capacity: usize,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Create new buffer pool with given capacity (number of pages)
    pub fn new(catalog: Arc<Catalog>, capacity: usize, lock_timeout: Duration) -> Self {
        Self {
            catalog,
            locks: LockManager::new(lock_timeout),
            capacity,
            state: Mutex::new(PoolState {
                pages: HashMap::new(),
                dirty: HashMap::new(),
                lru: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    pub fn from_config(catalog: Arc<Catalog>, config: &EngineConfig) -> Self {
        Self::new(catalog, config.buffer_pool_pages, config.lock_timeout())
    }

    #[must_use]
    pub const fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Finish `txn`: write its dirty pages on commit, drop them on abort,
    /// then release all of its locks
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        let mut state = self.state.lock();
        let owned: Vec<PageId> = state
            .dirty
            .iter()
            .filter(|(_, owner)| **owner == txn)
            .map(|(page_id, _)| *page_id)
            .collect();

        for page_id in &owned {
            if commit {
                if let Some(handle) = state.pages.get(page_id) {
                    let file = self.catalog.heap_file(page_id.table_id)?;
                    file.write_page(&handle.read())?;
                }
            } else {
                state.pages.remove(page_id);
                state.lru.remove(*page_id);
            }
            state.dirty.remove(page_id);
        }
        drop(state);

        let released = self.locks.release_all(txn);
        if commit {
            tracing::debug!(%txn, flushed = owned.len(), released, "transaction committed");
        } else {
            tracing::debug!(%txn, discarded = owned.len(), released, "transaction aborted");
        }
        Ok(())
    }

    /// Write every dirty page to disk, regardless of owner
    pub fn flush_all_pages(&self) -> Result<()> {
        let dirty: Vec<PageId> = self.state.lock().dirty.keys().copied().collect();
        for page_id in dirty {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Write one page to disk if it is dirty
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        if !state.dirty.contains_key(&page_id) {
            return Ok(());
        }
        if let Some(handle) = state.pages.get(&page_id) {
            let file = self.catalog.heap_file(page_id.table_id)?;
            file.write_page(&handle.read())?;
            tracing::debug!(?page_id, "flushed page");
        }
        state.dirty.remove(&page_id);
        Ok(())
    }

    /// Drop a page from the pool without writing it
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        state.pages.remove(&page_id);
        state.dirty.remove(&page_id);
        state.lru.remove(page_id);
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(txn, page_id)
    }

    /// Release a single page lock before the transaction ends
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.locks.release(txn, page_id)
    }

    pub fn is_dirty(&self, page_id: PageId) -> bool {
        self.state.lock().dirty.contains_key(&page_id)
    }

    pub fn stats(&self) -> BufferPoolStats {
        let state = self.state.lock();
        BufferPoolStats {
            size: state.pages.len(),
            capacity: self.capacity,
            dirty: state.dirty.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }

    fn mark_dirty(&self, txn: TransactionId, pages: &[PageHandle]) {
        let mut state = self.state.lock();
        for handle in pages {
            let page_id = handle.read().id();
            state.pages.entry(page_id).or_insert_with(|| Arc::clone(handle));
            state.lru.touch(page_id);
            state.dirty.insert(page_id, txn);
        }
    }

    /// Evict least recently used clean, unpinned page
    fn evict_page(state: &mut PoolState) -> Result<()> {
        let victim = state.lru.candidates().find(|page_id| {
            !state.dirty.contains_key(page_id)
                && state
                    .pages
                    .get(page_id)
                    .is_none_or(|handle| Arc::strong_count(handle) == 1)
        });

        match victim {
            Some(page_id) => {
                state.pages.remove(&page_id);
                state.lru.remove(page_id);
                tracing::debug!(?page_id, "evicted page");
                Ok(())
            }
            None => Err(DatabaseError::StorageIo("buffer pool full".to_string())),
        }
    }
}

impl PageCache for BufferPool {
    fn fetch_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permission,
    ) -> Result<PageHandle> {
        self.locks.acquire(txn, page_id, perm)?;

        let mut state = self.state.lock();
        if let Some(handle) = state.pages.get(&page_id).cloned() {
            state.hits += 1;
            state.lru.touch(page_id);
            return Ok(handle);
        }

        state.misses += 1;
        if state.pages.len() >= self.capacity {
            Self::evict_page(&mut state)?;
        }

        let file = self.catalog.heap_file(page_id.table_id)?;
        let handle = Arc::new(RwLock::new(file.read_page(page_id)?));
        state.pages.insert(page_id, Arc::clone(&handle));
        state.lru.touch(page_id);
        Ok(handle)
    }

    fn insert_row(&self, txn: TransactionId, table_id: u32, row: &Row) -> Result<Vec<PageHandle>> {
        let file = self.catalog.heap_file(table_id)?;
        let pages = file.insert_row(txn, row, self)?;
        self.mark_dirty(txn, &pages);
        Ok(pages)
    }

    fn delete_row(&self, txn: TransactionId, row: &Row) -> Result<Vec<PageHandle>> {
        let record_id = row.record_id.ok_or_else(|| {
            DatabaseError::StorageIo("cannot delete a row without a record id".to_string())
        })?;
        let file = self.catalog.heap_file(record_id.page_id.table_id)?;
        let pages = file.delete_row(txn, row, self)?;
        self.mark_dirty(txn, &pages);
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, Schema, Value};
    use crate::storage::heap_file::HeapFile;
    use tempfile::TempDir;

    fn setup(pages: usize) -> (TempDir, Arc<Catalog>, u32) {
        let temp_dir = TempDir::new().unwrap();
        let schema = Schema::from_types(&[DataType::Int]).unwrap();
        let file = HeapFile::open(temp_dir.path().join("t.dat"), schema).unwrap();
        for _ in 0..pages {
            file.allocate_page().unwrap();
        }
        let catalog = Arc::new(Catalog::new());
        let table_id = catalog.add_table(file, "t");
        (temp_dir, catalog, table_id)
    }

    fn pool(catalog: &Arc<Catalog>, capacity: usize) -> BufferPool {
        BufferPool::new(Arc::clone(catalog), capacity, Duration::from_millis(50))
    }

    fn int_row(n: i32) -> Row {
        Row::new(vec![Value::Int(n)])
    }

    #[test]
    fn test_buffer_pool_creation() {
        let (_dir, catalog, _) = setup(0);
        let pool = pool(&catalog, 10);
        let stats = pool.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.dirty, 0);
        assert_eq!(stats.capacity, 10);
    }

    #[test]
    fn test_hits_and_misses() {
        let (_dir, catalog, table_id) = setup(1);
        let pool = pool(&catalog, 10);
        let txn = TransactionId::new(1);
        let page_id = PageId::new(table_id, 0);

        for _ in 0..5 {
            pool.fetch_page(txn, page_id, Permission::ReadOnly).unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 4);
        assert!((stats.hit_rate() - 0.8).abs() < 0.01);
    }

    #[test]
    fn test_lru_policy() {
        let (_dir, catalog, table_id) = setup(4);
        let pool = pool(&catalog, 3);
        let txn = TransactionId::new(1);

        for n in 0..3 {
            pool.fetch_page(txn, PageId::new(table_id, n), Permission::ReadOnly).unwrap();
        }
        // Page 0 becomes most recent, page 1 is now LRU
        pool.fetch_page(txn, PageId::new(table_id, 0), Permission::ReadOnly).unwrap();
        pool.fetch_page(txn, PageId::new(table_id, 3), Permission::ReadOnly).unwrap();

        let state = pool.state.lock();
        assert_eq!(state.pages.len(), 3);
        assert!(state.pages.contains_key(&PageId::new(table_id, 0)));
        assert!(!state.pages.contains_key(&PageId::new(table_id, 1)));
    }

    #[test]
    fn test_dirty_pages_are_not_evicted() {
        let (_dir, catalog, table_id) = setup(2);
        let pool = pool(&catalog, 1);
        let txn = TransactionId::new(1);

        pool.insert_row(txn, table_id, &int_row(7)).unwrap();
        assert_eq!(pool.stats().dirty, 1);

        let err = pool
            .fetch_page(txn, PageId::new(table_id, 1), Permission::ReadOnly)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::StorageIo(_)));
    }

    #[test]
    fn test_commit_writes_pages() {
        let (_dir, catalog, table_id) = setup(1);
        let pool = pool(&catalog, 10);
        let txn = TransactionId::new(1);

        pool.insert_row(txn, table_id, &int_row(7)).unwrap();
        pool.transaction_complete(txn, true).unwrap();

        assert_eq!(pool.stats().dirty, 0);
        assert!(!pool.holds_lock(txn, PageId::new(table_id, 0)));

        let file = catalog.heap_file(table_id).unwrap();
        let page = file.read_page(PageId::new(table_id, 0)).unwrap();
        assert_eq!(page.rows().count(), 1);
    }

    #[test]
    fn test_abort_discards_pages() {
        let (_dir, catalog, table_id) = setup(1);
        let pool = pool(&catalog, 10);
        let t1 = TransactionId::new(1);
        let page_id = PageId::new(table_id, 0);

        pool.insert_row(t1, table_id, &int_row(7)).unwrap();
        pool.transaction_complete(t1, false).unwrap();

        let t2 = TransactionId::new(2);
        let page = pool.fetch_page(t2, page_id, Permission::ReadOnly).unwrap();
        assert_eq!(page.read().rows().count(), 0);
    }

    #[test]
    fn test_conflicting_write_aborts() {
        let (_dir, catalog, table_id) = setup(1);
        let pool = pool(&catalog, 10);
        let t1 = TransactionId::new(1);
        let t2 = TransactionId::new(2);
        let page_id = PageId::new(table_id, 0);

        pool.fetch_page(t1, page_id, Permission::ReadWrite).unwrap();
        let err = pool.fetch_page(t2, page_id, Permission::ReadOnly).unwrap_err();
        assert!(err.is_abort());

        pool.transaction_complete(t1, true).unwrap();
        pool.fetch_page(t2, page_id, Permission::ReadOnly).unwrap();
        assert!(pool.holds_lock(t2, page_id));
    }

    #[test]
    fn test_flush_all_pages() {
        let (_dir, catalog, table_id) = setup(1);
        let pool = pool(&catalog, 10);
        let txn = TransactionId::new(1);

        for n in 0..3 {
            pool.insert_row(txn, table_id, &int_row(n)).unwrap();
        }
        assert_eq!(pool.stats().dirty, 1);

        pool.flush_all_pages().unwrap();
        assert_eq!(pool.stats().dirty, 0);

        let file = catalog.heap_file(table_id).unwrap();
        assert_eq!(file.read_page(PageId::new(table_id, 0)).unwrap().rows().count(), 3);
    }

    #[test]
    fn test_discard_and_release_page() {
        let (_dir, catalog, table_id) = setup(1);
        let pool = pool(&catalog, 10);
        let txn = TransactionId::new(1);
        let page_id = PageId::new(table_id, 0);

        pool.insert_row(txn, table_id, &int_row(1)).unwrap();
        assert!(pool.is_dirty(page_id));

        pool.discard_page(page_id);
        assert!(!pool.is_dirty(page_id));
        assert_eq!(pool.stats().size, 0);

        assert!(pool.release_page(txn, page_id));
        assert!(!pool.holds_lock(txn, page_id));

        // Discarded changes never reached the disk
        let page = pool.fetch_page(txn, page_id, Permission::ReadOnly).unwrap();
        assert_eq!(page.read().rows().count(), 0);
    }

    #[test]
    fn test_from_config() {
        let (_dir, catalog, _) = setup(0);
        let config = EngineConfig {
            buffer_pool_pages: 7,
            ..EngineConfig::default()
        };
        let pool = BufferPool::from_config(Arc::clone(&catalog), &config);
        assert_eq!(pool.stats().capacity, 7);
        assert_eq!(pool.catalog().table_ids().len(), 1);
    }

    #[test]
    fn test_delete_requires_record_id() {
        let (_dir, catalog, _) = setup(1);
        let pool = pool(&catalog, 10);
        let err = pool.delete_row(TransactionId::new(1), &int_row(1)).unwrap_err();
        assert!(matches!(err, DatabaseError::StorageIo(_)));
    }
}
