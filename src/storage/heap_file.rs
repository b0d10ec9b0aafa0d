use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::page::{check_text_lengths, HeapPage, PageId, PAGE_SIZE};
use super::page_cache::{PageCache, PageHandle};
use crate::core::{DatabaseError, Result, Row, Schema};
use crate::transaction::{Permission, TransactionId};

/// HeapFile - a table stored as an unordered sequence of fixed-size pages.
///
/// Page `i` occupies bytes `[i * PAGE_SIZE, (i + 1) * PAGE_SIZE)`; the file
/// length is always a multiple of `PAGE_SIZE` and only ever grows.
pub struct HeapFile {
    path: PathBuf,
    schema: Schema,
    table_id: u32,
    file: Mutex<File>,
}

impl HeapFile {
    /// Open (or create) the heap file at `path` holding rows of `schema`
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        if HeapPage::slots_per_page(&schema) == 0 {
            return Err(DatabaseError::InvalidArgument(format!(
                "rows of ({schema}) take {} bytes and do not fit in a page",
                schema.size()
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(DatabaseError::StorageIo(format!(
                "{} has length {len}, not a multiple of {PAGE_SIZE}",
                path.as_ref().display()
            )));
        }

        let path = std::fs::canonicalize(path.as_ref())?;
        let table_id = table_id_for(&path);

        Ok(Self {
            path,
            schema,
            table_id,
            file: Mutex::new(file),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stable id derived from the file's absolute path
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.table_id
    }

    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_pages(&self) -> Result<usize> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as usize)
    }

    /// Read a page straight from disk
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        self.check_page_id(page_id)?;

        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let offset = page_id.page_number as u64 * PAGE_SIZE as u64;
        if offset + PAGE_SIZE as u64 > len {
            return Err(DatabaseError::StorageIo(format!(
                "page {} is past the end of table {}",
                page_id.page_number, self.table_id
            )));
        }

        let mut buffer = vec![0u8; PAGE_SIZE];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buffer)?;
        drop(file);

        HeapPage::from_bytes(page_id, &self.schema, &buffer)
    }

    /// Write a page straight to disk
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let page_id = page.id();
        self.check_page_id(page_id)?;

        let bytes = page.to_bytes()?;
        let offset = page_id.page_number as u64 * PAGE_SIZE as u64;

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&bytes)?;
        file.sync_data()?;

        Ok(())
    }

    /// Append an empty page to the file and return its id
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len();
        let page_number = (len / PAGE_SIZE as u64) as u32;

        file.seek(SeekFrom::Start(len))?;
        file.write_all(&HeapPage::empty_page_data())?;
        file.sync_data()?;

        tracing::debug!(table_id = self.table_id, page_number, "allocated heap page");
        Ok(PageId::new(self.table_id, page_number))
    }

    /// Insert a row into the table.
    ///
    /// Pages are visited in order under write intent; the row goes into the
    /// first page with an empty slot. When every page is full a new page is
    /// appended and the row is placed there.
    pub fn insert_row(
        &self,
        txn: TransactionId,
        row: &Row,
        cache: &dyn PageCache,
    ) -> Result<Vec<PageHandle>> {
        row.check_schema(&self.schema)?;
        check_text_lengths(row)?;

        for page_number in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_number as u32);
            let handle = cache.fetch_page(txn, page_id, Permission::ReadWrite)?;

            let inserted = {
                let mut page = handle.write();
                if page.num_empty_slots() > 0 {
                    page.insert_row(row)?;
                    true
                } else {
                    false
                }
            };

            if inserted {
                return Ok(vec![handle]);
            }
        }

        let page_id = self.allocate_page()?;
        let handle = cache.fetch_page(txn, page_id, Permission::ReadWrite)?;
        handle.write().insert_row(row)?;
        Ok(vec![handle])
    }

    /// Delete the row addressed by `row.record_id`
    pub fn delete_row(
        &self,
        txn: TransactionId,
        row: &Row,
        cache: &dyn PageCache,
    ) -> Result<Vec<PageHandle>> {
        let record_id = row.record_id.ok_or_else(|| {
            DatabaseError::StorageIo("cannot delete a row without a record id".to_string())
        })?;
        self.check_page_id(record_id.page_id)?;

        let handle = cache.fetch_page(txn, record_id.page_id, Permission::ReadWrite)?;
        handle.write().delete_row(row)?;
        Ok(vec![handle])
    }

    /// Lazy scan over every row of the table
    pub fn scan(self: &Arc<Self>, txn: TransactionId, cache: Arc<dyn PageCache>) -> HeapScan {
        HeapScan::new(Arc::clone(self), txn, cache)
    }

    fn check_page_id(&self, page_id: PageId) -> Result<()> {
        if page_id.table_id != self.table_id {
            return Err(DatabaseError::StorageIo(format!(
                "page belongs to table {}, not {}",
                page_id.table_id, self.table_id
            )));
        }
        Ok(())
    }
}

fn table_id_for(path: &Path) -> u32 {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Position of an open scan
struct ScanState {
    current_page: usize,
    /// Page count seen at `open`; pages appended later are not visited
    page_count: usize,
    rows: std::vec::IntoIter<Row>,
}

/// Restartable cursor over all rows of a heap file, one page at a time.
pub struct HeapScan {
    file: Arc<HeapFile>,
    txn: TransactionId,
    cache: Arc<dyn PageCache>,
    state: Option<ScanState>,
}

impl HeapScan {
    pub fn new(file: Arc<HeapFile>, txn: TransactionId, cache: Arc<dyn PageCache>) -> Self {
        Self {
            file,
            txn,
            cache,
            state: None,
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.state.is_some()
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.file.schema()
    }

    pub fn open(&mut self) -> Result<()> {
        let page_count = self.file.num_pages()?;
        let rows = if page_count > 0 {
            self.load_page(0)?
        } else {
            Vec::new().into_iter()
        };

        self.state = Some(ScanState {
            current_page: 0,
            page_count,
            rows,
        });
        Ok(())
    }

    pub fn has_next(&mut self) -> Result<bool> {
        loop {
            let state = self.state.as_ref().ok_or_else(not_open)?;
            if !state.rows.as_slice().is_empty() {
                return Ok(true);
            }
            if state.current_page + 1 >= state.page_count {
                return Ok(false);
            }

            let next_page = state.current_page + 1;
            let rows = self.load_page(next_page)?;
            let state = self.state.as_mut().ok_or_else(not_open)?;
            state.current_page = next_page;
            state.rows = rows;
        }
    }

    pub fn next(&mut self) -> Result<Row> {
        if !self.has_next()? {
            return Err(DatabaseError::NoSuchElement("heap scan is exhausted".to_string()));
        }
        self.state
            .as_mut()
            .and_then(|state| state.rows.next())
            .ok_or_else(not_open)
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }

    pub fn close(&mut self) {
        self.state = None;
    }

    fn load_page(&self, page_number: usize) -> Result<std::vec::IntoIter<Row>> {
        let page_id = PageId::new(self.file.id(), page_number as u32);
        let handle = self.cache.fetch_page(self.txn, page_id, Permission::ReadOnly)?;
        let rows: Vec<Row> = handle.read().rows().cloned().collect();
        Ok(rows.into_iter())
    }
}

fn not_open() -> DatabaseError {
    DatabaseError::NoSuchElement("heap scan is not open".to_string())
}
