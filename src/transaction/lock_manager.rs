//! Page-granularity shared/exclusive locks keyed by `(transaction, page)`.
//!
//! ```text
//!          │ S  │ X  │
//! ─────────┼────┼────┤
//!     S    │ ✓  │ ✗  │
//!     X    │ ✗  │ ✗  │
//! ```
//!
//! A request that cannot be granted blocks the calling thread until it can,
//! or until the configured timeout elapses. A timeout is reported as
//! `TransactionAborted`; the caller is expected to abort the transaction
//! (release its locks) and decide whether to retry.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::manager::{Permission, TransactionId};
use crate::core::{DatabaseError, Result};
use crate::storage::page::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permission> for LockMode {
    fn from(perm: Permission) -> Self {
        match perm {
            Permission::ReadOnly => Self::Shared,
            Permission::ReadWrite => Self::Exclusive,
        }
    }
}

#[derive(Debug)]
struct LockEntry {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

impl LockEntry {
    fn can_grant(&self, txn: TransactionId, mode: LockMode) -> bool {
        if self.holders.is_empty() {
            return true;
        }
        if self.holders.contains(&txn) {
            // Re-request, downgrade request, or upgrade as the sole holder
            return mode == LockMode::Shared
                || self.mode == LockMode::Exclusive
                || self.holders.len() == 1;
        }
        mode == LockMode::Shared && self.mode == LockMode::Shared
    }

    fn grant(&mut self, txn: TransactionId, mode: LockMode) {
        if self.holders.is_empty() || mode == LockMode::Exclusive {
            self.mode = mode;
        }
        self.holders.insert(txn);
    }
}

#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<PageId, LockEntry>,
    txn_pages: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockTable {
    fn try_grant(&mut self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        let entry = self.locks.entry(page_id).or_insert_with(|| LockEntry {
            mode,
            holders: HashSet::new(),
        });
        if !entry.can_grant(txn, mode) {
            return false;
        }
        entry.grant(txn, mode);
        self.txn_pages.entry(txn).or_default().insert(page_id);
        true
    }

    fn release(&mut self, txn: TransactionId, page_id: PageId) -> bool {
        let released = match self.locks.get_mut(&page_id) {
            Some(entry) => {
                let removed = entry.holders.remove(&txn);
                if entry.holders.is_empty() {
                    self.locks.remove(&page_id);
                }
                removed
            }
            None => false,
        };
        if let Some(pages) = self.txn_pages.get_mut(&txn) {
            pages.remove(&page_id);
            if pages.is_empty() {
                self.txn_pages.remove(&txn);
            }
        }
        released
    }
}

pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Block until `txn` holds `page_id` in (at least) the requested mode
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, perm: Permission) -> Result<()> {
        let mode = LockMode::from(perm);
        let deadline = Instant::now() + self.timeout;
        let mut table = self.table.lock();

        loop {
            if table.try_grant(txn, page_id, mode) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(%txn, ?page_id, ?mode, "lock wait timed out");
                return Err(DatabaseError::TransactionAborted(
                    txn.as_u64(),
                    format!(
                        "timed out waiting for {mode:?} lock on page {}:{}",
                        page_id.table_id, page_id.page_number
                    ),
                ));
            }
            self.released.wait_for(&mut table, deadline - now);
        }
    }

    pub fn release(&self, txn: TransactionId, page_id: PageId) -> bool {
        let released = self.table.lock().release(txn, page_id);
        if released {
            self.released.notify_all();
        }
        released
    }

    /// Drop every lock `txn` holds; returns how many were released
    pub fn release_all(&self, txn: TransactionId) -> usize {
        let mut table = self.table.lock();
        let pages: Vec<PageId> = table
            .txn_pages
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default();
        let count = pages
            .into_iter()
            .filter(|page_id| table.release(txn, *page_id))
            .count();
        drop(table);

        if count > 0 {
            self.released.notify_all();
        }
        count
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.table
            .lock()
            .locks
            .get(&page_id)
            .is_some_and(|entry| entry.holders.contains(&txn))
    }

    /// Current mode of the lock on `page_id`, if anyone holds it
    pub fn lock_mode(&self, page_id: PageId) -> Option<LockMode> {
        self.table.lock().locks.get(&page_id).map(|entry| entry.mode)
    }

    /// Pages currently locked by `txn`
    pub fn locked_pages(&self, txn: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .txn_pages
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}
