use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies the transaction on whose behalf pages are fetched and locked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tx{}", self.0)
    }
}

/// Access intent passed to the page cache when fetching a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// Hands out unique transaction ids
#[derive(Debug, Clone)]
pub struct TransactionManager {
    next_tx_id: Arc<AtomicU64>,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            // 0 is never handed out
            next_tx_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn begin_transaction(&self) -> TransactionId {
        TransactionId(self.next_tx_id.fetch_add(1, Ordering::SeqCst))
    }

    /// The id the next `begin_transaction` call will return
    pub fn current_tx_id(&self) -> u64 {
        self.next_tx_id.load(Ordering::SeqCst)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
