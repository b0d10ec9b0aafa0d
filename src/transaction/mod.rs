// Transaction module - ids, access intent and page locks

mod manager;
pub mod lock_manager;

pub use manager::{Permission, TransactionId, TransactionManager};
pub use lock_manager::{LockManager, LockMode};
