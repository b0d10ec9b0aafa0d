// heapql - iterator-model query executor over paged heap storage
// Modular architecture: core types, storage, transactions, operators

// Clippy configuration - allow non-critical warnings
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

// Core data structures (schema, rows, values, errors)
pub mod core;

// Engine configuration (file + environment)
pub mod config;

// Pull-based operators (scan, filter, join, aggregate, insert, delete)
pub mod executor;

// Transaction ids and page locks
pub mod transaction;

// Storage layer (heap pages, heap files, catalog, buffer pool)
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::core::{DataType, DatabaseError, Field, Result, Row, Schema, Value};
pub use crate::config::EngineConfig;
pub use executor::{OpIterator, Operator};
pub use storage::{BufferPool, Catalog, HeapFile, PageCache};
pub use transaction::{Permission, TransactionId, TransactionManager};
