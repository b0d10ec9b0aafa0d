// Storage module - heap pages, heap files, catalog and the page cache

pub mod buffer_pool;
pub mod catalog;
pub mod heap_file;
pub mod page;
pub mod page_cache;

pub use buffer_pool::{BufferPool, BufferPoolStats};
pub use catalog::Catalog;
pub use heap_file::{HeapFile, HeapScan};
pub use page::{HeapPage, PageId, RecordId, PAGE_SIZE};
pub use page_cache::{PageCache, PageHandle};
