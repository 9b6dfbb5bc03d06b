//! Storage layer: page identity, page sizing, and the buffer pool.

pub mod buffer;
pub mod page;

pub use buffer::{BufferError, BufferPool, CachedPage, LockManager};
pub use page::{DEFAULT_PAGE_SIZE, PageId, page_size, reset_page_size, set_page_size};
