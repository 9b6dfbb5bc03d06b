//! Page identity and the process-wide page size.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Returns the current page size in bytes.
///
/// All page-offset arithmetic in the engine consults this value.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Overrides the process-wide page size.
///
/// THIS FUNCTION SHOULD ONLY BE USED FOR TESTING. A file written under one
/// page size is unreadable under another, and the setting is shared by
/// every table in the process.
pub fn set_page_size(size: usize) {
    assert!(size > 0, "page size must be positive");
    PAGE_SIZE.store(size, Ordering::Relaxed);
}

/// Restores the default page size.
///
/// THIS FUNCTION SHOULD ONLY BE USED FOR TESTING.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}

/// Unique identifier for a page: the owning table plus the page's ordinal
/// position in the backing file.
///
/// `PageId` is a plain value (`Copy + Eq + Hash`) so it can key the buffer
/// pool's cache and the lock table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table: u32,
    page_no: u64,
}

impl PageId {
    /// Creates a new PageId.
    pub const fn new(table: u32, page_no: u64) -> Self {
        Self { table, page_no }
    }

    /// Returns the owning table's id.
    pub const fn table(&self) -> u32 {
        self.table
    }

    /// Returns the page number within the table file.
    pub const fn page_no(&self) -> u64 {
        self.page_no
    }

    /// Calculates the byte offset of this page in its backing file, under
    /// the current page size.
    pub fn byte_offset(&self) -> u64 {
        self.page_no * page_size() as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table, self.page_no)
    }
}
