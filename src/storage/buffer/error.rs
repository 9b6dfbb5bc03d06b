//! Buffer pool errors.

use std::fmt;

use crate::heap::HeapError;
use crate::storage::PageId;
use crate::tx::TransactionId;

/// Errors from buffer pool operations.
#[derive(Debug)]
pub enum BufferError {
    /// A lock could not be acquired before the deadlock timeout, or a
    /// shared-to-exclusive upgrade raced other shared holders. The caller
    /// must abort the transaction via
    /// [`transaction_complete`](super::BufferPool::transaction_complete)
    /// with `commit = false`.
    TransactionAborted {
        /// The transaction that must abort.
        tid: TransactionId,
        /// The contended page.
        pid: PageId,
    },
    /// Eviction found no clean page to discard: every cached page carries
    /// uncommitted data that must not reach disk.
    AllPagesDirty,
    /// No heap file is registered under this table id.
    UnknownTable(u32),
    /// Error from the underlying heap file or page.
    Heap(HeapError),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::TransactionAborted { tid, pid } => {
                write!(f, "{} aborted waiting for page {}", tid, pid)
            }
            BufferError::AllPagesDirty => write!(f, "all pages are dirty"),
            BufferError::UnknownTable(table) => {
                write!(f, "no table registered with id {}", table)
            }
            BufferError::Heap(err) => write!(f, "heap error: {}", err),
        }
    }
}

impl std::error::Error for BufferError {}

impl From<HeapError> for BufferError {
    fn from(err: HeapError) -> Self {
        BufferError::Heap(err)
    }
}
