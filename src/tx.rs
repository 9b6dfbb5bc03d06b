//! Transaction identity and page access permissions.
//!
//! This engine uses strict page-level two-phase locking rather than MVCC,
//! so a transaction is nothing more than a unique token: the buffer pool
//! keys lock ownership and page dirtying by [`TransactionId`], and all
//! commit/abort bookkeeping lives there.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TID: AtomicU64 = AtomicU64::new(1);

/// Opaque unique transaction token.
///
/// Ids are allocated from a process-wide counter; equality and hashing
/// follow the id value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Allocates a fresh transaction id.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(NEXT_TID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Requested access level when fetching a page through the buffer pool.
///
/// `ReadOnly` admits under a shared lock, `ReadWrite` under an exclusive
/// lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    /// Shared read access.
    ReadOnly,
    /// Exclusive read/write access.
    ReadWrite,
}
