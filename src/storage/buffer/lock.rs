//! Per-page shared/exclusive lock manager.
//!
//! The lock manager tracks, for every page, which transactions hold which
//! lock mode. Admission is a pure decision over the current holder set; the
//! buffer pool owns the waiting policy (retry with timeout). All entry
//! points serialize on a single mutex, like the transaction bookkeeping in
//! the rest of the engine: the critical sections are short map updates.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::storage::PageId;
use crate::tx::TransactionId;

/// Lock mode held on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared (read) lock; any number may coexist.
    Shared,
    /// Exclusive (write) lock; always the sole lock on its page.
    Exclusive,
}

/// Outcome of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    /// The lock is now held (possibly upgraded, possibly already held).
    Granted,
    /// The lock is currently incompatible; the caller may retry.
    Denied,
    /// The request can never be granted: upgrading shared to exclusive
    /// while other shared holders remain would deadlock against a
    /// symmetric upgrade. The transaction must abort.
    Abort,
}

/// Tracks shared/exclusive page locks by transaction.
#[derive(Debug)]
pub struct LockManager {
    table: Mutex<HashMap<PageId, HashMap<TransactionId, LockMode>>>,
}

impl LockManager {
    /// Creates an empty lock manager.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Attempts to acquire `mode` on `pid` for `tid`.
    ///
    /// Grants are idempotent: a transaction re-requesting a mode it already
    /// holds (or a shared lock while holding exclusive) is granted without
    /// change. A shared holder requesting exclusive is upgraded in place
    /// when it is the sole holder and aborted otherwise.
    pub fn acquire(&self, pid: PageId, tid: TransactionId, mode: LockMode) -> LockAttempt {
        let mut table = self.table.lock();

        let Some(holders) = table.get_mut(&pid) else {
            table.insert(pid, HashMap::from([(tid, mode)]));
            return LockAttempt::Granted;
        };

        match holders.get(&tid).copied() {
            // Not currently a holder.
            None => {
                if holders.len() >= 2 {
                    // Two or more holders are necessarily all shared.
                    match mode {
                        LockMode::Shared => {
                            holders.insert(tid, LockMode::Shared);
                            LockAttempt::Granted
                        }
                        LockMode::Exclusive => LockAttempt::Denied,
                    }
                } else {
                    let existing = *holders.values().next().expect("entry is never empty");
                    match (existing, mode) {
                        (LockMode::Shared, LockMode::Shared) => {
                            holders.insert(tid, LockMode::Shared);
                            LockAttempt::Granted
                        }
                        _ => LockAttempt::Denied,
                    }
                }
            }
            // Already holds shared.
            Some(LockMode::Shared) => match mode {
                LockMode::Shared => LockAttempt::Granted,
                LockMode::Exclusive => {
                    if holders.len() == 1 {
                        holders.insert(tid, LockMode::Exclusive);
                        LockAttempt::Granted
                    } else {
                        LockAttempt::Abort
                    }
                }
            },
            // Already holds exclusive; nothing stronger exists.
            Some(LockMode::Exclusive) => LockAttempt::Granted,
        }
    }

    /// Returns true if `tid` holds any lock on `pid`.
    pub fn is_holding(&self, tid: TransactionId, pid: PageId) -> bool {
        self.table
            .lock()
            .get(&pid)
            .is_some_and(|holders| holders.contains_key(&tid))
    }

    /// Releases `tid`'s lock on `pid`. Returns false if it held none.
    pub fn release(&self, tid: TransactionId, pid: PageId) -> bool {
        let mut table = self.table.lock();
        let Some(holders) = table.get_mut(&pid) else {
            return false;
        };
        if holders.remove(&tid).is_none() {
            return false;
        }
        if holders.is_empty() {
            table.remove(&pid);
        }
        true
    }

    /// Releases every lock held by `tid`.
    pub fn release_all(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        table.retain(|_, holders| {
            holders.remove(&tid);
            !holders.is_empty()
        });
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
