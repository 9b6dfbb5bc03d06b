//! The buffer pool: bounded page cache, page locking, and transaction
//! commit/abort.
//!
//! ```text
//! +--------------------+
//! |  Query operators   |
//! +--------------------+
//!          |
//!          v
//! +--------------------+     +----------------+
//! |     BufferPool     |---->|  LockManager   |
//! |  (PageCache, LRU)  |     |  (S/X, 2PL)    |
//! +--------------------+     +----------------+
//!          |
//!          v
//! +--------------------+
//! | HeapFile (per tbl) |
//! +--------------------+
//! ```
//!
//! # Transaction policy
//!
//! - **NO-STEAL**: a dirty page is never evicted or otherwise written
//!   before its transaction commits; eviction skips dirty pages and fails
//!   outright when every cached page is dirty.
//! - **FORCE**: commit writes all of the transaction's dirty pages through
//!   to disk (and syncs the affected files) before returning.
//! - Abort reloads each dirtied page from disk, discarding the in-memory
//!   mutations.
//!
//! # Locking
//!
//! `get_page` maps the requested permission to a shared or exclusive page
//! lock and retries admission until granted. Deadlocks are detected by
//! timeout: a request that stays denied past the lock-wait limit aborts
//! its transaction. Locks are held to transaction end (strict two-phase
//! locking), with one sanctioned exception: the heap file's free-slot
//! search releases the lock on full pages immediately via
//! [`unsafe_release_page`](BufferPool::unsafe_release_page).
//!
//! # Mutex discipline
//!
//! The lock-wait loop and all file I/O run outside the cache mutex; only
//! cache lookup, insertion, recency maintenance, and eviction run under
//! it. Two transactions may therefore race to load the same (shared-
//! locked, clean) page; the loser's copy is discarded on the re-check
//! under the mutex.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use super::error::BufferError;
use super::lock::{LockAttempt, LockManager, LockMode};
use super::lru::PageCache;
use crate::catalog::Catalog;
use crate::heap::{HeapFile, HeapPage};
use crate::storage::PageId;
use crate::tuple::Tuple;
use crate::tx::{Permissions, TransactionId};

/// A page resident in the buffer pool, shared across transactions.
///
/// The outer `Arc` is the cache handle; the `RwLock` is the page latch.
/// A transaction holding the page's exclusive lock may take the write
/// latch and mutate freely.
pub type CachedPage = Arc<RwLock<HeapPage>>;

/// Bounded LRU page cache with transactional two-phase page locking.
#[derive(Debug)]
pub struct BufferPool {
    catalog: Arc<Catalog>,
    capacity: usize,
    lock_timeout: Duration,
    cache: Mutex<PageCache>,
    locks: LockManager,
}

impl BufferPool {
    /// Default number of pages the pool caches.
    pub const DEFAULT_CAPACITY: usize = 50;

    /// Default maximum time a `get_page` call waits on a contended lock
    /// before declaring the transaction deadlocked.
    pub const LOCK_WAIT_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Pause between lock admission retries.
    const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(3);

    /// Creates a buffer pool that caches up to `capacity` pages, resolving
    /// tables through `catalog`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(catalog: Arc<Catalog>, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            catalog,
            capacity,
            lock_timeout: Self::LOCK_WAIT_TIMEOUT,
            cache: Mutex::new(PageCache::new()),
            locks: LockManager::new(),
        }
    }

    /// Overrides the lock-wait timeout. Intended for tests that provoke
    /// deadlocks and should not sit out the full default.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Returns the pool's page capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the catalog this pool resolves tables through.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().len()
    }

    /// Retrieves the page `pid` on behalf of `tid` with the given
    /// permissions, admitting under the page lock first and serving from
    /// cache or disk second.
    ///
    /// # Errors
    ///
    /// - [`BufferError::TransactionAborted`] if the lock stays contended
    ///   past the lock-wait timeout (deadlock proxy) or the request is an
    ///   impossible shared-to-exclusive upgrade.
    /// - [`BufferError::AllPagesDirty`] if a needed eviction finds only
    ///   dirty pages.
    /// - [`BufferError::UnknownTable`] / heap errors from the page load.
    pub async fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<CachedPage, BufferError> {
        let mode = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };

        let start = Instant::now();
        loop {
            match self.locks.acquire(pid, tid, mode) {
                LockAttempt::Granted => break,
                LockAttempt::Abort => {
                    warn!(%tid, %pid, "lock upgrade impossible, aborting");
                    return Err(BufferError::TransactionAborted { tid, pid });
                }
                LockAttempt::Denied => {
                    if start.elapsed() > self.lock_timeout {
                        warn!(%tid, %pid, "lock wait timed out, aborting");
                        return Err(BufferError::TransactionAborted { tid, pid });
                    }
                    tokio::time::sleep(Self::LOCK_RETRY_INTERVAL).await;
                }
            }
        }

        if let Some(page) = self.cache.lock().get(pid) {
            return Ok(page);
        }

        // Miss: load outside the cache mutex. The lock admission above
        // guarantees nobody is mutating this page concurrently.
        let file = self
            .catalog
            .file(pid.table())
            .ok_or(BufferError::UnknownTable(pid.table()))?;
        let loaded = file.read_page(pid).await?;

        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(pid) {
            // Another transaction loaded it while we did I/O; use theirs.
            return Ok(existing);
        }
        if cache.len() > self.capacity {
            self.evict_locked(&mut cache)?;
        }
        let handle: CachedPage = Arc::new(RwLock::new(loaded));
        cache.insert_mru(pid, handle.clone());
        Ok(handle)
    }

    /// Inserts `tuple` into the table `table_id` on behalf of `tid`,
    /// marking the dirtied page and admitting it to the cache.
    pub async fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        tuple: Tuple,
    ) -> Result<(), BufferError> {
        let file = self
            .catalog
            .file(table_id)
            .ok_or(BufferError::UnknownTable(table_id))?;
        let pages = file.insert_tuple(self, tid, tuple).await?;
        self.admit_dirtied(tid, pages)
    }

    /// Deletes `tuple` (located by its record id) on behalf of `tid`,
    /// marking the dirtied page and admitting it to the cache.
    pub async fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), BufferError> {
        let rid = tuple
            .record_id()
            .ok_or(BufferError::Heap(crate::heap::HeapError::BadRecordId(None)))?;
        let table_id = rid.page.table();
        let file = self
            .catalog
            .file(table_id)
            .ok_or(BufferError::UnknownTable(table_id))?;
        let pages = file.delete_tuple(self, tid, tuple).await?;
        self.admit_dirtied(tid, pages)
    }

    /// Marks each returned page dirty with `tid` and (re)admits it at the
    /// most-recently-used position, evicting if the cache is at capacity.
    fn admit_dirtied(
        &self,
        tid: TransactionId,
        pages: Vec<CachedPage>,
    ) -> Result<(), BufferError> {
        for page in pages {
            let pid = {
                let mut guard = page.write();
                guard.mark_dirty(Some(tid));
                guard.id()
            };
            let mut cache = self.cache.lock();
            if cache.contains(pid) {
                cache.insert_mru(pid, page);
            } else {
                if cache.len() >= self.capacity {
                    self.evict_locked(&mut cache)?;
                }
                cache.insert_mru(pid, page);
            }
        }
        Ok(())
    }

    /// Releases `tid`'s lock on `pid` unconditionally.
    ///
    /// This breaks two-phase locking; the only sanctioned caller is the
    /// heap file's free-slot search, which releases pages it only probed.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.locks.release(tid, pid);
    }

    /// Returns true if `tid` holds a lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.locks.is_holding(tid, pid)
    }

    /// Commits (`commit = true`) or aborts (`commit = false`) the
    /// transaction, then releases all of its locks.
    ///
    /// Commit flushes the transaction's dirty pages (FORCE); abort
    /// restores them from disk. The locks are released even when the
    /// flush or restore fails.
    pub async fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), BufferError> {
        let result = if commit {
            self.flush_pages(tid).await
        } else {
            self.rollback(tid).await
        };
        self.locks.release_all(tid);
        debug!(%tid, commit, "transaction complete");
        result
    }

    /// Writes every page dirtied by `tid` through to disk, clears their
    /// dirty marks, and syncs the affected files.
    pub async fn flush_pages(&self, tid: TransactionId) -> Result<(), BufferError> {
        let dirtied: Vec<CachedPage> = self
            .cache
            .lock()
            .entries()
            .into_iter()
            .filter(|(_, page)| page.read().is_dirty() == Some(tid))
            .map(|(_, page)| page)
            .collect();

        let mut files: Vec<Arc<HeapFile>> = Vec::new();
        for page in dirtied {
            let file = self.flush_handle(&page).await?;
            if !files.iter().any(|f| f.table_id() == file.table_id()) {
                files.push(file);
            }
        }
        for file in files {
            file.sync().await?;
        }
        Ok(())
    }

    /// Flushes the page `pid` if it is cached and dirty; no-op otherwise.
    pub async fn flush_page(&self, pid: PageId) -> Result<(), BufferError> {
        let Some(page) = self.cache.lock().peek(pid) else {
            return Ok(());
        };
        if page.read().is_dirty().is_some() {
            self.flush_handle(&page).await?;
        }
        Ok(())
    }

    /// Flushes every cached dirty page, regardless of owning transaction.
    ///
    /// NB: this writes uncommitted data and therefore breaks NO-STEAL;
    /// it exists for shutdown and for tests that need a known disk state.
    pub async fn flush_all_pages(&self) -> Result<(), BufferError> {
        let pages: Vec<CachedPage> = self
            .cache
            .lock()
            .entries()
            .into_iter()
            .map(|(_, page)| page)
            .collect();
        for page in pages {
            if page.read().is_dirty().is_some() {
                self.flush_handle(&page).await?;
            }
        }
        Ok(())
    }

    /// Writes one cached page to its file and clears the dirty mark.
    /// Returns the file for optional syncing.
    async fn flush_handle(&self, page: &CachedPage) -> Result<Arc<HeapFile>, BufferError> {
        let (pid, data) = {
            let guard = page.read();
            (guard.id(), guard.page_data())
        };
        let file = self
            .catalog
            .file(pid.table())
            .ok_or(BufferError::UnknownTable(pid.table()))?;
        file.write_raw(pid.page_no(), &data).await?;
        page.write().mark_dirty(None);
        trace!(%pid, "flushed page");
        Ok(file)
    }

    /// Restores every page dirtied by `tid` from its on-disk image.
    ///
    /// The restore happens in place behind the cache handle, so any holder
    /// of the page observes the rolled-back contents.
    pub async fn rollback(&self, tid: TransactionId) -> Result<(), BufferError> {
        let dirtied: Vec<(PageId, CachedPage)> = self
            .cache
            .lock()
            .entries()
            .into_iter()
            .filter(|(_, page)| page.read().is_dirty() == Some(tid))
            .collect();

        for (pid, page) in dirtied {
            let file = self
                .catalog
                .file(pid.table())
                .ok_or(BufferError::UnknownTable(pid.table()))?;
            let fresh = file.read_page(pid).await?;
            *page.write() = fresh;
            self.cache.lock().touch(pid);
            trace!(%tid, %pid, "rolled back page");
        }
        Ok(())
    }

    /// Drops `pid` from the cache without writing it.
    pub fn discard_page(&self, pid: PageId) {
        self.cache.lock().remove(pid);
    }

    /// Discards the least recently used clean page.
    ///
    /// Walks candidates from the recency tail; dirty pages are re-queued
    /// at the head and never written (NO-STEAL). Gives up after examining
    /// `capacity` candidates.
    fn evict_locked(&self, cache: &mut PageCache) -> Result<(), BufferError> {
        for _ in 0..self.capacity {
            let Some(pid) = cache.pop_lru() else { break };
            let dirty = cache
                .peek(pid)
                .is_some_and(|page| page.read().is_dirty().is_some());
            if dirty {
                cache.requeue_mru(pid);
            } else {
                cache.discard(pid);
                trace!(%pid, "evicted clean page");
                return Ok(());
            }
        }
        Err(BufferError::AllPagesDirty)
    }
}
