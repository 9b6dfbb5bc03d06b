//! Recency-ordered page cache.
//!
//! `PageCache` pairs a `PageId → page` map with a recency queue
//! (front = most recently used). The two structures always hold the same
//! set of pages between public calls; the eviction walk in the pool pops
//! the tail, inspects the candidate, and either discards it or re-queues
//! it at the front.

use std::collections::{HashMap, VecDeque};

use super::pool::CachedPage;
use crate::storage::PageId;

#[derive(Debug)]
pub(super) struct PageCache {
    pages: HashMap<PageId, CachedPage>,
    order: VecDeque<PageId>,
}

impl PageCache {
    pub(super) fn new() -> Self {
        Self {
            pages: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub(super) fn len(&self) -> usize {
        self.pages.len()
    }

    pub(super) fn contains(&self, pid: PageId) -> bool {
        self.pages.contains_key(&pid)
    }

    /// Returns the cached page and promotes it to most recently used.
    pub(super) fn get(&mut self, pid: PageId) -> Option<CachedPage> {
        let page = self.pages.get(&pid).cloned()?;
        self.touch(pid);
        Some(page)
    }

    /// Returns the cached page without changing recency.
    pub(super) fn peek(&self, pid: PageId) -> Option<CachedPage> {
        self.pages.get(&pid).cloned()
    }

    /// Inserts (or replaces) a page and makes it most recently used.
    pub(super) fn insert_mru(&mut self, pid: PageId, page: CachedPage) {
        if self.pages.insert(pid, page).is_some() {
            self.order.retain(|p| *p != pid);
        }
        self.order.push_front(pid);
    }

    /// Promotes `pid` to most recently used.
    pub(super) fn touch(&mut self, pid: PageId) {
        if let Some(pos) = self.order.iter().position(|p| *p == pid) {
            self.order.remove(pos);
            self.order.push_front(pid);
        }
    }

    /// Removes `pid` from the cache entirely.
    pub(super) fn remove(&mut self, pid: PageId) -> Option<CachedPage> {
        let page = self.pages.remove(&pid)?;
        self.order.retain(|p| *p != pid);
        Some(page)
    }

    /// Pops the least recently used page id from the recency queue.
    ///
    /// The page stays in the map; the caller must follow up with either
    /// [`discard`](Self::discard) or [`requeue_mru`](Self::requeue_mru).
    pub(super) fn pop_lru(&mut self) -> Option<PageId> {
        self.order.pop_back()
    }

    /// Re-queues a popped candidate at the most-recently-used end.
    pub(super) fn requeue_mru(&mut self, pid: PageId) {
        self.order.push_front(pid);
    }

    /// Drops a popped candidate from the map.
    pub(super) fn discard(&mut self, pid: PageId) -> Option<CachedPage> {
        self.pages.remove(&pid)
    }

    /// Snapshots the current entries, unordered.
    pub(super) fn entries(&self) -> Vec<(PageId, CachedPage)> {
        self.pages.iter().map(|(pid, p)| (*pid, p.clone())).collect()
    }
}
