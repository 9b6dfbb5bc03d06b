//! Heap file: a table stored as a flat sequence of pages.
//!
//! The backing file is a contiguous run of `page_size`-byte pages, page 0
//! first. The file handle is wrapped in a `tokio::sync::Mutex` so reads,
//! writes, and appends are serialized; page-level concurrency control is
//! the buffer pool's job, not this layer's.
//!
//! The mutating operations and the scan go through the buffer pool for
//! page acquisition: the pool is passed in by the caller rather than
//! reached through process-wide state.

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;
use xxhash_rust::xxh32::xxh32;

use super::error::HeapError;
use super::page::HeapPage;
use super::scan::HeapScan;
use crate::storage::buffer::{BufferError, BufferPool, CachedPage};
use crate::storage::{PageId, page_size};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::{Permissions, TransactionId};
use std::sync::Arc;

/// An unordered tuple container backed by a single paged file.
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    table_id: u32,
    desc: TupleDesc,
    file: Mutex<File>,
}

impl HeapFile {
    /// Opens (creating if absent) the heap file at `path` with the given
    /// schema.
    ///
    /// The table id is a deterministic hash of the absolute path, so every
    /// open of the same file yields the same id.
    pub async fn open(path: impl AsRef<Path>, desc: TupleDesc) -> Result<Self, HeapError> {
        let path = std::path::absolute(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;
        let table_id = xxh32(path.as_os_str().as_encoded_bytes(), 0);
        Ok(Self {
            path,
            table_id,
            desc,
            file: Mutex::new(file),
        })
    }

    /// Returns the id uniquely identifying this table.
    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    /// Returns the schema of the tuples stored in this file.
    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Returns the absolute path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of pages currently in the file.
    ///
    /// Computed from the live file length, so a grow by another
    /// transaction is visible immediately.
    pub async fn num_pages(&self) -> Result<u64, HeapError> {
        let file = self.file.lock().await;
        let len = file.metadata().await?.len();
        Ok(len.div_ceil(page_size() as u64))
    }

    /// Reads and parses the page identified by `pid` straight from disk.
    ///
    /// The returned page is clean. Asking for a page at or beyond the
    /// file's current extent is a caller bug surfaced as
    /// [`HeapError::InvalidPage`].
    pub async fn read_page(&self, pid: PageId) -> Result<HeapPage, HeapError> {
        let ps = page_size() as u64;
        let invalid = || HeapError::InvalidPage {
            table: pid.table(),
            page_no: pid.page_no(),
        };

        let mut buf = vec![0u8; page_size()];
        {
            let mut file = self.file.lock().await;
            let len = file.metadata().await?.len();
            if pid.table() != self.table_id || (pid.page_no() + 1) * ps > len {
                return Err(invalid());
            }
            file.seek(std::io::SeekFrom::Start(pid.page_no() * ps))
                .await?;
            file.read_exact(&mut buf).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    invalid()
                } else {
                    HeapError::Io(e)
                }
            })?;
        }
        HeapPage::parse(pid, self.desc.clone(), &buf)
    }

    /// Writes a page back to its slot in the file.
    pub async fn write_page(&self, page: &HeapPage) -> Result<(), HeapError> {
        self.write_raw(page.id().page_no(), &page.page_data()).await
    }

    /// Writes pre-serialized page bytes to the given page slot.
    pub(crate) async fn write_raw(&self, page_no: u64, data: &[u8]) -> Result<(), HeapError> {
        assert_eq!(data.len(), page_size(), "page data must be page-sized");
        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(page_no * page_size() as u64))
            .await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }

    /// Forces written pages down to the device.
    pub async fn sync(&self) -> Result<(), HeapError> {
        let file = self.file.lock().await;
        file.sync_data().await?;
        Ok(())
    }

    /// Appends one all-empty page's worth of bytes to the file.
    async fn append_empty_page(&self) -> Result<(), HeapError> {
        let mut file = self.file.lock().await;
        let len = file.metadata().await?.len();
        file.seek(std::io::SeekFrom::Start(len)).await?;
        file.write_all(&HeapPage::empty_page_data()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Inserts a tuple into the first page with a free slot, extending the
    /// file by one page when every existing page is full.
    ///
    /// Pages are probed under exclusive locks acquired through the pool;
    /// a probed page with no free slot has its lock released immediately
    /// rather than held to transaction end, so a long free-slot search
    /// does not pin down pages the transaction will never touch. This is
    /// the engine's one sanctioned relaxation of strict two-phase locking.
    ///
    /// Returns the single page dirtied by the insertion.
    pub async fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Vec<CachedPage>, BufferError> {
        let num_pages = self.num_pages().await.map_err(BufferError::from)?;
        for page_no in 0..num_pages {
            let pid = PageId::new(self.table_id, page_no);
            let page = pool.get_page(tid, pid, Permissions::ReadWrite).await?;
            let full = page.read().num_empty_slots() == 0;
            if full {
                pool.unsafe_release_page(tid, pid);
                continue;
            }
            page.write().insert_tuple(tuple)?;
            return Ok(vec![page]);
        }

        // Every page is full: grow the file and place the tuple on the new
        // last page.
        self.append_empty_page().await.map_err(BufferError::from)?;
        let last = self.num_pages().await.map_err(BufferError::from)? - 1;
        debug!(table = self.table_id, page_no = last, "extended heap file");

        let pid = PageId::new(self.table_id, last);
        let page = pool.get_page(tid, pid, Permissions::ReadWrite).await?;
        page.write().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Deletes the tuple named by `tuple`'s record id.
    ///
    /// Returns the single page dirtied by the deletion.
    pub async fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<CachedPage>, BufferError> {
        let rid = tuple
            .record_id()
            .ok_or(BufferError::Heap(HeapError::BadRecordId(None)))?;
        let page = pool.get_page(tid, rid.page, Permissions::ReadWrite).await?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Returns a forward tuple iterator over this file on behalf of `tid`.
    ///
    /// Pages are acquired read-only through the pool as the scan advances.
    pub fn scan(self: &Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> HeapScan {
        HeapScan::new(self.clone(), pool, tid)
    }
}
