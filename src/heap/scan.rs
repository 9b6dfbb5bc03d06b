//! Forward tuple iterator over a heap file.
//!
//! The scan walks page numbers from 0, acquiring each page read-only
//! through the buffer pool and buffering its tuples, so no page latch is
//! held across `next` calls and memory stays proportional to one page.

use std::sync::Arc;
use std::vec;

use super::file::HeapFile;
use crate::storage::buffer::{BufferError, BufferPool};
use crate::storage::PageId;
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::{Permissions, TransactionId};

#[derive(Debug)]
struct ScanState {
    /// Page count captured at open; pages appended later are not visited.
    num_pages: u64,
    page_no: u64,
    buffer: vec::IntoIter<Tuple>,
}

/// Single-pass forward scan over a heap file's tuples.
#[derive(Debug)]
pub struct HeapScan {
    file: Arc<HeapFile>,
    pool: Arc<BufferPool>,
    tid: TransactionId,
    state: Option<ScanState>,
}

impl HeapScan {
    pub(super) fn new(file: Arc<HeapFile>, pool: Arc<BufferPool>, tid: TransactionId) -> Self {
        Self {
            file,
            pool,
            tid,
            state: None,
        }
    }

    /// Returns the schema of the scanned tuples.
    pub fn tuple_desc(&self) -> &TupleDesc {
        self.file.tuple_desc()
    }

    /// Positions the scan at the first tuple of page 0.
    pub async fn open(&mut self) -> Result<(), BufferError> {
        let num_pages = self.file.num_pages().await.map_err(BufferError::from)?;
        let buffer = if num_pages == 0 {
            Vec::new().into_iter()
        } else {
            self.page_tuples(0).await?
        };
        self.state = Some(ScanState {
            num_pages,
            page_no: 0,
            buffer,
        });
        Ok(())
    }

    async fn page_tuples(&self, page_no: u64) -> Result<vec::IntoIter<Tuple>, BufferError> {
        let pid = PageId::new(self.file.table_id(), page_no);
        let page = self
            .pool
            .get_page(self.tid, pid, Permissions::ReadOnly)
            .await?;
        let tuples = page.read().tuples();
        Ok(tuples.into_iter())
    }

    /// Returns the next tuple, crossing page boundaries transparently, or
    /// `None` when the scan is drained or was never opened.
    pub async fn next(&mut self) -> Result<Option<Tuple>, BufferError> {
        loop {
            let (page_no, num_pages) = match self.state.as_mut() {
                None => return Ok(None),
                Some(state) => {
                    if let Some(tuple) = state.buffer.next() {
                        return Ok(Some(tuple));
                    }
                    (state.page_no, state.num_pages)
                }
            };
            if page_no + 1 >= num_pages {
                return Ok(None);
            }
            let buffer = self.page_tuples(page_no + 1).await?;
            let state = self.state.as_mut().expect("scan state present");
            state.page_no = page_no + 1;
            state.buffer = buffer;
        }
    }

    /// Restarts the scan from page 0.
    pub async fn rewind(&mut self) -> Result<(), BufferError> {
        self.close();
        self.open().await
    }

    /// Closes the scan; subsequent `next` calls yield `None`.
    pub fn close(&mut self) {
        self.state = None;
    }
}
