//! Sequential scan operator.

use std::sync::Arc;

use super::error::ExecError;
use crate::heap::HeapScan;
use crate::storage::buffer::{BufferError, BufferPool};
use crate::tuple::{Tuple, TupleDesc};
use crate::tx::TransactionId;

/// Scans every tuple of a registered table in page order.
///
/// Thin operator shell over [`HeapScan`]: the heap scan acquires pages
/// read-only through the buffer pool, this layer adds the open/closed
/// discipline the operator contract requires.
#[derive(Debug)]
pub struct SeqScan {
    scan: HeapScan,
    open: bool,
}

impl SeqScan {
    /// Creates a scan of `table_id` on behalf of `tid`, resolving the
    /// table through the pool's catalog.
    pub fn new(pool: Arc<BufferPool>, tid: TransactionId, table_id: u32) -> Result<Self, ExecError> {
        let file = pool
            .catalog()
            .file(table_id)
            .ok_or(BufferError::UnknownTable(table_id))?;
        Ok(Self {
            scan: file.scan(pool, tid),
            open: false,
        })
    }

    pub(super) async fn open(&mut self) -> Result<(), ExecError> {
        self.scan.open().await?;
        self.open = true;
        Ok(())
    }

    pub(super) async fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.open {
            return Err(ExecError::NotOpen);
        }
        Ok(self.scan.next().await?)
    }

    pub(super) async fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.open {
            return Err(ExecError::NotOpen);
        }
        self.scan.rewind().await?;
        Ok(())
    }

    pub(super) fn close(&mut self) {
        self.scan.close();
        self.open = false;
    }

    /// Returns the scanned table's schema.
    pub fn tuple_desc(&self) -> &TupleDesc {
        self.scan.tuple_desc()
    }
}
