//! Materialized in-memory tuple stream.
//!
//! Backs the aggregate operator's result stage and serves as a fixed
//! tuple source in tests. Purely synchronous; the async surface in
//! [`OpIterator`](super::OpIterator) wraps it.

use super::error::ExecError;
use crate::tuple::{Tuple, TupleDesc};

/// An operator yielding a pre-built list of tuples.
#[derive(Debug)]
pub struct TupleList {
    desc: TupleDesc,
    tuples: Vec<Tuple>,
    cursor: Option<usize>,
}

impl TupleList {
    /// Creates a closed stream over `tuples`, all conforming to `desc`.
    pub fn new(desc: TupleDesc, tuples: Vec<Tuple>) -> Self {
        Self {
            desc,
            tuples,
            cursor: None,
        }
    }

    /// Positions the stream before the first tuple.
    pub fn open(&mut self) -> Result<(), ExecError> {
        self.cursor = Some(0);
        Ok(())
    }

    /// Returns the next tuple, or `None` when drained.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        let cursor = self.cursor.as_mut().ok_or(ExecError::NotOpen)?;
        match self.tuples.get(*cursor) {
            Some(tuple) => {
                *cursor += 1;
                Ok(Some(tuple.clone()))
            }
            None => Ok(None),
        }
    }

    /// Repositions before the first tuple.
    pub fn rewind(&mut self) -> Result<(), ExecError> {
        if self.cursor.is_none() {
            return Err(ExecError::NotOpen);
        }
        self.cursor = Some(0);
        Ok(())
    }

    /// Closes the stream.
    pub fn close(&mut self) {
        self.cursor = None;
    }

    /// Returns the stream's schema.
    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }
}
