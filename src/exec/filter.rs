//! Predicate filter operator.

use super::OpIterator;
use super::error::ExecError;
use super::predicate::Predicate;
use crate::tuple::{Tuple, TupleDesc};

/// Passes through only the child tuples satisfying a predicate.
#[derive(Debug)]
pub struct Filter {
    predicate: Predicate,
    child: Box<OpIterator>,
    open: bool,
}

impl Filter {
    /// Creates a filter applying `predicate` to `child`'s output.
    pub fn new(predicate: Predicate, child: OpIterator) -> Self {
        Self {
            predicate,
            child: Box::new(child),
            open: false,
        }
    }

    /// Returns the filter predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub(super) async fn open(&mut self) -> Result<(), ExecError> {
        self.child.open().await?;
        self.open = true;
        Ok(())
    }

    pub(super) async fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        if !self.open {
            return Err(ExecError::NotOpen);
        }
        loop {
            match self.child.next().await? {
                Some(tuple) if self.predicate.eval(&tuple) => return Ok(Some(tuple)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }

    pub(super) async fn rewind(&mut self) -> Result<(), ExecError> {
        if !self.open {
            return Err(ExecError::NotOpen);
        }
        self.child.rewind().await
    }

    pub(super) fn close(&mut self) {
        self.child.close();
        self.open = false;
    }

    /// The filter passes tuples through unchanged.
    pub fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }

    pub(super) fn child(&self) -> &OpIterator {
        &self.child
    }

    pub(super) fn set_child(&mut self, child: OpIterator) {
        self.child = Box::new(child);
    }
}
