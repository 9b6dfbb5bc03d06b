//! Query operators implementing the Volcano iterator model.
//!
//! Each operator produces tuples one at a time via [`OpIterator::next`].
//! Operators compose into a tree (e.g. Aggregate -> Filter -> SeqScan)
//! where each parent pulls from its child.
//!
//! [`OpIterator`] uses enum dispatch instead of `dyn Trait` to avoid
//! boxing every async method; the operator set is small and fixed.
//! Recursive calls through the tree box their futures to break the
//! recursive future cycle (OpIterator -> Filter -> OpIterator).

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod predicate;
pub mod seq_scan;
pub mod tuple_list;

pub use aggregate::{AggOp, Aggregate};
pub use error::ExecError;
pub use filter::Filter;
pub use predicate::{Op, Predicate};
pub use seq_scan::SeqScan;
pub use tuple_list::TupleList;

use std::future::Future;
use std::pin::Pin;

use crate::tuple::{Tuple, TupleDesc};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A query operator node.
#[derive(Debug)]
pub enum OpIterator {
    /// Sequential scan over a registered table.
    SeqScan(SeqScan),
    /// Predicate filter over a child stream.
    Filter(Filter),
    /// Grouped aggregation over a child stream.
    Aggregate(Aggregate),
    /// Materialized in-memory tuple stream.
    TupleList(TupleList),
}

impl OpIterator {
    /// Prepares the operator for iteration. For pipeline breakers
    /// (Aggregate) this is where the child stream is drained.
    pub fn open(&mut self) -> BoxFuture<'_, Result<(), ExecError>> {
        Box::pin(async move {
            match self {
                OpIterator::SeqScan(n) => n.open().await,
                OpIterator::Filter(n) => n.open().await,
                OpIterator::Aggregate(n) => n.open().await,
                OpIterator::TupleList(n) => n.open(),
            }
        })
    }

    /// Returns the next tuple, or `None` when drained.
    ///
    /// This follows the Volcano naming convention rather than
    /// `std::iter::Iterator`, because it is async and fallible.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> BoxFuture<'_, Result<Option<Tuple>, ExecError>> {
        Box::pin(async move {
            match self {
                OpIterator::SeqScan(n) => n.next().await,
                OpIterator::Filter(n) => n.next().await,
                OpIterator::Aggregate(n) => n.next().await,
                OpIterator::TupleList(n) => n.next(),
            }
        })
    }

    /// Restarts iteration from the first tuple.
    pub fn rewind(&mut self) -> BoxFuture<'_, Result<(), ExecError>> {
        Box::pin(async move {
            match self {
                OpIterator::SeqScan(n) => n.rewind().await,
                OpIterator::Filter(n) => n.rewind().await,
                OpIterator::Aggregate(n) => n.rewind().await,
                OpIterator::TupleList(n) => n.rewind(),
            }
        })
    }

    /// Closes the operator and its children.
    pub fn close(&mut self) {
        match self {
            OpIterator::SeqScan(n) => n.close(),
            OpIterator::Filter(n) => n.close(),
            OpIterator::Aggregate(n) => n.close(),
            OpIterator::TupleList(n) => n.close(),
        }
    }

    /// Returns the schema of this operator's output tuples.
    pub fn tuple_desc(&self) -> &TupleDesc {
        match self {
            OpIterator::SeqScan(n) => n.tuple_desc(),
            OpIterator::Filter(n) => n.tuple_desc(),
            OpIterator::Aggregate(n) => n.tuple_desc(),
            OpIterator::TupleList(n) => n.tuple_desc(),
        }
    }

    /// Returns this operator's children, outermost first.
    pub fn children(&self) -> Vec<&OpIterator> {
        match self {
            OpIterator::SeqScan(_) | OpIterator::TupleList(_) => Vec::new(),
            OpIterator::Filter(n) => vec![n.child()],
            OpIterator::Aggregate(n) => vec![n.child()],
        }
    }

    /// Replaces this operator's children with `children`.
    ///
    /// # Panics
    ///
    /// Panics if the child count does not match the operator's arity.
    pub fn set_children(&mut self, mut children: Vec<OpIterator>) {
        match self {
            OpIterator::SeqScan(_) | OpIterator::TupleList(_) => {
                assert!(children.is_empty(), "leaf operators take no children");
            }
            OpIterator::Filter(n) => {
                assert_eq!(children.len(), 1, "Filter takes exactly one child");
                n.set_child(children.pop().expect("one child"));
            }
            OpIterator::Aggregate(n) => {
                assert_eq!(children.len(), 1, "Aggregate takes exactly one child");
                n.set_child(children.pop().expect("one child"));
            }
        }
    }
}
