//! Grouped aggregation.
//!
//! [`Aggregator`] accumulates per-group state as tuples are merged in;
//! [`Aggregate`] is the operator shell that drains its child on `open`,
//! materializes the grouped results, and then streams them out. Only
//! single-column aggregates grouped by at most one column are supported.

use std::collections::HashMap;
use std::fmt;

use super::OpIterator;
use super::error::ExecError;
use super::tuple_list::TupleList;
use crate::datum::{Field, Type};
use crate::tuple::{Tuple, TupleDesc};

/// Aggregate operator over a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    /// Row count per group.
    Count,
    /// Sum of the aggregate column per group.
    Sum,
    /// Minimum of the aggregate column per group.
    Min,
    /// Maximum of the aggregate column per group.
    Max,
    /// Truncated integer mean of the aggregate column per group.
    Avg,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggOp::Count => "COUNT",
            AggOp::Sum => "SUM",
            AggOp::Min => "MIN",
            AggOp::Max => "MAX",
            AggOp::Avg => "AVG",
        };
        f.write_str(s)
    }
}

/// Running aggregate state, keyed by group value (`None` = no grouping).
///
/// COUNT works over any column type; SUM/MIN/MAX/AVG read the aggregate
/// column as an integer. MIN seeds from `i32::MAX` so the first value
/// always wins; MAX seeds from 0, so an all-negative input reports 0.
/// AVG keeps per-group running sums and counts and stores the truncated
/// mean after every merge.
pub struct Aggregator {
    op: AggOp,
    gfield: Option<usize>,
    afield: usize,
    results: HashMap<Option<Field>, i32>,
    sums: HashMap<Option<Field>, i32>,
    counts: HashMap<Option<Field>, i32>,
}

impl Aggregator {
    /// Creates empty aggregate state for `op` over column `afield`,
    /// grouped by `gfield` when present.
    pub fn new(op: AggOp, gfield: Option<usize>, afield: usize) -> Self {
        Self {
            op,
            gfield,
            afield,
            results: HashMap::new(),
            sums: HashMap::new(),
            counts: HashMap::new(),
        }
    }

    /// Merges one tuple into the running state.
    pub fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecError> {
        let key = self.gfield.map(|g| tuple.field(g).clone());

        if self.op == AggOp::Count {
            *self.results.entry(key).or_insert(0) += 1;
            return Ok(());
        }

        let value = match tuple.field(self.afield) {
            Field::Int(v) => *v,
            Field::Str(_) => {
                return Err(ExecError::UnsupportedAggregate {
                    op: self.op,
                    ty: Type::Str,
                });
            }
        };
        match self.op {
            AggOp::Sum => *self.results.entry(key).or_insert(0) += value,
            AggOp::Min => {
                let entry = self.results.entry(key).or_insert(i32::MAX);
                *entry = (*entry).min(value);
            }
            AggOp::Max => {
                let entry = self.results.entry(key).or_insert(0);
                *entry = (*entry).max(value);
            }
            AggOp::Avg => {
                let sum = self.sums.entry(key.clone()).or_insert(0);
                *sum += value;
                let sum = *sum;
                let count = self.counts.entry(key.clone()).or_insert(0);
                *count += 1;
                self.results.insert(key, sum / *count);
            }
            AggOp::Count => unreachable!("handled above"),
        }
        Ok(())
    }

    /// Materializes the grouped results into output tuples.
    ///
    /// Grouped: `(group, aggregate)` pairs in map iteration order (the
    /// order is not guaranteed). Ungrouped: a single `(aggregate)` tuple,
    /// or nothing if no tuples were merged.
    pub fn into_tuples(self) -> Vec<Tuple> {
        if self.gfield.is_none() {
            return self
                .results
                .get(&None)
                .map(|v| Tuple::new(vec![Field::Int(*v)]))
                .into_iter()
                .collect();
        }
        self.results
            .into_iter()
            .map(|(key, v)| {
                let key = key.expect("grouped state only holds present keys");
                Tuple::new(vec![key, Field::Int(v)])
            })
            .collect()
    }
}

/// The aggregation operator: drains its child on `open`, groups by an
/// optional key column, and streams the materialized results.
#[derive(Debug)]
pub struct Aggregate {
    child: Box<OpIterator>,
    afield: usize,
    gfield: Option<usize>,
    op: AggOp,
    desc: TupleDesc,
    results: Option<TupleList>,
}

impl Aggregate {
    /// Creates an aggregate of `op` over `child`'s column `afield`,
    /// grouped by `gfield` when present.
    ///
    /// The output schema is `("<OP>(<a_name>)": INT)` without grouping and
    /// `(<g_name>: g_type, "<OP>(<a_name>)": INT)` with it.
    ///
    /// # Errors
    ///
    /// [`ExecError::UnsupportedAggregate`] if the aggregate column is a
    /// string and `op` is anything but COUNT.
    pub fn new(
        child: OpIterator,
        afield: usize,
        gfield: Option<usize>,
        op: AggOp,
    ) -> Result<Self, ExecError> {
        let child_desc = child.tuple_desc();
        let agg_ty = child_desc.field_type(afield);
        if agg_ty == Type::Str && op != AggOp::Count {
            return Err(ExecError::UnsupportedAggregate { op, ty: agg_ty });
        }

        let agg_name = format!(
            "{}({})",
            op,
            child_desc.field_name(afield).unwrap_or_default()
        );
        let desc = match gfield {
            None => TupleDesc::new(vec![Type::Int], vec![Some(agg_name)]),
            Some(g) => TupleDesc::new(
                vec![child_desc.field_type(g), Type::Int],
                vec![
                    child_desc.field_name(g).map(str::to_string),
                    Some(agg_name),
                ],
            ),
        };

        Ok(Self {
            child: Box::new(child),
            afield,
            gfield,
            op,
            desc,
            results: None,
        })
    }

    /// Returns the aggregation operator.
    pub fn op(&self) -> AggOp {
        self.op
    }

    /// Returns the group-by column index in the input, if any.
    pub fn group_field(&self) -> Option<usize> {
        self.gfield
    }

    /// Returns the aggregate column index in the input.
    pub fn aggregate_field(&self) -> usize {
        self.afield
    }

    pub(super) async fn open(&mut self) -> Result<(), ExecError> {
        self.child.open().await?;
        let mut state = Aggregator::new(self.op, self.gfield, self.afield);
        while let Some(tuple) = self.child.next().await? {
            state.merge(&tuple)?;
        }
        let mut list = TupleList::new(self.desc.clone(), state.into_tuples());
        list.open()?;
        self.results = Some(list);
        Ok(())
    }

    pub(super) async fn next(&mut self) -> Result<Option<Tuple>, ExecError> {
        match self.results.as_mut() {
            None => Err(ExecError::NotOpen),
            Some(list) => list.next(),
        }
    }

    /// Rewinds only the materialized result stream; the child is not
    /// re-drained.
    pub(super) async fn rewind(&mut self) -> Result<(), ExecError> {
        match self.results.as_mut() {
            None => Err(ExecError::NotOpen),
            Some(list) => list.rewind(),
        }
    }

    pub(super) fn close(&mut self) {
        self.child.close();
        self.results = None;
    }

    /// Returns the output schema.
    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub(super) fn child(&self) -> &OpIterator {
        &self.child
    }

    pub(super) fn set_child(&mut self, child: OpIterator) {
        self.child = Box::new(child);
    }
}
