//! Single-column comparison predicates.

use std::fmt;

use crate::datum::Field;
use crate::tuple::Tuple;

/// Comparison operator for predicates and selectivity estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `=`
    Equals,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEq,
    /// `>=`
    GreaterThanOrEq,
    /// Substring containment, strings only.
    Like,
    /// `<>`
    NotEquals,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "LIKE",
            Op::NotEquals => "<>",
        };
        f.write_str(s)
    }
}

/// Compares one column of a tuple against a constant operand.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    /// Creates a predicate testing `tuple[field] op operand`.
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Self { field, op, operand }
    }

    /// Returns the tested column index.
    pub fn field(&self) -> usize {
        self.field
    }

    /// Returns the comparison operator.
    pub fn op(&self) -> Op {
        self.op
    }

    /// Returns the constant operand.
    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Evaluates this predicate against a tuple.
    pub fn eval(&self, tuple: &Tuple) -> bool {
        tuple.field(self.field).compare(self.op, &self.operand)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$col{} {} {}", self.field, self.op, self.operand)
    }
}
