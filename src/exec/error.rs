//! Executor error types.

use std::fmt;

use super::aggregate::AggOp;
use crate::datum::Type;
use crate::storage::buffer::BufferError;

/// Errors from query operator construction and iteration.
#[derive(Debug)]
pub enum ExecError {
    /// `next` or `rewind` called on an operator that is not open.
    NotOpen,
    /// The aggregate op cannot be applied to a column of this type
    /// (only COUNT is defined over string columns).
    UnsupportedAggregate {
        /// Requested aggregate op.
        op: AggOp,
        /// Type of the aggregate column.
        ty: Type,
    },
    /// Error from the storage layer.
    Buffer(BufferError),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::NotOpen => write!(f, "operator not open"),
            ExecError::UnsupportedAggregate { op, ty } => {
                write!(f, "{} is not supported over {} columns", op, ty)
            }
            ExecError::Buffer(err) => write!(f, "buffer error: {}", err),
        }
    }
}

impl std::error::Error for ExecError {}

impl From<BufferError> for ExecError {
    fn from(err: BufferError) -> Self {
        ExecError::Buffer(err)
    }
}
