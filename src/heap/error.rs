//! Error types for the heap module.

use std::fmt;

use crate::datum::SerializationError;
use crate::tuple::RecordId;

/// Errors from heap file and heap page operations.
#[derive(Debug)]
pub enum HeapError {
    /// Page access outside the file's current extent, or a short read.
    InvalidPage {
        /// Owning table id.
        table: u32,
        /// Requested page number.
        page_no: u64,
    },
    /// No empty slot available for an insertion into this page.
    PageFull,
    /// Tuple does not conform to the file's schema.
    SchemaMismatch,
    /// Tuple carries no record id, or its record id names another page or
    /// an unused slot.
    BadRecordId(Option<RecordId>),
    /// Field serialization error.
    Serialization(SerializationError),
    /// I/O error from the underlying file.
    Io(std::io::Error),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::InvalidPage { table, page_no } => {
                write!(f, "table {}'s page {} is invalid", table, page_no)
            }
            HeapError::PageFull => write!(f, "no empty slot on page"),
            HeapError::SchemaMismatch => write!(f, "tuple does not match the table schema"),
            HeapError::BadRecordId(rid) => match rid {
                Some(rid) => write!(f, "record id {:?} does not name a stored tuple", rid),
                None => write!(f, "tuple has no record id"),
            },
            HeapError::Serialization(err) => write!(f, "serialization error: {}", err),
            HeapError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for HeapError {}

impl From<SerializationError> for HeapError {
    fn from(err: SerializationError) -> Self {
        HeapError::Serialization(err)
    }
}

impl From<std::io::Error> for HeapError {
    fn from(err: std::io::Error) -> Self {
        HeapError::Io(err)
    }
}
