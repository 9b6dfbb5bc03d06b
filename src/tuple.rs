//! Tuples and tuple descriptors.
//!
//! A [`Tuple`] is a row of [`Field`] values. Its shape is described by a
//! [`TupleDesc`], which travels with the container (heap page, operator)
//! rather than with every tuple. A tuple that lives on a page also carries
//! a [`RecordId`] naming its slot.

use std::fmt;

use crate::datum::{Field, Type};
use crate::storage::PageId;

/// Global identifier for a stored tuple (page + slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// Page containing the tuple.
    pub page: PageId,
    /// Slot within the page.
    pub slot: usize,
}

impl RecordId {
    /// Creates a new record identifier.
    pub fn new(page: PageId, slot: usize) -> Self {
        Self { page, slot }
    }
}

/// Ordered description of a tuple's columns: a type and an optional name
/// per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    types: Vec<Type>,
    names: Vec<Option<String>>,
}

impl TupleDesc {
    /// Creates a descriptor from parallel type and name lists.
    ///
    /// # Panics
    ///
    /// Panics if the lists differ in length or are empty.
    pub fn new(types: Vec<Type>, names: Vec<Option<String>>) -> Self {
        assert_eq!(types.len(), names.len(), "types and names must align");
        assert!(!types.is_empty(), "a tuple needs at least one column");
        Self { types, names }
    }

    /// Creates a descriptor with unnamed columns.
    pub fn unnamed(types: Vec<Type>) -> Self {
        let names = vec![None; types.len()];
        Self::new(types, names)
    }

    /// Returns the number of columns.
    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    /// Returns the type of column `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn field_type(&self, i: usize) -> Type {
        self.types[i]
    }

    /// Returns the name of column `i`, if it has one.
    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.names[i].as_deref()
    }

    /// Returns the serialized size of a conforming tuple, in bytes.
    pub fn byte_size(&self) -> usize {
        self.types.iter().map(|t| t.byte_size()).sum()
    }

    /// Returns true if `tuple` conforms to this descriptor.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple.fields.len() == self.types.len()
            && tuple
                .fields
                .iter()
                .zip(self.types.iter())
                .all(|(f, t)| f.ty() == *t)
    }
}

impl fmt::Display for TupleDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ty) in self.types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.field_name(i) {
                Some(name) => write!(f, "{}({})", ty, name)?,
                None => write!(f, "{}", ty)?,
            }
        }
        Ok(())
    }
}

/// A row of field values, optionally anchored to a page slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<Field>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Creates an unanchored tuple from its field values.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, rid: None }
    }

    /// Returns the field at column `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of range.
    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    /// Returns all fields in column order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the number of fields.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Returns where this tuple is stored, if anywhere.
    pub fn record_id(&self) -> Option<RecordId> {
        self.rid
    }

    /// Anchors (or unanchors) this tuple to a page slot. Set by the storage
    /// layer on insertion and page parse.
    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.rid = rid;
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}
