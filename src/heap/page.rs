//! Heap page: fixed-width tuple slots behind an occupancy bitmap.
//!
//! Page layout:
//!
//! ```text
//! +--------------------+ offset 0
//! | occupancy bitmap   | ceil(slots / 8) bytes, bit i = slot i used
//! +--------------------+
//! | slot 0             | tuple_bytes each, fixed width
//! | slot 1             |
//! | ...                |
//! +--------------------+
//! | padding (zeros)    |
//! +--------------------+ offset page_size
//! ```
//!
//! The slot count is chosen so that each slot costs its tuple bytes plus
//! one bitmap bit: `slots = (page_size * 8) / (tuple_bytes * 8 + 1)`.
//!
//! A page is parsed into memory once and serialized back on flush; all
//! mutation happens in place on the parsed representation. A page of all
//! zeros is a valid, fully empty page, which is what the heap file appends
//! when it grows.

use super::error::HeapError;
use crate::datum::Field;
use crate::storage::{PageId, page_size};
use crate::tuple::{RecordId, Tuple, TupleDesc};
use crate::tx::TransactionId;

/// A fixed-size page holding an unordered set of fixed-width tuples.
#[derive(Debug)]
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    header: Vec<u8>,
    tuples: Vec<Option<Tuple>>,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Returns the number of tuple slots a page holds for the given schema,
    /// under the current page size.
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (page_size() * 8) / (desc.byte_size() * 8 + 1)
    }

    /// Returns the bitmap size in bytes for the given schema.
    fn header_bytes(desc: &TupleDesc) -> usize {
        Self::slots_per_page(desc).div_ceil(8)
    }

    /// Returns a page-size buffer representing an all-empty page.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; page_size()]
    }

    /// Parses a page from exactly `page_size` bytes.
    ///
    /// The parsed page is clean: [`is_dirty`](Self::is_dirty) is `None`.
    pub fn parse(pid: PageId, desc: TupleDesc, data: &[u8]) -> Result<Self, HeapError> {
        if data.len() != page_size() {
            return Err(HeapError::InvalidPage {
                table: pid.table(),
                page_no: pid.page_no(),
            });
        }

        let num_slots = Self::slots_per_page(&desc);
        let header_bytes = Self::header_bytes(&desc);
        let tuple_bytes = desc.byte_size();
        let header = data[..header_bytes].to_vec();

        let mut tuples = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if (header[slot / 8] >> (slot % 8)) & 1 == 0 {
                tuples.push(None);
                continue;
            }
            let start = header_bytes + slot * tuple_bytes;
            let mut fields = Vec::with_capacity(desc.num_fields());
            let mut offset = start;
            for i in 0..desc.num_fields() {
                let ty = desc.field_type(i);
                fields.push(Field::read_from(ty, &data[offset..offset + ty.byte_size()])?);
                offset += ty.byte_size();
            }
            let mut tuple = Tuple::new(fields);
            tuple.set_record_id(Some(RecordId::new(pid, slot)));
            tuples.push(Some(tuple));
        }

        Ok(Self {
            pid,
            desc,
            header,
            tuples,
            dirtier: None,
        })
    }

    /// Returns this page's identity.
    pub fn id(&self) -> PageId {
        self.pid
    }

    /// Returns the schema of the tuples on this page.
    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Serializes the page back into exactly `page_size` bytes.
    ///
    /// Empty slots and trailing padding are zeroed, so a parse/serialize
    /// round trip preserves the byte sequence.
    pub fn page_data(&self) -> Vec<u8> {
        let mut data = vec![0u8; page_size()];
        let header_bytes = self.header.len();
        let tuple_bytes = self.desc.byte_size();
        data[..header_bytes].copy_from_slice(&self.header);

        for (slot, tuple) in self.tuples.iter().enumerate() {
            let Some(tuple) = tuple else { continue };
            let mut offset = header_bytes + slot * tuple_bytes;
            for field in tuple.fields() {
                let size = field.byte_size();
                field
                    .write_to(&mut data[offset..offset + size])
                    .expect("slot region sized from the schema");
                offset += size;
            }
        }
        data
    }

    /// Returns the total number of tuple slots.
    pub fn num_slots(&self) -> usize {
        self.tuples.len()
    }

    /// Returns the number of unused slots.
    pub fn num_empty_slots(&self) -> usize {
        self.tuples.iter().filter(|t| t.is_none()).count()
    }

    /// Returns true if slot `slot` holds a tuple.
    pub fn is_slot_used(&self, slot: usize) -> bool {
        slot < self.tuples.len() && self.tuples[slot].is_some()
    }

    /// Inserts a tuple into the first empty slot and anchors its record id
    /// to this page.
    ///
    /// # Errors
    ///
    /// - [`HeapError::SchemaMismatch`] if the tuple does not conform to the
    ///   page's schema.
    /// - [`HeapError::PageFull`] if no slot is empty.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> Result<RecordId, HeapError> {
        if !self.desc.matches(&tuple) {
            return Err(HeapError::SchemaMismatch);
        }
        let slot = self
            .tuples
            .iter()
            .position(|t| t.is_none())
            .ok_or(HeapError::PageFull)?;

        let rid = RecordId::new(self.pid, slot);
        tuple.set_record_id(Some(rid));
        self.header[slot / 8] |= 1 << (slot % 8);
        self.tuples[slot] = Some(tuple);
        Ok(rid)
    }

    /// Removes the tuple named by `tuple`'s record id from this page.
    ///
    /// # Errors
    ///
    /// [`HeapError::BadRecordId`] if the tuple has no record id, the record
    /// id names another page, or the slot is not in use.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), HeapError> {
        let rid = tuple.record_id().ok_or(HeapError::BadRecordId(None))?;
        if rid.page != self.pid || rid.slot >= self.tuples.len() || self.tuples[rid.slot].is_none()
        {
            return Err(HeapError::BadRecordId(Some(rid)));
        }
        self.header[rid.slot / 8] &= !(1 << (rid.slot % 8));
        self.tuples[rid.slot] = None;
        Ok(())
    }

    /// Iterates over the stored tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> {
        self.tuples.iter().flatten()
    }

    /// Returns a clone of the stored tuples in slot order.
    pub fn tuples(&self) -> Vec<Tuple> {
        self.iter().cloned().collect()
    }

    /// Returns the transaction that dirtied this page, if any.
    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    /// Records (or clears) the transaction responsible for this page's
    /// in-memory mutations.
    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }
}
