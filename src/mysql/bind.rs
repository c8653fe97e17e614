//! Bind slots backing statement parameters and result rows.
//!
//! A [`BindSet`] owns one buffer per parameter or result column. Buffers only
//! grow: re-binding a value that fits reuses the existing allocation, so
//! repeated executions with varying value sizes settle on the largest size
//! seen. Buffers are freed when the set is released or dropped.

use bytes::BytesMut;
use smallvec::SmallVec;

use super::types::{self, result_buffer_len, Column, FieldType, Value};

// ============================================================================
// Bind Slot
// ============================================================================

/// One parameter's or one result column's buffer and metadata.
#[derive(Debug)]
pub struct BindSlot {
    field_type: FieldType,
    unsigned: bool,
    /// Allocated buffer; its length is the declared length of the slot
    buffer: BytesMut,
    /// Bytes of meaningful data (may exceed the buffer when truncated)
    data_length: usize,
    is_null: bool,
}

impl BindSlot {
    /// Create a slot with a zeroed buffer of `len` bytes.
    pub fn new(field_type: FieldType, unsigned: bool, len: usize) -> Self {
        Self {
            field_type,
            unsigned,
            buffer: BytesMut::zeroed(len),
            data_length: 0,
            is_null: false,
        }
    }

    /// Create a decode slot sized for a result column.
    pub fn for_column(column: &Column) -> Self {
        Self::new(column.field_type, column.unsigned, result_buffer_len(column))
    }

    fn empty() -> Self {
        Self::new(FieldType::NULL, false, 0)
    }

    #[inline]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    #[inline]
    pub fn is_unsigned(&self) -> bool {
        self.unsigned
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.is_null
    }

    /// Allocated buffer length.
    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Length of the value held in (or reported for) this slot.
    #[inline]
    pub fn data_length(&self) -> usize {
        self.data_length
    }

    /// The whole allocated buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// The bytes of the current value, clamped to the buffer.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.data_length.min(self.buffer.len())]
    }

    /// Check whether the engine reported more data than the buffer holds.
    pub fn is_truncated(&self) -> bool {
        !self.is_null && self.data_length > self.buffer.len()
    }

    /// Ensure the buffer holds at least `len` bytes, reallocating if not.
    ///
    /// Returns `true` when a new buffer was allocated.
    pub fn ensure_capacity(&mut self, len: usize) -> bool {
        if self.buffer.len() >= len {
            return false;
        }
        self.buffer = BytesMut::zeroed(len);
        true
    }

    /// Encode a parameter value into this slot.
    pub fn set_value(&mut self, value: &Value) {
        let (field_type, unsigned) = types::tag_for(value);
        self.field_type = field_type;
        self.unsigned = unsigned;

        if value.is_null() {
            self.set_null();
            return;
        }

        let len = types::encoded_len(value);
        self.ensure_capacity(len);
        self.data_length = types::encode_into(value, &mut self.buffer);
        self.is_null = false;
    }

    /// Store bytes delivered by the engine for the current row.
    ///
    /// Copies as much as fits and records the full length. Returns `false`
    /// when the value was truncated.
    pub fn fill(&mut self, data: &[u8]) -> bool {
        let n = data.len().min(self.buffer.len());
        self.buffer[..n].copy_from_slice(&data[..n]);
        self.data_length = data.len();
        self.is_null = false;
        n == data.len()
    }

    /// Mark the slot as holding NULL.
    pub fn set_null(&mut self) {
        self.data_length = 0;
        self.is_null = true;
    }

    /// Decode the slot's current value against its column metadata.
    pub fn decode(&self, column: &Column) -> super::error::MySqlResult<Option<Value>> {
        if self.is_null {
            return Ok(None);
        }
        types::decode(column, &self.buffer, self.data_length)
    }
}

// ============================================================================
// Bind Set
// ============================================================================

/// Ordered slots for one parameter list or one result row.
#[derive(Debug, Default)]
pub struct BindSet {
    slots: SmallVec<[BindSlot; 8]>,
}

impl BindSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode slots for every column of a result set.
    pub fn for_columns(columns: &[Column]) -> Self {
        Self {
            slots: columns.iter().map(BindSlot::for_column).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[BindSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [BindSlot] {
        &mut self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&BindSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut BindSlot> {
        self.slots.get_mut(index)
    }

    /// Bind a parameter list, reusing existing slot buffers where possible.
    pub fn bind_params(&mut self, params: &[Value]) {
        if self.slots.len() > params.len() {
            self.slots.truncate(params.len());
        }
        while self.slots.len() < params.len() {
            self.slots.push(BindSlot::empty());
        }
        for (slot, value) in self.slots.iter_mut().zip(params) {
            slot.set_value(value);
        }
    }

    /// Total bytes currently allocated across all slots.
    pub fn allocated_bytes(&self) -> usize {
        self.slots.iter().map(BindSlot::buffer_len).sum()
    }

    /// Free every slot buffer. Safe to call more than once.
    pub fn release(&mut self) {
        self.slots.clear();
    }
}
