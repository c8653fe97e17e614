//! MySQL binary type encoding and decoding.
//!
//! Fixed-width numeric values are laid out little-endian, temporal values as
//! an 11-byte [`TimeRecord`], text as UTF-8 without a terminator and blobs as
//! raw bytes.

use bytes::{Buf, BufMut};
use chrono::{Datelike, NaiveDateTime, Timelike};

use super::error::{MySqlError, MySqlResult};

/// Pattern used to parse decoded date-time and timestamp records.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Field Types
// ============================================================================

/// Wire type tags understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType(pub u8);

impl FieldType {
    pub const DECIMAL: FieldType = FieldType(0);
    pub const TINY: FieldType = FieldType(1);
    pub const SHORT: FieldType = FieldType(2);
    pub const LONG: FieldType = FieldType(3);
    pub const FLOAT: FieldType = FieldType(4);
    pub const DOUBLE: FieldType = FieldType(5);
    pub const NULL: FieldType = FieldType(6);
    pub const TIMESTAMP: FieldType = FieldType(7);
    pub const LONGLONG: FieldType = FieldType(8);
    pub const INT24: FieldType = FieldType(9);
    pub const DATE: FieldType = FieldType(10);
    pub const TIME: FieldType = FieldType(11);
    pub const DATETIME: FieldType = FieldType(12);
    pub const YEAR: FieldType = FieldType(13);
    pub const VARCHAR: FieldType = FieldType(15);
    pub const BIT: FieldType = FieldType(16);
    pub const JSON: FieldType = FieldType(245);
    pub const NEWDECIMAL: FieldType = FieldType(246);
    pub const ENUM: FieldType = FieldType(247);
    pub const SET: FieldType = FieldType(248);
    pub const TINY_BLOB: FieldType = FieldType(249);
    pub const MEDIUM_BLOB: FieldType = FieldType(250);
    pub const LONG_BLOB: FieldType = FieldType(251);
    pub const BLOB: FieldType = FieldType(252);
    pub const VAR_STRING: FieldType = FieldType(253);
    pub const STRING: FieldType = FieldType(254);
    pub const GEOMETRY: FieldType = FieldType(255);

    /// Get the raw tag value
    #[inline]
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Byte width of fixed-layout types, `None` for variable-length ones.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            FieldType::TINY => Some(1),
            FieldType::SHORT | FieldType::YEAR => Some(2),
            FieldType::LONG | FieldType::INT24 | FieldType::FLOAT => Some(4),
            FieldType::LONGLONG | FieldType::DOUBLE => Some(8),
            FieldType::DATE | FieldType::TIME | FieldType::DATETIME | FieldType::TIMESTAMP => {
                Some(TimeRecord::LEN)
            }
            FieldType::NULL => Some(0),
            _ => None,
        }
    }

    /// Check if this is a temporal type
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            FieldType::DATE | FieldType::TIME | FieldType::DATETIME | FieldType::TIMESTAMP
        )
    }

    /// Check if this is a text-like type
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            FieldType::VARCHAR
                | FieldType::VAR_STRING
                | FieldType::STRING
                | FieldType::ENUM
                | FieldType::SET
                | FieldType::JSON
                | FieldType::DECIMAL
                | FieldType::NEWDECIMAL
        )
    }

    /// Check if this is a blob type
    pub fn is_blob(self) -> bool {
        matches!(
            self,
            FieldType::TINY_BLOB
                | FieldType::MEDIUM_BLOB
                | FieldType::LONG_BLOB
                | FieldType::BLOB
                | FieldType::GEOMETRY
                | FieldType::BIT
        )
    }
}

// ============================================================================
// Column Metadata
// ============================================================================

/// Result-set column metadata reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name (or alias)
    pub name: String,
    /// Wire type of the column
    pub field_type: FieldType,
    /// Declared maximum length
    pub length: usize,
    /// Whether integer columns are unsigned
    pub unsigned: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: FieldType, length: usize) -> Self {
        Self {
            name: name.into(),
            field_type,
            length,
            unsigned: false,
        }
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }
}

/// Size of the decode buffer bound for a result column.
///
/// Fixed-width types get their exact width; everything else is sized to the
/// column's declared length.
pub fn result_buffer_len(column: &Column) -> usize {
    column.field_type.fixed_width().unwrap_or(column.length)
}

// ============================================================================
// Temporal Record
// ============================================================================

/// Fixed-layout temporal record exchanged with the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeRecord {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: u32,
}

impl TimeRecord {
    /// Encoded size in bytes.
    pub const LEN: usize = 11;

    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            year: dt.year().clamp(0, u16::MAX as i32) as u16,
            month: dt.month() as u8,
            day: dt.day() as u8,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
            microsecond: dt.nanosecond() / 1_000,
        }
    }

    pub fn write<B: BufMut>(&self, out: &mut B) {
        out.put_u16_le(self.year);
        out.put_u8(self.month);
        out.put_u8(self.day);
        out.put_u8(self.hour);
        out.put_u8(self.minute);
        out.put_u8(self.second);
        out.put_u32_le(self.microsecond);
    }

    pub fn read(mut data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEN {
            return None;
        }
        Some(Self {
            year: data.get_u16_le(),
            month: data.get_u8(),
            day: data.get_u8(),
            hour: data.get_u8(),
            minute: data.get_u8(),
            second: data.get_u8(),
            microsecond: data.get_u32_le(),
        })
    }

    pub fn date_string(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }

    pub fn datetime_string(&self) -> String {
        format!("{} {}", self.date_string(), self.time_string())
    }
}

// ============================================================================
// Values
// ============================================================================

/// A bindable parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// A single unicode scalar, sent as text
    Char(char),
    /// Binds with microseconds; decodes at whole-second precision
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if this value is NULL
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            Value::U64(v) => i64::try_from(v).ok(),
            Value::Bool(v) => Some(v as i64),
            _ => None,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Try to get as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => self.as_i64().map(|v| v != 0),
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as bytes.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Try to get as a date-time.
    pub fn as_datetime(&self) -> Option<&NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_value! {
    String => Text,
    Vec<u8> => Bytes,
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
    NaiveDateTime => DateTime,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Encoding
// ============================================================================

/// Wire type tag and signedness used to bind a value.
pub fn tag_for(value: &Value) -> (FieldType, bool) {
    match value {
        Value::Null => (FieldType::NULL, false),
        Value::Text(_) | Value::Char(_) => (FieldType::STRING, false),
        Value::Bytes(_) => (FieldType::BLOB, false),
        Value::Bool(_) | Value::I8(_) => (FieldType::TINY, false),
        Value::U8(_) => (FieldType::TINY, true),
        Value::I16(_) => (FieldType::SHORT, false),
        Value::U16(_) => (FieldType::SHORT, true),
        Value::I32(_) => (FieldType::LONG, false),
        Value::U32(_) => (FieldType::LONG, true),
        Value::I64(_) => (FieldType::LONGLONG, false),
        Value::U64(_) => (FieldType::LONGLONG, true),
        Value::F32(_) => (FieldType::FLOAT, false),
        Value::F64(_) => (FieldType::DOUBLE, false),
        Value::DateTime(_) => (FieldType::DATETIME, false),
    }
}

/// Number of bytes `encode_into` writes for this value.
pub fn encoded_len(value: &Value) -> usize {
    match value {
        Value::Text(s) => s.len(),
        Value::Char(c) => c.len_utf8(),
        Value::Bytes(b) => b.len(),
        other => tag_for(other).0.fixed_width().unwrap_or(0),
    }
}

/// Write the binary layout of `value` into the front of `out`.
///
/// `out` must hold at least `encoded_len(value)` bytes. Returns the number of
/// bytes written.
pub fn encode_into(value: &Value, out: &mut [u8]) -> usize {
    let len = encoded_len(value);
    let mut buf = &mut out[..len];
    match value {
        Value::Null => {}
        Value::Text(s) => buf.put_slice(s.as_bytes()),
        Value::Char(c) => {
            let mut tmp = [0u8; 4];
            buf.put_slice(c.encode_utf8(&mut tmp).as_bytes());
        }
        Value::Bytes(b) => buf.put_slice(b),
        Value::Bool(v) => buf.put_u8(u8::from(*v)),
        Value::I8(v) => buf.put_i8(*v),
        Value::U8(v) => buf.put_u8(*v),
        Value::I16(v) => buf.put_i16_le(*v),
        Value::U16(v) => buf.put_u16_le(*v),
        Value::I32(v) => buf.put_i32_le(*v),
        Value::U32(v) => buf.put_u32_le(*v),
        Value::I64(v) => buf.put_i64_le(*v),
        Value::U64(v) => buf.put_u64_le(*v),
        Value::F32(v) => buf.put_f32_le(*v),
        Value::F64(v) => buf.put_f64_le(*v),
        Value::DateTime(dt) => TimeRecord::from_datetime(dt).write(&mut buf),
    }
    len
}

/// Encode a value into a freshly allocated buffer.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = vec![0u8; encoded_len(value)];
    encode_into(value, &mut out);
    out
}

// ============================================================================
// Decoding
// ============================================================================

fn fixed<const N: usize>(column: &Column, data: &[u8]) -> MySqlResult<[u8; N]> {
    data.get(..N)
        .and_then(|d| <[u8; N]>::try_from(d).ok())
        .ok_or_else(|| {
            MySqlError::Type(format!(
                "column '{}' expected {} bytes, got {}",
                column.name,
                N,
                data.len()
            ))
        })
}

fn text_or_bytes(data: &[u8]) -> Value {
    match std::str::from_utf8(data) {
        Ok(s) => Value::Text(s.to_string()),
        Err(_) => Value::Bytes(data.to_vec()),
    }
}

/// Decode the first `actual_len` bytes of a result buffer.
///
/// `actual_len` is the data length the engine reported for this row; it is
/// clamped to the buffer size when the engine truncated the value. Returns
/// `Ok(None)` for NULL-typed columns.
///
/// Date-time and timestamp records are read through [`DATETIME_FORMAT`], so
/// the record's microsecond field is dropped.
pub fn decode(column: &Column, buffer: &[u8], actual_len: usize) -> MySqlResult<Option<Value>> {
    let data = &buffer[..actual_len.min(buffer.len())];
    let unsigned = column.unsigned;

    let value = match column.field_type {
        FieldType::NULL => return Ok(None),

        FieldType::TINY => {
            let [b] = fixed::<1>(column, data)?;
            if column.length == 1 && !unsigned {
                Value::Bool(b != 0)
            } else if unsigned {
                Value::U8(b)
            } else {
                Value::I8(b as i8)
            }
        }

        FieldType::SHORT | FieldType::YEAR => {
            let raw = fixed::<2>(column, data)?;
            if unsigned || column.field_type == FieldType::YEAR {
                Value::U16(u16::from_le_bytes(raw))
            } else {
                Value::I16(i16::from_le_bytes(raw))
            }
        }

        FieldType::LONG | FieldType::INT24 => {
            let raw = fixed::<4>(column, data)?;
            if unsigned {
                Value::U32(u32::from_le_bytes(raw))
            } else {
                Value::I32(i32::from_le_bytes(raw))
            }
        }

        FieldType::LONGLONG => {
            let raw = fixed::<8>(column, data)?;
            if unsigned {
                Value::U64(u64::from_le_bytes(raw))
            } else {
                Value::I64(i64::from_le_bytes(raw))
            }
        }

        FieldType::FLOAT => Value::F32(f32::from_le_bytes(fixed::<4>(column, data)?)),
        FieldType::DOUBLE => Value::F64(f64::from_le_bytes(fixed::<8>(column, data)?)),

        ft if ft.is_temporal() => {
            let record = TimeRecord::read(data).ok_or_else(|| {
                MySqlError::Type(format!(
                    "column '{}' holds a truncated temporal record ({} bytes)",
                    column.name,
                    data.len()
                ))
            })?;
            match ft {
                FieldType::DATE => Value::Text(record.date_string()),
                FieldType::TIME => Value::Text(record.time_string()),
                _ => {
                    let text = record.datetime_string();
                    match NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT) {
                        Ok(dt) => Value::DateTime(dt),
                        Err(e) => {
                            tracing::warn!(column = %column.name, value = %text, error = %e, "date-time did not parse, returning text");
                            Value::Text(text)
                        }
                    }
                }
            }
        }

        ft if ft.is_text_like() => text_or_bytes(data),
        ft if ft.is_blob() => Value::Bytes(data.to_vec()),

        other => {
            tracing::debug!(column = %column.name, field_type = other.as_u8(), "unmapped field type, decoding as text");
            text_or_bytes(data)
        }
    };

    Ok(Some(value))
}
