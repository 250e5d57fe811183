//! Status line encoder.
//!
//! A [`StatusRecord`] is an ordered list of typed key/value pairs rendered
//! as one compact JSON object per line. Numbers and booleans render as
//! native JSON values; strings as JSON strings; raw bytes as strings in the
//! [`codec`](crate::codec) alphabet.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::telemetry::StatusRecord;
//!
//! let line = StatusRecord::new()
//!     .str("status", "update")
//!     .int("app_id", 0)
//!     .float("temp1", 25.5)
//!     .bool("enabled1", true)
//!     .bytes("raw", &[0xde, 0xad])
//!     .render()
//!     .unwrap();
//!
//! assert_eq!(
//!     line.as_str(),
//!     "{\"status\":\"update\",\"app_id\":0,\"temp1\":25.5,\"enabled1\":true,\"raw\":\"3q0=\"}\n"
//! );
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use heapless::String as HString;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::codec;
use crate::error::TelemetryError;
use crate::traits::StatusSink;

/// Maximum rendered status line length, terminator included.
pub const STATUS_LINE_CAPACITY: usize = 1024;

/// One rendered, newline-terminated status line.
pub type StatusLine = HString<STATUS_LINE_CAPACITY>;

/// Type tag of a status value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    /// UTF-8 text.
    Str,
    /// Signed integer.
    Int,
    /// Floating point.
    Float,
    /// Boolean.
    Bool,
    /// Raw byte buffer (rendered through the byte codec).
    Bytes,
}

/// A status value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// UTF-8 text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f32),
    /// Boolean.
    Bool(bool),
    /// Raw byte buffer.
    Bytes(Vec<u8>),
}

impl Value {
    /// The value's type tag.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Str(_) => ValueKind::Str,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f32(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Bytes(bytes) => serializer.serialize_str(&codec::encode(bytes)),
        }
    }
}

/// Ordered status record builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusRecord {
    fields: Vec<(&'static str, Value)>,
}

impl StatusRecord {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    pub fn push(mut self, key: &'static str, value: Value) -> Self {
        self.fields.push((key, value));
        self
    }

    /// Append a string field.
    pub fn str(self, key: &'static str, value: &str) -> Self {
        self.push(key, Value::Str(String::from(value)))
    }

    /// Append an integer field.
    pub fn int(self, key: &'static str, value: i64) -> Self {
        self.push(key, Value::Int(value))
    }

    /// Append a float field.
    pub fn float(self, key: &'static str, value: f32) -> Self {
        self.push(key, Value::Float(value))
    }

    /// Append a boolean field.
    pub fn bool(self, key: &'static str, value: bool) -> Self {
        self.push(key, Value::Bool(value))
    }

    /// Append a raw byte field.
    pub fn bytes(self, key: &'static str, value: &[u8]) -> Self {
        self.push(key, Value::Bytes(value.to_vec()))
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[(&'static str, Value)] {
        &self.fields
    }

    /// Look up the first field with `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render to one newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// [`TelemetryError::LineTooLong`] if the line does not fit
    /// [`STATUS_LINE_CAPACITY`]. A partial line is never produced.
    pub fn render(&self) -> Result<StatusLine, TelemetryError> {
        let mut line: StatusLine = serde_json_core::to_string(self)
            .map_err(|_| TelemetryError::LineTooLong)?;
        line.push('\n').map_err(|_| TelemetryError::LineTooLong)?;
        Ok(line)
    }

    /// Render and hand the whole line to `sink` in a single write.
    pub fn emit<S: StatusSink>(&self, sink: &mut S) -> Result<(), EmitError<S::Error>> {
        let line = self.render().map_err(EmitError::Render)?;
        sink.write_line(&line).map_err(EmitError::Sink)
    }
}

impl Serialize for StatusRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Failure to emit a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitError<E> {
    /// The record could not be rendered.
    Render(TelemetryError),
    /// The sink rejected the write.
    Sink(E),
}
