//! Error types owned by the crate.
//!
//! Hardware errors stay as each driver's associated `Error` type; only the
//! codec and the status encoder fail on their own.

use core::fmt;

/// Byte codec decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Input length is not a multiple of four.
    InvalidLength(usize),
    /// A character outside the alphabet at the given offset.
    InvalidCharacter {
        /// Byte offset into the input.
        offset: usize,
        /// The offending byte.
        byte: u8,
    },
    /// `=` somewhere other than the last one or two positions.
    InvalidPadding,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLength(len) => write!(f, "length {len} is not a multiple of 4"),
            Self::InvalidCharacter { offset, byte } => {
                write!(f, "invalid character 0x{byte:02x} at offset {offset}")
            }
            Self::InvalidPadding => write!(f, "misplaced padding"),
        }
    }
}

/// Status line rendering failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Rendered line does not fit the line buffer.
    LineTooLong,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineTooLong => write!(f, "status line exceeds buffer capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(feature = "std")]
impl std::error::Error for TelemetryError {}
