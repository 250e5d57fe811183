//! Serial line transport seams.
//!
//! The host link is a byte stream in and a line stream out. USB/UART
//! bring-up is out of scope; these traits are what the dispatch loop polls
//! and writes.

/// Non-blocking serial byte input.
pub trait SerialInput {
    /// Returns the next received byte, or `None` if nothing is pending.
    ///
    /// Must never block.
    fn poll_byte(&mut self) -> Option<u8>;
}

/// Line-oriented status output.
///
/// Each call receives one complete, newline-terminated line. Implementations
/// must write and flush it as a unit so lines from different writers never
/// interleave.
pub trait StatusSink {
    /// Error type for writes.
    type Error;

    /// Write and flush one terminated line.
    fn write_line(&mut self, line: &str) -> Result<(), Self::Error>;
}
