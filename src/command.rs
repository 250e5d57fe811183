//! Command line decoding.
//!
//! Commands arrive as one JSON object per line. Each channel set defines a
//! command type whose fields are all optional: an absent field leaves the
//! corresponding state untouched, a present field overwrites it. Decoding
//! never fails loudly; a line that does not parse is simply no command.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::command::decode;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct SetTemp {
//!     temperature: Option<f32>,
//!     channel: Option<u8>,
//! }
//!
//! let cmd: SetTemp = decode(r#"{"temperature": 31.5}"#).unwrap();
//! assert_eq!(cmd.temperature, Some(31.5));
//! assert_eq!(cmd.channel, None);
//!
//! assert!(decode::<SetTemp>("not json").is_none());
//! ```

use heapless::String as HString;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Maximum accepted command line length.
pub const COMMAND_LINE_CAPACITY: usize = 256;

/// Decode one command line.
///
/// Returns `None` for blank lines, malformed JSON and type mismatches.
pub fn decode<T: DeserializeOwned>(line: &str) -> Option<T> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json_core::from_str::<T>(line) {
        Ok((cmd, _)) => Some(cmd),
        Err(e) => {
            log::debug!("ignoring command line ({:?}): {}", e, line);
            None
        }
    }
}

/// Which channels of a multi-channel set a command addresses.
///
/// On the wire this is the optional integer `channel` field: absent or `0`
/// means every channel, `n` means channel `n` (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ChannelSelector {
    /// Every channel.
    #[default]
    All,
    /// One channel, 1-based.
    One(u8),
}

impl ChannelSelector {
    /// Selector from the raw `channel` field.
    pub fn from_field(channel: Option<u8>) -> Self {
        match channel {
            None | Some(0) => ChannelSelector::All,
            Some(n) => ChannelSelector::One(n),
        }
    }

    /// Whether the channel at zero-based `index` is addressed.
    #[inline]
    pub fn matches(&self, index: usize) -> bool {
        match self {
            ChannelSelector::All => true,
            ChannelSelector::One(n) => *n as usize == index + 1,
        }
    }
}

/// Commands understood by the dispatch loop itself.
///
/// `{"command": "set_cadence", "ms": 500}` changes the status report
/// cadence. The verb is also accepted under `cmd`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoopCommand {
    /// Command verb.
    pub command: Option<HString<16>>,
    /// Command verb, short key.
    pub cmd: Option<HString<16>>,
    /// New status cadence in milliseconds.
    pub ms: Option<u32>,
}

impl LoopCommand {
    /// The command verb; `command` wins over `cmd`.
    pub fn verb(&self) -> Option<&str> {
        self.command.as_deref().or(self.cmd.as_deref())
    }

    /// The requested status cadence, if this is a `set_cadence` command.
    pub fn cadence_ms(&self) -> Option<u32> {
        match self.verb() {
            Some("set_cadence") => self.ms,
            _ => None,
        }
    }
}

/// Assembles polled serial bytes into command lines.
///
/// `\r` and `\n` both terminate a line; empty lines are dropped. A line
/// longer than `N` bytes is discarded up to its terminator.
///
/// # Example
///
/// ```rust
/// use pico_instrument::command::LineBuffer;
///
/// let mut buf = LineBuffer::<16>::new();
/// let mut lines = Vec::new();
/// for &b in b"{\"a\":1}\r\n" {
///     if let Some(line) = buf.push(b) {
///         lines.push(line.to_string());
///     }
/// }
/// assert_eq!(lines, ["{\"a\":1}"]);
/// ```
#[derive(Debug, Default)]
pub struct LineBuffer<const N: usize> {
    buf: HString<N>,
    overflowed: bool,
    complete: bool,
}

impl<const N: usize> LineBuffer<N> {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: HString::new(),
            overflowed: false,
            complete: false,
        }
    }

    /// Feed one byte; returns the completed line when `byte` terminates one.
    ///
    /// The returned slice is valid until the next call.
    pub fn push(&mut self, byte: u8) -> Option<&str> {
        if self.complete {
            self.buf.clear();
            self.complete = false;
        }

        if byte == b'\r' || byte == b'\n' {
            let dropped = core::mem::replace(&mut self.overflowed, false);
            if dropped {
                log::debug!("discarding over-long command line");
                self.buf.clear();
                return None;
            }
            if self.buf.is_empty() {
                return None;
            }
            self.complete = true;
            return Some(self.buf.as_str());
        }

        if self.overflowed {
            return None;
        }
        // Buffer must stay valid UTF-8.
        let ch = if byte.is_ascii() { byte as char } else { '?' };
        if self.buf.push(ch).is_err() {
            self.overflowed = true;
            self.buf.clear();
        }
        None
    }

    /// Bytes buffered for the line in progress.
    pub fn pending(&self) -> usize {
        if self.complete {
            0
        } else {
            self.buf.len()
        }
    }
}
