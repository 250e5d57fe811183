//! Binary-to-text byte codec for raw payloads inside status lines.
//!
//! Standard 64-symbol alphabet (`A-Z a-z 0-9 + /`) with `=` padding. Every
//! 3 input bytes become 4 output characters; a trailing partial group is
//! zero-padded and the missing output symbols replaced by `=`.
//!
//! # Example
//!
//! ```rust
//! use pico_instrument::codec;
//!
//! let text = codec::encode(b"hi!");
//! assert_eq!(text, "aGkh");
//! assert_eq!(codec::decode(&text).unwrap(), b"hi!");
//!
//! assert_eq!(codec::encode(&[0xff]), "/w==");
//! assert!(codec::decode("abc").is_err());
//! ```

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::DecodeError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const PAD: u8 = b'=';

/// Number of characters `encode` produces for `len` input bytes.
#[inline]
pub const fn encoded_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}

/// Encode bytes to text.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(bytes.len()));
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let group = (b0 << 16) | (b1 << 8) | b2;

        out.push(symbol(group >> 18));
        out.push(symbol(group >> 12));
        out.push(if chunk.len() > 1 { symbol(group >> 6) } else { '=' });
        out.push(if chunk.len() > 2 { symbol(group) } else { '=' });
    }
    out
}

/// Decode text produced by [`encode`].
///
/// # Errors
///
/// - [`DecodeError::InvalidLength`] if the length is not a multiple of 4
/// - [`DecodeError::InvalidCharacter`] for anything outside the alphabet
/// - [`DecodeError::InvalidPadding`] for `=` outside the last two positions
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let input = text.as_bytes();
    if input.len() % 4 != 0 {
        return Err(DecodeError::InvalidLength(input.len()));
    }

    let mut out = Vec::with_capacity(input.len() / 4 * 3);
    let groups = input.len() / 4;
    for (g, quad) in input.chunks_exact(4).enumerate() {
        let last = g + 1 == groups;
        let pads = quad.iter().rev().take_while(|&&c| c == PAD).count();
        if pads > 2 || (pads > 0 && !last) {
            return Err(DecodeError::InvalidPadding);
        }

        let mut group = 0u32;
        for (i, &c) in quad.iter().enumerate() {
            let value = if i >= 4 - pads {
                0
            } else {
                match sextet(c) {
                    Some(v) => v,
                    None if c == PAD => return Err(DecodeError::InvalidPadding),
                    None => {
                        return Err(DecodeError::InvalidCharacter {
                            offset: g * 4 + i,
                            byte: c,
                        })
                    }
                }
            };
            group = (group << 6) | value as u32;
        }

        out.push((group >> 16) as u8);
        if pads < 2 {
            out.push((group >> 8) as u8);
        }
        if pads < 1 {
            out.push(group as u8);
        }
    }
    Ok(out)
}

/// Encode a `u8` payload.
pub fn pack_u8(value: u8) -> String {
    encode(&[value])
}

/// Encode a `u16` as little-endian bytes.
pub fn pack_u16(value: u16) -> String {
    encode(&value.to_le_bytes())
}

/// Encode a `u32` as little-endian bytes.
pub fn pack_u32(value: u32) -> String {
    encode(&value.to_le_bytes())
}

/// Encode an `f32` as its little-endian IEEE-754 bytes.
pub fn pack_f32(value: f32) -> String {
    encode(&value.to_le_bytes())
}

#[inline]
fn symbol(bits: u32) -> char {
    ALPHABET[(bits & 0x3f) as usize] as char
}

#[inline]
fn sextet(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}
