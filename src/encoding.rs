//! Text encodings consumed by `EndianReader`.
//!
//! The reader does not know how to turn bytes into characters by itself. It asks an [`Encoding`]
//! for a [`Decoder`] and feeds it raw bytes, possibly one at a time. A decoder must therefore keep
//! any incomplete multi-byte sequence between calls and finish it when the next bytes arrive.
//!
//! [`Utf8`], [`Utf16`] and [`Latin1`] are provided. By default the Unicode encodings replace
//! malformed input with U+FFFD, the same way `String::from_utf8_lossy` does; the `strict()`
//! constructors report a [`DecodeError`] instead.

use core::char::REPLACEMENT_CHARACTER;

use zerocopy::byteorder::{BE, LE, U16};

use crate::Endian;

/// Error reported by a strict decoder.
#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum DecodeError {
    /// The input contained a byte sequence that is not valid in the encoding.
    #[error("invalid {encoding} byte sequence")]
    InvalidSequence {
        /// Name of the encoding that rejected the input.
        encoding: &'static str,
    },

    /// A UTF-16 surrogate code unit was not part of a valid surrogate pair.
    #[error("lone surrogate code unit 0x{0:04x}")]
    LoneSurrogate(u16),
}

/// Outcome of a call to [`Decoder::decode`].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Decoded {
    /// The number of input bytes the decoder took. Bytes that end in the middle of a character
    /// are counted here too; the decoder holds on to them until the character is complete.
    pub bytes_consumed: usize,
    /// The number of characters appended to the output.
    pub chars_produced: usize,
}

/// Stateful byte-to-character converter.
pub trait Decoder {
    /// Decodes `bytes`, appending every completed character to `out`.
    ///
    /// All of `bytes` is consumed. A trailing incomplete sequence is kept and completed by the
    /// bytes of the next call. If `flush` is set, nothing is kept: an incomplete sequence at the
    /// end of `bytes` is treated as malformed.
    fn decode(
        &mut self,
        bytes: &[u8],
        out: &mut Vec<char>,
        flush: bool,
    ) -> Result<Decoded, DecodeError>;

    /// Returns `true` if the decoder is holding part of a character.
    fn has_pending(&self) -> bool;

    /// Discards any partial character.
    fn reset(&mut self);
}

/// A character encoding that can create decoders.
pub trait Encoding {
    /// A short name, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Creates a decoder with no pending state.
    fn new_decoder(&self) -> Box<dyn Decoder + Send>;

    /// The largest number of bytes `char_count` characters can occupy.
    fn max_byte_count(&self, char_count: usize) -> usize;

    /// The largest number of characters a decoder can produce from `byte_count` bytes, including
    /// the character that completes or replaces a sequence left pending by an earlier call.
    fn max_char_count(&self, byte_count: usize) -> usize;

    /// Returns `true` if every code unit is exactly two bytes wide. The reader uses this to read
    /// whole code units at once instead of single bytes.
    fn two_byte_units(&self) -> bool {
        false
    }
}

/// UTF-8.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Utf8 {
    strict: bool,
}

impl Utf8 {
    /// UTF-8 that replaces malformed sequences with U+FFFD.
    pub const fn new() -> Self {
        Self { strict: false }
    }

    /// UTF-8 that fails on malformed sequences.
    pub const fn strict() -> Self {
        Self { strict: true }
    }
}

impl Encoding for Utf8 {
    fn name(&self) -> &'static str {
        "utf-8"
    }

    fn new_decoder(&self) -> Box<dyn Decoder + Send> {
        Box::new(Utf8Decoder {
            strict: self.strict,
            buf: [0; 4],
            len: 0,
            need: 0,
        })
    }

    fn max_byte_count(&self, char_count: usize) -> usize {
        char_count.saturating_mul(4)
    }

    fn max_char_count(&self, byte_count: usize) -> usize {
        byte_count.saturating_add(1)
    }
}

struct Utf8Decoder {
    strict: bool,
    /// Bytes of the character being assembled.
    buf: [u8; 4],
    len: usize,
    /// Total length of the character being assembled, taken from its lead byte.
    need: usize,
}

impl Utf8Decoder {
    fn malformed(&mut self, out: &mut Vec<char>) -> Result<(), DecodeError> {
        self.reset();
        if self.strict {
            return Err(DecodeError::InvalidSequence { encoding: "utf-8" });
        }
        out.push(REPLACEMENT_CHARACTER);
        Ok(())
    }
}

impl Decoder for Utf8Decoder {
    fn decode(
        &mut self,
        bytes: &[u8],
        out: &mut Vec<char>,
        flush: bool,
    ) -> Result<Decoded, DecodeError> {
        let start = out.len();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];

            if self.len == 0 {
                i += 1;
                self.need = match b {
                    0x00..=0x7f => {
                        out.push(char::from(b));
                        continue;
                    }
                    0xc2..=0xdf => 2,
                    0xe0..=0xef => 3,
                    0xf0..=0xf4 => 4,
                    _ => {
                        self.malformed(out)?;
                        continue;
                    }
                };
                self.buf[0] = b;
                self.len = 1;
                continue;
            }

            if b & 0xc0 != 0x80 {
                // The pending sequence was cut short. Replace it, then look at `b` again as the
                // start of a new character.
                self.malformed(out)?;
                continue;
            }

            i += 1;
            self.buf[self.len] = b;
            self.len += 1;
            if self.len == self.need {
                match core::str::from_utf8(&self.buf[..self.len]) {
                    Ok(s) => {
                        out.extend(s.chars());
                        self.len = 0;
                    }
                    Err(_) => self.malformed(out)?,
                }
            }
        }

        if flush && self.len != 0 {
            self.malformed(out)?;
        }

        Ok(Decoded {
            bytes_consumed: bytes.len(),
            chars_produced: out.len() - start,
        })
    }

    fn has_pending(&self) -> bool {
        self.len != 0
    }

    fn reset(&mut self) {
        self.len = 0;
        self.need = 0;
    }
}

/// UTF-16, in either byte order.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Utf16 {
    endian: Endian,
    strict: bool,
}

impl Utf16 {
    /// UTF-16 in the given byte order, replacing lone surrogates with U+FFFD.
    pub const fn new(endian: Endian) -> Self {
        Self {
            endian,
            strict: false,
        }
    }

    /// UTF-16 in the given byte order, failing on lone surrogates.
    pub const fn strict(endian: Endian) -> Self {
        Self {
            endian,
            strict: true,
        }
    }

    /// Little-endian UTF-16, the encoding .NET calls `Unicode`.
    pub const fn le() -> Self {
        Self::new(Endian::Little)
    }

    /// Big-endian UTF-16.
    pub const fn be() -> Self {
        Self::new(Endian::Big)
    }
}

impl Encoding for Utf16 {
    fn name(&self) -> &'static str {
        match self.endian {
            Endian::Little => "utf-16le",
            Endian::Big => "utf-16be",
        }
    }

    fn new_decoder(&self) -> Box<dyn Decoder + Send> {
        Box::new(Utf16Decoder {
            endian: self.endian,
            strict: self.strict,
            odd_byte: None,
            high: None,
        })
    }

    fn max_byte_count(&self, char_count: usize) -> usize {
        char_count.saturating_mul(4)
    }

    fn max_char_count(&self, byte_count: usize) -> usize {
        (byte_count / 2).saturating_add(2)
    }

    fn two_byte_units(&self) -> bool {
        true
    }
}

struct Utf16Decoder {
    endian: Endian,
    strict: bool,
    /// First byte of a code unit whose second byte has not arrived yet.
    odd_byte: Option<u8>,
    /// High surrogate waiting for its low half.
    high: Option<u16>,
}

impl Utf16Decoder {
    fn unit(&self, pair: [u8; 2]) -> u16 {
        match self.endian {
            Endian::Little => U16::<LE>::from_bytes(pair).get(),
            Endian::Big => U16::<BE>::from_bytes(pair).get(),
        }
    }

    fn lone(&mut self, unit: u16, out: &mut Vec<char>) -> Result<(), DecodeError> {
        if self.strict {
            self.reset();
            return Err(DecodeError::LoneSurrogate(unit));
        }
        out.push(REPLACEMENT_CHARACTER);
        Ok(())
    }

    fn push_unit(&mut self, unit: u16, out: &mut Vec<char>) -> Result<(), DecodeError> {
        if let Some(high) = self.high.take() {
            if (0xdc00..=0xdfff).contains(&unit) {
                let c = 0x10000 + ((u32::from(high) - 0xd800) << 10) + (u32::from(unit) - 0xdc00);
                out.push(char::from_u32(c).unwrap_or(REPLACEMENT_CHARACTER));
                return Ok(());
            }
            self.lone(high, out)?;
        }

        match unit {
            0xd800..=0xdbff => self.high = Some(unit),
            0xdc00..=0xdfff => self.lone(unit, out)?,
            _ => out.push(char::from_u32(u32::from(unit)).unwrap_or(REPLACEMENT_CHARACTER)),
        }
        Ok(())
    }
}

impl Decoder for Utf16Decoder {
    fn decode(
        &mut self,
        mut bytes: &[u8],
        out: &mut Vec<char>,
        flush: bool,
    ) -> Result<Decoded, DecodeError> {
        let start = out.len();
        let bytes_consumed = bytes.len();

        if let Some(first) = self.odd_byte {
            if let Some((&second, rest)) = bytes.split_first() {
                self.odd_byte = None;
                let unit = self.unit([first, second]);
                self.push_unit(unit, out)?;
                bytes = rest;
            }
        }

        let mut pairs = bytes.chunks_exact(2);
        for pair in &mut pairs {
            let unit = self.unit([pair[0], pair[1]]);
            self.push_unit(unit, out)?;
        }
        if let [last] = pairs.remainder() {
            self.odd_byte = Some(*last);
        }

        if flush {
            if let Some(high) = self.high.take() {
                self.lone(high, out)?;
            }
            if self.odd_byte.take().is_some() {
                if self.strict {
                    self.reset();
                    return Err(DecodeError::InvalidSequence {
                        encoding: "utf-16",
                    });
                }
                out.push(REPLACEMENT_CHARACTER);
            }
        }

        Ok(Decoded {
            bytes_consumed,
            chars_produced: out.len() - start,
        })
    }

    fn has_pending(&self) -> bool {
        self.odd_byte.is_some() || self.high.is_some()
    }

    fn reset(&mut self) {
        self.odd_byte = None;
        self.high = None;
    }
}

/// ISO-8859-1: every byte is the code point of the same value.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Latin1;

impl Encoding for Latin1 {
    fn name(&self) -> &'static str {
        "iso-8859-1"
    }

    fn new_decoder(&self) -> Box<dyn Decoder + Send> {
        Box::new(Latin1)
    }

    fn max_byte_count(&self, char_count: usize) -> usize {
        char_count
    }

    fn max_char_count(&self, byte_count: usize) -> usize {
        byte_count
    }
}

impl Decoder for Latin1 {
    fn decode(
        &mut self,
        bytes: &[u8],
        out: &mut Vec<char>,
        _flush: bool,
    ) -> Result<Decoded, DecodeError> {
        out.extend(bytes.iter().map(|&b| char::from(b)));
        Ok(Decoded {
            bytes_consumed: bytes.len(),
            chars_produced: bytes.len(),
        })
    }

    fn has_pending(&self) -> bool {
        false
    }

    fn reset(&mut self) {}
}
