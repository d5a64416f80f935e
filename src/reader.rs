use std::collections::VecDeque;
use std::io;

use crate::encoding::{Decoder, Encoding, Utf8};
use crate::{ByteSource, Decimal, Endian, ReaderError, Result};

/// Scratch buffers are never smaller than this, whatever the encoding.
const MIN_SCRATCH_LEN: usize = 16;

/// The most raw bytes handed to the decoder at once by string and bulk character reads.
const CHUNK_LEN: usize = 128;

/// Byte buffers grow in steps of this size instead of trusting a caller's count up front.
const STREAM_STEP: usize = 64 * 1024;

/// The step for sources that report [`ByteSource::is_memory`].
const MEMORY_STEP: usize = 1024 * 1024;

/// Options for `EndianReader::with_options`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct ReaderOptions {
    /// The byte order of multi-byte numbers. Defaults to the native order.
    pub endian: Endian,
    /// If `true`, disposing the reader does not call [`ByteSource::close`].
    pub leave_open: bool,
}

impl ReaderOptions {
    /// Native byte order; the source is closed on dispose.
    pub const fn new() -> Self {
        Self {
            endian: Endian::native(),
            leave_open: false,
        }
    }

    /// Sets the byte order.
    pub const fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Sets whether the source stays open after the reader is disposed.
    pub const fn leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }
}

/// Reads values from a [`ByteSource`], decoding multi-byte numbers in a fixed byte order.
///
/// The format matches .NET's `System.IO.BinaryWriter`, except that the byte order of numbers is
/// chosen by the caller instead of always being little-endian:
///
/// * Integers and floats are stored as their in-memory bytes, in the reader's byte order.
/// * A [`Decimal`] is four 32-bit words (`lo, mid, hi, flags`), each in the reader's byte order.
/// * Strings are a 7-bit encoded byte length followed by that many bytes of encoded text.
/// * Characters are decoded by the reader's [`Encoding`], UTF-8 unless chosen otherwise.
///
/// Fixed-width reads either return a whole value or fail with [`ReaderError::EndOfStream`].
/// [`read_bytes`](Self::read_bytes) and [`read_chars`](Self::read_chars) are best-effort and
/// return short results at the end of the stream instead.
///
/// The reader is either open or disposed. [`dispose`](Self::dispose) (or dropping the reader)
/// releases the buffers and, unless the reader was created with `leave_open`, closes the source.
/// Every read after that fails with [`ReaderError::Disposed`]. To keep a source alive beyond the
/// reader, pass `&mut source` and set `leave_open`, or take it back with
/// [`into_inner`](Self::into_inner).
pub struct EndianReader<S: ByteSource> {
    endian: Endian,
    leave_open: bool,
    encoding: &'static str,
    /// `None` once disposed.
    state: Option<ReaderState<S>>,
}

struct ReaderState<S> {
    source: S,
    /// Raw bytes for single-character reads. At least one character wide.
    scratch: Box<[u8]>,
    /// Raw bytes for string and bulk character reads.
    chunk: Box<[u8]>,
    decoder: Box<dyn Decoder + Send>,
    /// Decoder output, reused across calls.
    chars: Vec<char>,
    /// Characters the decoder produced beyond what a read asked for. Served first by the next
    /// character read, and discarded by the next byte read.
    ahead: VecDeque<char>,
    two_byte_units: bool,
}

/// Reads until `buf` is full or the source reports the end of the stream.
fn fill<S: ByteSource + ?Sized>(source: &mut S, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl<S: ByteSource> ReaderState<S> {
    /// The source, for reads that bypass the decoder. Decoded-ahead characters are dropped so that
    /// a later character read cannot return text from before these bytes.
    fn byte_source(&mut self) -> &mut S {
        if !self.ahead.is_empty() {
            tracing::trace!(dropped = self.ahead.len(), "discarding decoded-ahead characters");
            self.ahead.clear();
        }
        &mut self.source
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        if fill(self.byte_source(), &mut bytes)? < N {
            return Err(ReaderError::EndOfStream);
        }
        Ok(bytes)
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let source = self.byte_source();
        let step = if source.is_memory() {
            MEMORY_STEP
        } else {
            STREAM_STEP
        };
        let mut out = Vec::with_capacity(count.min(step));
        while out.len() < count {
            let len = out.len();
            let want = (count - len).min(step);
            out.resize(len + want, 0);
            let n = fill(source, &mut out[len..])?;
            out.truncate(len + n);
            if n < want {
                break;
            }
        }
        Ok(out)
    }

    /// Decodes one character, reading one code unit at a time. Returns `None` at the end of the
    /// stream, unless it falls inside a character.
    fn read_one_char(&mut self) -> Result<Option<char>> {
        if let Some(c) = self.ahead.pop_front() {
            return Ok(Some(c));
        }

        let unit = if self.two_byte_units { 2 } else { 1 };
        loop {
            let n = fill(&mut self.source, &mut self.scratch[..unit])?;
            if n == 0 {
                if self.decoder.has_pending() {
                    return Err(ReaderError::EndOfStream);
                }
                return Ok(None);
            }

            self.chars.clear();
            self.decoder.decode(&self.scratch[..n], &mut self.chars, false)?;
            let mut produced = self.chars.drain(..);
            if let Some(c) = produced.next() {
                self.ahead.extend(produced);
                return Ok(Some(c));
            }
        }
    }

    fn read_chars_into(&mut self, buf: &mut [char]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            if let Some(c) = self.ahead.pop_front() {
                buf[filled] = c;
                filled += 1;
                continue;
            }

            let remaining = buf.len() - filled;
            let want = if self.two_byte_units {
                remaining.saturating_mul(2)
            } else {
                remaining
            };
            let want = want.min(self.chunk.len());
            let n = self.source.read(&mut self.chunk[..want])?;
            if n == 0 {
                break;
            }

            self.chars.clear();
            self.decoder.decode(&self.chunk[..n], &mut self.chars, false)?;
            let take = self.chars.len().min(remaining);
            buf[filled..filled + take].copy_from_slice(&self.chars[..take]);
            self.ahead.extend(self.chars.drain(take..));
            filled += take;
        }
        Ok(filled)
    }

    /// Decodes exactly `len` bytes of text.
    fn read_text(&mut self, len: usize) -> Result<String> {
        let mut text = String::with_capacity(len.min(STREAM_STEP));
        let mut remaining = len;
        self.ahead.clear();
        self.chars.clear();
        while remaining > 0 {
            let want = remaining.min(self.chunk.len());
            let n = self.source.read(&mut self.chunk[..want])?;
            if n == 0 {
                return Err(ReaderError::EndOfStream);
            }
            remaining -= n;

            // The last chunk is flushed so that a truncated character cannot leak into the next
            // read.
            self.decoder.decode(&self.chunk[..n], &mut self.chars, remaining == 0)?;
            text.extend(self.chars.drain(..));
        }
        Ok(text)
    }
}

macro_rules! read_numeric {
    ($($(#[$attr:meta])* $name:ident -> $t:ty;)*) => {$(
        $(#[$attr])*
        #[inline]
        pub fn $name(&mut self) -> Result<$t> {
            let bytes = self.read_array()?;
            Ok(<$t>::from_ne_bytes(self.endian.to_native(bytes)))
        }
    )*}
}

impl<S: ByteSource> EndianReader<S> {
    /// Creates a reader that decodes UTF-8 text and native-endian numbers, and closes `source` when
    /// disposed.
    pub fn new(source: S) -> Result<Self> {
        Self::with_options(source, Utf8::new(), ReaderOptions::new())
    }

    /// Creates a UTF-8 reader with the given byte order.
    pub fn with_endian(source: S, endian: Endian) -> Result<Self> {
        Self::with_options(source, Utf8::new(), ReaderOptions::new().endian(endian))
    }

    /// Creates a native-endian reader with the given text encoding.
    pub fn with_encoding<E: Encoding>(source: S, encoding: E) -> Result<Self> {
        Self::with_options(source, encoding, ReaderOptions::new())
    }

    /// Creates a reader.
    ///
    /// Fails with [`ReaderError::Unreadable`] if `source.can_read()` is `false`.
    pub fn with_options<E: Encoding>(
        source: S,
        encoding: E,
        options: ReaderOptions,
    ) -> Result<Self> {
        if !source.can_read() {
            return Err(ReaderError::Unreadable);
        }

        let scratch_len = encoding.max_byte_count(1).max(MIN_SCRATCH_LEN);
        let chunk_len = CHUNK_LEN.max(scratch_len);
        tracing::trace!(
            encoding = encoding.name(),
            endian = ?options.endian,
            leave_open = options.leave_open,
            "created reader"
        );

        Ok(Self {
            endian: options.endian,
            leave_open: options.leave_open,
            encoding: encoding.name(),
            state: Some(ReaderState {
                source,
                scratch: vec![0; scratch_len].into_boxed_slice(),
                chunk: vec![0; chunk_len].into_boxed_slice(),
                decoder: encoding.new_decoder(),
                chars: Vec::with_capacity(encoding.max_char_count(chunk_len)),
                ahead: VecDeque::new(),
                two_byte_units: encoding.two_byte_units(),
            }),
        })
    }

    fn state(&mut self) -> Result<&mut ReaderState<S>> {
        self.state.as_mut().ok_or(ReaderError::Disposed)
    }

    /// The byte order used for multi-byte numbers.
    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Returns `true` if disposing the reader leaves the source open.
    pub fn leave_open(&self) -> bool {
        self.leave_open
    }

    /// The name of the text encoding.
    pub fn encoding(&self) -> &'static str {
        self.encoding
    }

    /// Returns `true` once the reader has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.state.is_none()
    }

    /// Accesses the source.
    pub fn get_ref(&self) -> Result<&S> {
        self.state
            .as_ref()
            .map(|state| &state.source)
            .ok_or(ReaderError::Disposed)
    }

    /// Accesses the source mutably. Bytes read from it directly are not seen by the reader, so a
    /// character read that follows may return characters the reader had already decoded ahead.
    pub fn get_mut(&mut self) -> Result<&mut S> {
        Ok(&mut self.state()?.source)
    }

    /// Disposes the reader and returns the source without closing it.
    pub fn into_inner(mut self) -> Result<S> {
        let state = self.state.take().ok_or(ReaderError::Disposed)?;
        tracing::trace!(encoding = self.encoding, "released byte source");
        Ok(state.source)
    }

    /// Releases the reader's buffers and decoder, and closes the source unless the reader was
    /// created with `leave_open`.
    ///
    /// Calling this again does nothing. If closing the source fails, the error is returned but the
    /// reader is disposed all the same.
    pub fn dispose(&mut self) -> Result<()> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        tracing::trace!(encoding = self.encoding, "disposing reader");
        if !self.leave_open {
            tracing::debug!("closing byte source");
            state.source.close()?;
        }
        Ok(())
    }

    /// Reads a small array of bytes, with a constant length.
    #[inline(always)]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.state()?.read_array()
    }

    /// Reads up to `count` bytes. The result is shorter than `count` only if the stream ended.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.state()?.read_bytes(count)
    }

    /// Reads bytes until `buf` is full or the stream ends, and returns how many were read.
    pub fn read_bytes_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(fill(self.state()?.byte_source(), buf)?)
    }

    /// Reads a single `u8` value.
    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8> {
        let [b] = self.read_array()?;
        Ok(b)
    }

    /// Reads a single `i8` value.
    #[inline(always)]
    pub fn read_i8(&mut self) -> Result<i8> {
        let [b] = self.read_array()?;
        Ok(b as i8)
    }

    /// Reads a one-byte boolean. Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_numeric! {
        /// Reads a `u16` in the reader's byte order.
        read_u16 -> u16;
        /// Reads a `u32` in the reader's byte order.
        read_u32 -> u32;
        /// Reads a `u64` in the reader's byte order.
        read_u64 -> u64;
        /// Reads a `u128` in the reader's byte order.
        read_u128 -> u128;
        /// Reads an `i16` in the reader's byte order.
        read_i16 -> i16;
        /// Reads an `i32` in the reader's byte order.
        read_i32 -> i32;
        /// Reads an `i64` in the reader's byte order.
        read_i64 -> i64;
        /// Reads an `i128` in the reader's byte order.
        read_i128 -> i128;
        /// Reads an IEEE 754 single-precision float in the reader's byte order.
        read_f32 -> f32;
        /// Reads an IEEE 754 double-precision float in the reader's byte order.
        read_f64 -> f64;
    }

    /// Reads a 16-byte [`Decimal`].
    ///
    /// The four 32-bit words `lo, mid, hi, flags` are each decoded in the reader's byte order.
    /// Fails with [`ReaderError::InvalidDecimal`] if the flags word is malformed.
    pub fn read_decimal(&mut self) -> Result<Decimal> {
        let bytes: [u8; 16] = self.read_array()?;
        let mut words = [0u32; 4];
        for (word, b) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_ne_bytes(self.endian.to_native([b[0], b[1], b[2], b[3]]));
        }
        let [lo, mid, hi, flags] = words;
        Decimal::from_parts(lo, mid, hi, flags)
    }

    /// Reads a variable-length integer and returns the value in `i32`.
    ///
    /// Values are stored 7 bits per byte, least-significant group first, with the high bit of
    /// each byte set if another byte follows. At most 5 bytes are read; a fifth byte with its
    /// high bit set fails with [`ReaderError::Bad7BitInt`].
    pub fn read_7bit_encoded_i32(&mut self) -> Result<i32> {
        // Because 32 is not evenly divisible by 7, the last byte has some meaningless bits in
        // them. They are ignored, as the writer side never sets them.

        const MORE: u8 = 0x80;

        let mut shift: u32 = 0;
        let mut n: u32 = 0;

        loop {
            let b = self.read_u8()?;
            n |= ((b & 0x7f) as u32) << shift;

            if (b & MORE) == 0 {
                break;
            }

            shift += 7;
            if shift >= 32 {
                return Err(ReaderError::Bad7BitInt);
            }
        }

        Ok(n as i32)
    }

    /// Reads a variable-length integer and returns the value in `i64`. At most 10 bytes are read.
    pub fn read_7bit_encoded_i64(&mut self) -> Result<i64> {
        const MORE: u8 = 0x80;

        let mut shift: u32 = 0;
        let mut n: u64 = 0;

        loop {
            let b = self.read_u8()?;
            n |= ((b & 0x7f) as u64) << shift;

            if (b & MORE) == 0 {
                break;
            }

            shift += 7;
            if shift >= 64 {
                return Err(ReaderError::Bad7BitInt);
            }
        }

        Ok(n as i64)
    }

    fn read_length(&mut self) -> Result<usize> {
        let len = self.read_7bit_encoded_i32()?;
        usize::try_from(len).map_err(|_| ReaderError::InvalidStringLength(len.into()))
    }

    /// Reads a length-prefixed string.
    ///
    /// The prefix is a 7-bit encoded byte count (not a character count). The bytes that follow
    /// are decoded with the reader's encoding, at most 128 at a time. Fails with
    /// [`ReaderError::EndOfStream`] if the stream holds fewer bytes than declared.
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_length()?;
        if len == 0 {
            return Ok(String::new());
        }
        self.state()?.read_text(len)
    }

    /// Reads a length-prefixed byte string without decoding it.
    pub fn read_prefixed_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_length()?;
        let bytes = self.read_bytes(len)?;
        if bytes.len() < len {
            return Err(ReaderError::EndOfStream);
        }
        Ok(bytes)
    }

    /// Reads a length-prefixed byte string and returns it as `bstr::BString`.
    ///
    /// The caller must handle validating that the string is well-formed, if necessary.
    #[cfg(feature = "bstr")]
    pub fn read_bstring(&mut self) -> Result<bstr::BString> {
        Ok(bstr::BString::from(self.read_prefixed_bytes()?))
    }

    /// Reads one character.
    ///
    /// Fails with [`ReaderError::EndOfStream`] if the stream ends before or inside the
    /// character.
    ///
    /// A `char` cannot hold an unpaired UTF-16 surrogate. The default decoders return U+FFFD for
    /// one, so this only fails with [`ReaderError::LoneSurrogate`] under [`Utf16::strict`].
    ///
    /// [`Utf16::strict`]: crate::Utf16::strict
    pub fn read_char(&mut self) -> Result<char> {
        self.state()?.read_one_char()?.ok_or(ReaderError::EndOfStream)
    }

    /// Reads one character, or returns `None` if the stream has ended cleanly.
    pub fn read_next_char(&mut self) -> Result<Option<char>> {
        self.state()?.read_one_char()
    }

    /// Returns the next character without consuming it, or `None` if the stream has ended.
    ///
    /// This needs a seekable source: the position is saved, a character is decoded, and the
    /// position is restored. If the source cannot seek, this returns `None`. A stream that ends
    /// inside a character also gives `None`; [`read_char`](Self::read_char) reports that case as
    /// [`ReaderError::EndOfStream`].
    pub fn peek_char(&mut self) -> Result<Option<char>> {
        let state = self.state()?;
        if let Some(&c) = state.ahead.front() {
            return Ok(Some(c));
        }
        if !state.source.can_seek() {
            return Ok(None);
        }

        if state.decoder.has_pending() {
            // The first bytes of the character were consumed by an earlier read and cannot be
            // rewound. Decode it for real and keep it for the next read.
            let c = match state.read_one_char() {
                Err(ReaderError::EndOfStream) => return Ok(None),
                c => c?,
            };
            if let Some(c) = c {
                state.ahead.push_front(c);
            }
            return Ok(c);
        }

        let origin = state.source.position()?;
        let c = state.read_one_char();
        let restored = state.source.set_position(origin);
        state.decoder.reset();
        state.ahead.clear();
        let c = match c {
            Err(ReaderError::EndOfStream) => None,
            c => c?,
        };
        restored?;
        Ok(c)
    }

    /// Reads up to `count` characters. The result is shorter only if the stream ended.
    pub fn read_chars(&mut self, count: usize) -> Result<Vec<char>> {
        let state = self.state()?;
        let mut out = Vec::with_capacity(count.min(CHUNK_LEN));
        let mut buf = ['\0'; CHUNK_LEN];
        while out.len() < count {
            let want = (count - out.len()).min(CHUNK_LEN);
            let n = state.read_chars_into(&mut buf[..want])?;
            out.extend_from_slice(&buf[..n]);
            if n < want {
                break;
            }
        }
        Ok(out)
    }

    /// Reads characters until `buf` is full or the stream ends, and returns how many were read.
    pub fn read_chars_into(&mut self, buf: &mut [char]) -> Result<usize> {
        self.state()?.read_chars_into(buf)
    }
}

impl<S: ByteSource> Drop for EndianReader<S> {
    fn drop(&mut self) {
        if let Err(error) = self.dispose() {
            tracing::warn!(%error, "failed to close byte source");
        }
    }
}
