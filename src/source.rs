//! Byte sources consumed by `EndianReader`.

use std::io::{self, Read, Seek, SeekFrom};

/// A readable stream of bytes.
///
/// This is the small part of a stream that the reader needs. Only [`read`](Self::read) is
/// required; the other methods describe optional capabilities.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes, blocking until at least one is available. Returns 0 at the
    /// end of the stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Returns `false` if the source cannot be read at all.
    fn can_read(&self) -> bool {
        true
    }

    /// Returns `true` if [`position`](Self::position) and
    /// [`set_position`](Self::set_position) are supported.
    fn can_seek(&self) -> bool {
        false
    }

    /// The current read position.
    fn position(&mut self) -> io::Result<u64> {
        Err(unsupported())
    }

    /// Moves the read position.
    fn set_position(&mut self, _pos: u64) -> io::Result<()> {
        Err(unsupported())
    }

    /// Returns `true` if all of the data is already in memory. This is only a hint.
    fn is_memory(&self) -> bool {
        false
    }

    /// Releases the source. Reads after `close` may fail.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn unsupported() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "the byte source does not support seeking")
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "the byte source has been closed")
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_seek(&self) -> bool {
        (**self).can_seek()
    }

    fn position(&mut self) -> io::Result<u64> {
        (**self).position()
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        (**self).set_position(pos)
    }

    fn is_memory(&self) -> bool {
        (**self).is_memory()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn can_read(&self) -> bool {
        (**self).can_read()
    }

    fn can_seek(&self) -> bool {
        (**self).can_seek()
    }

    fn position(&mut self) -> io::Result<u64> {
        (**self).position()
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        (**self).set_position(pos)
    }

    fn is_memory(&self) -> bool {
        (**self).is_memory()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// A forward-only source over any `Read`.
///
/// `close` drops the inner reader, which closes files and sockets.
#[derive(Debug)]
pub struct ReadSource<R> {
    inner: Option<R>,
}

impl<R: Read> ReadSource<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    /// Returns the inner reader, or `None` if the source has been closed.
    pub fn into_inner(self) -> Option<R> {
        self.inner
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<R: Read> ByteSource for ReadSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.as_mut().ok_or_else(closed)?.read(buf)
    }

    fn can_read(&self) -> bool {
        self.inner.is_some()
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

/// A seekable source over any `Read + Seek`.
///
/// `close` drops the inner reader.
#[derive(Debug)]
pub struct SeekSource<R> {
    inner: Option<R>,
}

impl<R: Read + Seek> SeekSource<R> {
    /// Wraps `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    /// Returns the inner reader, or `None` if the source has been closed.
    pub fn into_inner(self) -> Option<R> {
        self.inner
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl<R: Read + Seek> ByteSource for SeekSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.as_mut().ok_or_else(closed)?.read(buf)
    }

    fn can_read(&self) -> bool {
        self.inner.is_some()
    }

    fn can_seek(&self) -> bool {
        self.inner.is_some()
    }

    fn position(&mut self) -> io::Result<u64> {
        self.inner.as_mut().ok_or_else(closed)?.stream_position()
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        self.inner
            .as_mut()
            .ok_or_else(closed)?
            .seek(SeekFrom::Start(pos))
            .map(drop)
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner = None;
        Ok(())
    }
}

/// An in-memory, seekable source.
#[derive(Clone, Debug)]
pub struct MemorySource<T> {
    data: T,
    pos: usize,
    closed: bool,
}

impl<T: AsRef<[u8]>> MemorySource<T> {
    /// Reads from the start of `data`.
    pub fn new(data: T) -> Self {
        Self {
            data,
            pos: 0,
            closed: false,
        }
    }

    /// The bytes that have not been read yet.
    pub fn remaining(&self) -> &[u8] {
        let data = self.data.as_ref();
        &data[self.pos.min(data.len())..]
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the underlying data.
    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T: AsRef<[u8]>> ByteSource for MemorySource<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed());
        }
        let remaining = self.remaining();
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    fn can_read(&self) -> bool {
        !self.closed
    }

    fn can_seek(&self) -> bool {
        !self.closed
    }

    fn position(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn set_position(&mut self, pos: u64) -> io::Result<()> {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX);
        Ok(())
    }

    fn is_memory(&self) -> bool {
        true
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}
