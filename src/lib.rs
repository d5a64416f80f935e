//! Reads primitive values, characters and length-prefixed strings from a byte stream, using the
//! encoding rules of .NET's `System.IO.BinaryWriter` but with a caller-selected byte order.
//!
//! [`EndianReader`] sits on top of a [`ByteSource`] (anything that can hand out bytes) and an
//! [`Encoding`] (anything that can turn bytes into characters). Multi-byte numbers are read in the
//! byte order given at construction, which need not match the host's.
//!
//! ```
//! use endian_stream::{Endian, EndianReader, MemorySource};
//!
//! let data = [0x12, 0x34, 0x05, b'h', b'e', b'l', b'l', b'o'];
//! let mut r = EndianReader::with_endian(MemorySource::new(data), Endian::Big).unwrap();
//! assert_eq!(r.read_u16().unwrap(), 0x1234);
//! assert_eq!(r.read_string().unwrap(), "hello");
//! ```
//!
//! # References
//! * <https://learn.microsoft.com/en-us/dotnet/api/system.io.binaryreader?view=net-9.0>

#![forbid(unsafe_code)]
#![forbid(unused_must_use)]
#![warn(missing_docs)]

mod decimal;
mod endian;
pub mod encoding;
mod error;
mod reader;
mod source;


pub use decimal::{Decimal, MAX_SCALE};
pub use encoding::{DecodeError, Decoded, Decoder, Encoding, Latin1, Utf16, Utf8};
pub use endian::Endian;
pub use error::{ErrorKind, ReaderError, Result};
pub use reader::{EndianReader, ReaderOptions};
pub use source::{ByteSource, MemorySource, ReadSource, SeekSource};
