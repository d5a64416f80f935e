use std::io;

use crate::encoding::DecodeError;

/// Result type for `EndianReader`
pub type Result<T> = core::result::Result<T, ReaderError>;

/// Error type for `EndianReader`
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    /// A `read_*` method needed more bytes than the source had left.
    ///
    /// Fixed-width reads never return a partial value; they fail with this error instead. The
    /// bytes that were available have still been consumed from the source.
    #[error("unable to read beyond the end of the stream")]
    EndOfStream,

    /// A strict decoder produced an unpaired UTF-16 surrogate, which cannot be returned as a
    /// `char`.
    #[error("found a lone surrogate code unit 0x{0:04x}")]
    LoneSurrogate(u16),

    /// The byte source reported that it cannot be read.
    #[error("the byte source is not readable")]
    Unreadable,

    /// A 7-bit encoded integer did not terminate within its maximum length.
    #[error("too many bytes in what should have been a 7-bit encoded integer")]
    Bad7BitInt,

    /// A length-prefixed string declared a negative length.
    #[error("invalid string length {0}")]
    InvalidStringLength(i64),

    /// The flags word of a decimal had bits set outside the sign and scale fields, or a scale
    /// above 28.
    #[error("invalid decimal flags 0x{0:08x}")]
    InvalidDecimal(u32),

    /// The decoder rejected the input. Only strict decoders report this.
    #[error(transparent)]
    Decode(DecodeError),

    /// The reader was used after `dispose()`.
    #[error("cannot access a disposed reader")]
    Disposed,

    /// The byte source failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Broad classification of a `ReaderError`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ErrorKind {
    /// Fewer bytes were available than an exact-width read required.
    EndOfStream,
    /// The caller asked for something that cannot be satisfied.
    InvalidArgument,
    /// The input is malformed.
    FormatCorruption,
    /// The reader has been disposed.
    DisposedResource,
    /// The byte source failed.
    IoFailure,
}

impl From<DecodeError> for ReaderError {
    fn from(error: DecodeError) -> Self {
        match error {
            DecodeError::LoneSurrogate(unit) => Self::LoneSurrogate(unit),
            other => Self::Decode(other),
        }
    }
}

impl ReaderError {
    /// Returns the category this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EndOfStream => ErrorKind::EndOfStream,
            Self::LoneSurrogate(_) | Self::Unreadable => ErrorKind::InvalidArgument,
            Self::Bad7BitInt
            | Self::InvalidStringLength(_)
            | Self::InvalidDecimal(_)
            | Self::Decode(_) => ErrorKind::FormatCorruption,
            Self::Disposed => ErrorKind::DisposedResource,
            Self::Io(_) => ErrorKind::IoFailure,
        }
    }
}
