//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
    MissingTable(u32),
    CompressionError,
    /// The font uses a compression method this build was configured without.
    UnsupportedCompression,
    /// A decompressed table did not have the length declared in its directory entry.
    DecompressedLengthMismatch,
    NotImplemented,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl From<WriteError> for ParseError {
    fn from(_error: WriteError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ParseError::CompressionError => write!(f, "compression error"),
            ParseError::UnsupportedCompression => {
                write!(f, "compression method not supported by this build")
            }
            ParseError::DecompressedLengthMismatch => {
                write!(f, "decompressed table length does not match the declared length")
            }
            ParseError::NotImplemented => write!(f, "feature not implemented"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
    PlaceholderMismatch,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::PlaceholderMismatch => {
                write!(f, "data written to placeholder did not match expected size")
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Enum that can hold read (`ParseError`) and write errors
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ReadWriteError {
    Read(ParseError),
    Write(WriteError),
}

impl From<ParseError> for ReadWriteError {
    fn from(error: ParseError) -> Self {
        ReadWriteError::Read(error)
    }
}

impl From<WriteError> for ReadWriteError {
    fn from(error: WriteError) -> Self {
        ReadWriteError::Write(error)
    }
}

impl From<ReadEof> for ReadWriteError {
    fn from(error: ReadEof) -> Self {
        ReadWriteError::Read(ParseError::from(error))
    }
}

impl From<std::num::TryFromIntError> for ReadWriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ReadWriteError::Write(WriteError::BadValue)
    }
}

impl From<ReadWriteError> for ParseError {
    fn from(error: ReadWriteError) -> Self {
        match error {
            ReadWriteError::Read(err) => err,
            ReadWriteError::Write(err) => ParseError::from(err),
        }
    }
}

impl fmt::Display for ReadWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadWriteError::Read(err) => write!(f, "read error: {}", err),
            ReadWriteError::Write(err) => write!(f, "write error: {}", err),
        }
    }
}

impl std::error::Error for ReadWriteError {}

/// Errors raised while resolving a glyph outline to a Unicode value by shape
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum MatchError {
    /// The glyph text did not contain any parseable points.
    InvalidGlyphInput,
    /// No reference glyph has the same number of points as the query.
    NoCandidates,
    /// Candidates existed but none passed the extents filter.
    NoMatch,
    /// The background search thread terminated without producing a result.
    WorkerFailed,
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::InvalidGlyphInput => write!(f, "invalid glyph input"),
            MatchError::NoCandidates => write!(f, "no reference glyph with matching point count"),
            MatchError::NoMatch => write!(f, "no reference glyph matched"),
            MatchError::WorkerFailed => write!(f, "glyph match worker failed"),
        }
    }
}

impl std::error::Error for MatchError {}
