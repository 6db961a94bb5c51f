use alloc::string::String;
use std::io;

use thiserror::Error;

/// Errors raised by buffers, streams and codecs.
///
/// None of these are retried internally: they signal a programming error or
/// bad input data at the point of violation.
#[derive(Error, Debug)]
pub enum BufError {
    #[error("index out of range: {0}")]
    Index(i64),
    #[error("range {start}..={end} out of bounds for size {size}")]
    Range { start: i64, end: i64, size: usize },
    #[error("format error: {0}")]
    Format(#[from] FormatError),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("invalid argument: {0}")]
    Arg(String),
    #[error("fixed capacity of {capacity} bytes exceeded")]
    Capacity { capacity: usize },
    #[error("buffer is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[cfg(feature = "serde")]
    #[error("JSON object error: {0}")]
    Object(#[from] serde_json::Error),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid hex string")]
    InvalidHex,
    #[error("string too big: {0} encoded bytes")]
    StringTooBig(usize),
    #[error("malformed modified UTF-8 input")]
    MalformedUtf,
    #[error("invalid {0} encoding")]
    InvalidEncoding(&'static str),
    #[error("invalid name/value pair [line {0}]")]
    InvalidProps(usize),
    #[error("invalid decimal '{0}'")]
    InvalidDecimal(String),
}

pub type Result<T, E = BufError> = core::result::Result<T, E>;

impl BufError {
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        BufError::Unsupported(what.into())
    }

    pub(crate) fn eof() -> Self {
        BufError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "unexpected end of stream",
        ))
    }

    /// Whether this error is an index or range violation.
    #[must_use]
    pub fn is_index(&self) -> bool {
        matches!(self, BufError::Index(_) | BufError::Range { .. })
    }

    /// Whether this error reports an unexpected end of input.
    #[must_use]
    pub fn is_eof(&self) -> bool {
        matches!(self, BufError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}
