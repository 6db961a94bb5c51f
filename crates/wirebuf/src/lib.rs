//! Positioned byte buffers with a layered binary/text encoding writer and
//! reader.
//!
//! A [`PositionedBuffer`] keeps a cursor over bytes held by one of three
//! backends: growable memory ([`MemBuf`]), a random-access file
//! ([`FileBuf`]) or a fixed caller-owned region ([`RegionBuf`]). Its
//! [`out`](PositionedBuffer::out) and [`input`](PositionedBuffer::input)
//! streams encode big-endian integers, IEEE floats, length-prefixed modified
//! UTF-8 records, charset-encoded text and `key=value` properties. The
//! [`codec`] module converts bytes to and from hex and base64 text.
//!
//! ```rust
//! use wirebuf::{MemBuf, PositionedBuffer};
//!
//! let mut buf = MemBuf::new();
//! buf.out().write_i4(0x0102_0304).unwrap().write_utf("hi").unwrap();
//! assert_eq!(buf.to_hex().unwrap(), "0102030400026869");
//!
//! buf.flip().unwrap();
//! let mut input = buf.input();
//! assert_eq!(input.read_s4().unwrap(), 0x0102_0304);
//! assert_eq!(input.read_utf().unwrap(), "hi");
//! ```

#![allow(missing_docs)]
extern crate alloc;

mod buffer;
mod charset;
pub mod codec;
mod error;
mod in_stream;
mod options;
mod out_stream;
mod stream;

#[cfg(test)]
mod tests;

pub use buffer::{
    DEFAULT_CAPACITY, FileBuf, MemBuf, PipeSource, PipeTarget, PositionedBuffer, RegionBuf,
};
pub use charset::{CharCodec, Charset, SharedCharset};
pub use error::{BufError, FormatError, Result};
pub use in_stream::InStream;
pub use options::ObjOptions;
pub use out_stream::{MAX_UTF_LEN, OutStream};
pub use stream::{IoSink, IoSource, Sink, Source};
