//! Positioned byte buffers.
//!
//! A buffer has a logical `size`, a cursor `pos` with `0 <= pos <= size`, and
//! a capacity hint. Random access (`get`/`set`/`seek`) accepts negative
//! indices, which count back from `size`. Streaming access goes through the
//! [`Sink`]/[`Source`] impls every backend provides (writes land at `pos` and
//! extend `size`, reads consume from `pos`), through [`PositionedBuffer::out`]
//! and [`PositionedBuffer::input`], or directly through the pipe primitives.
//!
//! The set of backends is closed: [`MemBuf`], [`FileBuf`] and [`RegionBuf`].

mod file;
mod mem;
mod region;

use alloc::{format, string::String};
use core::{fmt, ops::Bound, ops::RangeBounds};
use std::{
    fs::File,
    io::{self, Read},
};

pub use file::FileBuf;
pub use mem::{DEFAULT_CAPACITY, MemBuf};
pub use region::RegionBuf;

use crate::{
    charset::{Charset, SharedCharset},
    error::{BufError, Result},
    in_stream::InStream,
    out_stream::OutStream,
    stream::{Sink, Source},
};

mod private {
    pub trait Sealed {}

    impl Sealed for super::MemBuf {}
    impl Sealed for super::FileBuf {}
    impl Sealed for super::RegionBuf<'_> {}
}

/// Where [`PositionedBuffer::pipe_to`] sends bytes.
pub enum PipeTarget<'a> {
    /// The first `len` bytes of a plain block.
    Bytes(&'a mut [u8]),
    /// Any byte stream.
    Stream(&'a mut dyn io::Write),
    /// A fixed region with its own cursor, e.g. `BytesMut` or `&mut [u8]`.
    Region(&'a mut dyn bytes::BufMut),
    /// A random-access file, written at its current offset.
    File(&'a mut File),
}

/// Where [`PositionedBuffer::pipe_from`] takes bytes from.
pub enum PipeSource<'a> {
    /// The first `len` bytes of a plain block.
    Bytes(&'a [u8]),
    /// Any byte stream; may deliver fewer bytes than asked for.
    Stream(&'a mut dyn io::Read),
    /// A fixed region with its own cursor, e.g. `Bytes` or `&[u8]`.
    Region(&'a mut dyn bytes::Buf),
    /// A random-access file, read from its current offset.
    File(&'a mut File),
}

impl fmt::Debug for PipeTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeTarget::Bytes(b) => write!(f, "Bytes({})", b.len()),
            PipeTarget::Stream(_) => f.write_str("Stream"),
            PipeTarget::Region(r) => write!(f, "Region({})", r.remaining_mut()),
            PipeTarget::File(_) => f.write_str("File"),
        }
    }
}

impl fmt::Debug for PipeSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipeSource::Bytes(b) => write!(f, "Bytes({})", b.len()),
            PipeSource::Stream(_) => f.write_str("Stream"),
            PipeSource::Region(r) => write!(f, "Region({})", r.remaining()),
            PipeSource::File(_) => f.write_str("File"),
        }
    }
}

/// Bounds-checked cursor/size/capacity model over backend-owned bytes.
pub trait PositionedBuffer: Sink + Source + fmt::Debug + private::Sealed {
    // ── storage primitives ──────────────────────────────────────────────

    fn size(&self) -> usize;

    /// Set the logical size. Growing exposes zero bytes; shrinking below
    /// `pos` pulls `pos` back to the new size.
    ///
    /// # Errors
    ///
    /// Backend failures: capacity for fixed regions, I/O for files.
    fn set_size(&mut self, size: usize) -> Result<()>;

    fn pos(&self) -> usize;

    /// Unchecked cursor update; callers keep `pos <= size`. Use
    /// [`seek`](Self::seek) for the checked form.
    fn set_pos(&mut self, pos: usize);

    #[doc(hidden)]
    fn get_byte(&self, pos: usize) -> Result<u8>;

    #[doc(hidden)]
    fn get_bytes(&self, pos: usize, dst: &mut [u8]) -> Result<()>;

    #[doc(hidden)]
    fn set_byte(&mut self, pos: usize, b: u8) -> Result<()>;

    /// Move `len` bytes from `pos` into `target`, advancing `pos`.
    ///
    /// # Errors
    ///
    /// An unexpected-EOF I/O error when fewer than `len` bytes remain; an
    /// index error when a `Bytes` block is shorter than `len`; a capacity
    /// error when a `Region` cannot take `len` bytes.
    fn pipe_to(&mut self, target: PipeTarget<'_>, len: usize) -> Result<()>;

    /// Move up to `len` bytes from `source` into the buffer at `pos`,
    /// advancing `pos` and extending `size` as needed. Returns the count
    /// actually moved, which for streams may be short (`0` at end of input).
    ///
    /// # Errors
    ///
    /// An index error when a `Bytes` block is shorter than `len`; backend
    /// failures otherwise.
    fn pipe_from(&mut self, source: PipeSource<'_>, len: usize) -> Result<usize>;

    fn shared_charset(&self) -> &SharedCharset;

    /// Backend name used in messages and `Display`.
    fn kind(&self) -> &'static str;

    // ── provided ────────────────────────────────────────────────────────

    /// Storage hint; `usize::MAX` means unbounded.
    fn capacity(&self) -> usize {
        usize::MAX
    }

    /// No-op unless the backend can grow.
    ///
    /// # Errors
    ///
    /// Backend specific; see [`MemBuf`].
    fn set_capacity(&mut self, _capacity: usize) -> Result<()> {
        Ok(())
    }

    /// Release unused capacity where the backend supports it.
    ///
    /// # Errors
    ///
    /// Backend specific.
    fn trim(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn remaining(&self) -> usize {
        self.size() - self.pos()
    }

    fn more(&self) -> bool {
        self.remaining() > 0
    }

    /// Move the cursor; negative `pos` counts back from `size`.
    ///
    /// # Errors
    ///
    /// [`BufError::Index`] when the resolved position is outside `0..=size`.
    fn seek(&mut self, pos: i64) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let size = self.size();
        let resolved = resolve(pos, size);
        if resolved < 0 || resolved > size as i64 {
            return Err(BufError::Index(pos));
        }
        self.set_pos(resolved as usize);
        Ok(self)
    }

    /// Switch a just-filled buffer to reading: `size = pos; pos = 0`.
    ///
    /// # Errors
    ///
    /// Backend failures from [`set_size`](Self::set_size).
    fn flip(&mut self) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let pos = self.pos();
        self.set_size(pos)?;
        self.set_pos(0);
        Ok(self)
    }

    /// Byte at `pos`; negative `pos` counts back from `size`.
    ///
    /// # Errors
    ///
    /// [`BufError::Index`] when the resolved index is outside `0..size`.
    fn get(&self, pos: i64) -> Result<u8> {
        let index = check_index(pos, self.size())?;
        self.get_byte(index)
    }

    /// Store the low 8 bits of `b` at `pos`; negative `pos` counts back from
    /// `size`.
    ///
    /// # Errors
    ///
    /// [`BufError::Index`] when the resolved index is outside `0..size`.
    fn set(&mut self, pos: i64, b: i64) -> Result<&mut Self>
    where
        Self: Sized,
    {
        let index = check_index(pos, self.size())?;
        self.set_byte(index, b as u8)?;
        Ok(self)
    }

    /// Copy a range of bytes into a new, independent [`MemBuf`] carrying this
    /// buffer's charset.
    ///
    /// Bounds may be negative (counted from `size`). The start may equal
    /// `size`, which yields an empty slice.
    ///
    /// # Errors
    ///
    /// [`BufError::Range`] when a bound is out of range or the range is
    /// reversed.
    fn slice<R: RangeBounds<i64>>(&self, range: R) -> Result<MemBuf>
    where
        Self: Sized,
    {
        let (start, len) = resolve_range(&range, self.size())?;
        let mut bytes = alloc::vec![0u8; len];
        self.get_bytes(start, &mut bytes)?;
        let mut result = MemBuf::from(bytes);
        result.set_charset(self.charset());
        Ok(result)
    }

    /// `pos = 0; size = 0`. Capacity is retained.
    ///
    /// # Errors
    ///
    /// Backend failures from [`set_size`](Self::set_size).
    fn clear(&mut self) -> Result<&mut Self>
    where
        Self: Sized,
    {
        self.set_pos(0);
        self.set_size(0)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// [`BufError::Unsupported`] unless the backend has direct byte access.
    fn to_hex(&self) -> Result<String> {
        Err(BufError::unsupported(format!("{}.to_hex", self.kind())))
    }

    /// # Errors
    ///
    /// [`BufError::Unsupported`] unless the backend has direct byte access.
    fn to_base64(&self) -> Result<String> {
        Err(BufError::unsupported(format!("{}.to_base64", self.kind())))
    }

    /// Digest of the whole buffer (`0..size`) as a new buffer.
    ///
    /// # Errors
    ///
    /// [`BufError::Unsupported`] unless the backend has direct byte access;
    /// [`BufError::Arg`] for an unknown algorithm.
    fn to_digest(&self, _algorithm: &str) -> Result<MemBuf> {
        Err(BufError::unsupported(format!("{}.to_digest", self.kind())))
    }

    fn charset(&self) -> Charset {
        self.shared_charset().get()
    }

    /// Change the charset for this buffer and every stream bound to it.
    fn set_charset(&mut self, charset: Charset) {
        self.shared_charset().set(charset);
    }

    /// A writer whose bytes land at `pos`.
    fn out(&mut self) -> OutStream<'_> {
        let charset = self.shared_charset().clone();
        OutStream::with_charset(alloc::boxed::Box::new(self), charset)
    }

    /// A reader consuming from `pos`.
    fn input(&mut self) -> InStream<'_> {
        let charset = self.shared_charset().clone();
        InStream::with_charset(alloc::boxed::Box::new(self), charset)
    }
}

#[inline]
fn resolve(index: i64, size: usize) -> i64 {
    if index < 0 { index + size as i64 } else { index }
}

fn check_index(index: i64, size: usize) -> Result<usize> {
    let resolved = resolve(index, size);
    if resolved < 0 || resolved >= size as i64 {
        return Err(BufError::Index(index));
    }
    Ok(resolved as usize)
}

/// Resolve `range` against `size` into `(start, len)`.
pub(crate) fn resolve_range<R: RangeBounds<i64>>(range: &R, size: usize) -> Result<(usize, usize)> {
    let signed = size as i64;
    let start = match range.start_bound() {
        Bound::Included(&s) => Some(resolve(s, size)),
        Bound::Excluded(&s) => resolve(s, size).checked_add(1),
        Bound::Unbounded => Some(0),
    };
    let end = match range.end_bound() {
        Bound::Included(&e) => Some(resolve(e, size)),
        Bound::Excluded(&e) => resolve(e, size).checked_sub(1),
        Bound::Unbounded => Some(signed - 1),
    };
    let (Some(start), Some(end)) = (start, end) else {
        return Err(BufError::Range {
            start: start.unwrap_or(i64::MAX),
            end: end.unwrap_or(i64::MIN),
            size,
        });
    };
    if start < 0 || start > signed || end >= signed || end < start - 1 {
        return Err(BufError::Range { start, end, size });
    }
    Ok((start as usize, (end - start + 1) as usize))
}

/// `pos + len` when it stays within `limit`.
pub(crate) fn end_within(pos: usize, len: usize, limit: usize) -> Option<usize> {
    pos.checked_add(len).filter(|&end| end <= limit)
}

/// One `read` call, retried only on `Interrupted`.
pub(crate) fn read_once<R: Read + ?Sized>(src: &mut R, dst: &mut [u8]) -> Result<usize> {
    loop {
        match src.read(dst) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
}

/// Shared `Display` shape: `MemBuf(pos=0 size=3)`.
pub(crate) fn display(buf: &dyn PositionedBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}(pos={} size={})", buf.kind(), buf.pos(), buf.size())
}
