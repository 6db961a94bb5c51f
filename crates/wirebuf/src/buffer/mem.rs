use alloc::{string::String, vec::Vec};
use core::fmt;
use std::io::Write;

use bstr::BStr;

use super::{PipeSource, PipeTarget, PositionedBuffer, end_within, read_once};
use crate::{
    charset::SharedCharset,
    codec,
    error::{BufError, Result},
    stream::{Sink, Source},
};

/// Capacity of [`MemBuf::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Largest single stream read when the spare capacity is smaller.
const READ_CHUNK: usize = 8 * 1024;

/// Growable in-memory buffer.
///
/// `data.len()` is the capacity; bytes past `size` are scratch space.
pub struct MemBuf {
    data: Vec<u8>,
    size: usize,
    pos: usize,
    charset: SharedCharset,
}

impl MemBuf {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: alloc::vec![0; capacity],
            size: 0,
            pos: 0,
            charset: SharedCharset::default(),
        }
    }

    /// Buffer holding `bytes`, positioned at 0.
    #[must_use]
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let size = bytes.len();
        Self {
            data: bytes,
            size,
            pos: 0,
            charset: SharedCharset::default(),
        }
    }

    /// `size` random bytes from the thread-local generator, positioned at 0.
    #[must_use]
    pub fn random(size: usize) -> Self {
        let mut bytes = alloc::vec![0u8; size];
        rand::RngCore::fill_bytes(&mut rand::rng(), &mut bytes);
        Self::from_vec(bytes)
    }

    /// Decode hex text into a new buffer. See [`codec::from_hex`].
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidHex`](crate::FormatError::InvalidHex) on a
    /// dangling or invalid second nibble.
    pub fn from_hex(text: &str) -> Result<Self> {
        codec::from_hex(text).map(Self::from_vec)
    }

    /// Decode base64 text into a new buffer. See [`codec::from_base64`].
    #[must_use]
    pub fn from_base64(text: &str) -> Self {
        Self::from_vec(codec::from_base64(text))
    }

    /// The logical contents, `0..size`.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// The logical contents, dropping the scratch space.
    #[must_use]
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.size);
        self.data
    }

    /// Make sure `needed` bytes of storage exist, doubling on growth.
    fn grow(&mut self, needed: usize) {
        if needed <= self.data.len() {
            return;
        }
        let new_capacity = needed.max(self.data.len() * 2);
        tracing::trace!(from = self.data.len(), to = new_capacity, "MemBuf grow");
        self.data.resize(new_capacity, 0);
    }

    fn check_available(&self, len: usize) -> Result<usize> {
        end_within(self.pos, len, self.size).ok_or_else(BufError::eof)
    }

    /// Storage for a write of `len` bytes at `pos`.
    fn write_window(&mut self, len: usize) -> &mut [u8] {
        self.grow(self.pos + len);
        &mut self.data[self.pos..self.pos + len]
    }

    /// Storage for one stream read of at most `len` bytes: the spare
    /// capacity, or one chunk when that is smaller.
    fn read_window(&mut self, len: usize) -> &mut [u8] {
        let spare = self.data.len() - self.pos;
        self.write_window(len.min(spare.max(READ_CHUNK)))
    }

    fn commit_write(&mut self, n: usize) {
        self.pos += n;
        if self.pos > self.size {
            self.size = self.pos;
        }
        #[cfg(any(test, feature = "fuzzing"))]
        assert!(
            self.size <= self.data.len(),
            "Internal error: size past storage"
        );
    }
}

impl Default for MemBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for MemBuf {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl From<&[u8]> for MemBuf {
    fn from(bytes: &[u8]) -> Self {
        Self::from_vec(bytes.to_vec())
    }
}

impl fmt::Debug for MemBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemBuf")
            .field("pos", &self.pos)
            .field("size", &self.size)
            .field("capacity", &self.data.len())
            .field("charset", &self.charset)
            .field("data", &BStr::new(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for MemBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::display(self, f)
    }
}

impl PositionedBuffer for MemBuf {
    fn size(&self) -> usize {
        self.size
    }

    fn set_size(&mut self, size: usize) -> Result<()> {
        self.grow(size);
        if size > self.size {
            self.data[self.size..size].fill(0);
        }
        self.size = size;
        self.pos = self.pos.min(size);
        Ok(())
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn set_pos(&mut self, pos: usize) {
        debug_assert!(pos <= self.size);
        self.pos = pos;
    }

    fn get_byte(&self, pos: usize) -> Result<u8> {
        Ok(self.data[pos])
    }

    fn get_bytes(&self, pos: usize, dst: &mut [u8]) -> Result<()> {
        dst.copy_from_slice(&self.data[pos..pos + dst.len()]);
        Ok(())
    }

    fn set_byte(&mut self, pos: usize, b: u8) -> Result<()> {
        self.data[pos] = b;
        Ok(())
    }

    fn pipe_to(&mut self, target: PipeTarget<'_>, len: usize) -> Result<()> {
        let end = self.check_available(len)?;
        let src = &self.data[self.pos..end];
        match target {
            PipeTarget::Bytes(dst) => {
                if dst.len() < len {
                    return Err(BufError::Index(len as i64));
                }
                dst[..len].copy_from_slice(src);
            }
            PipeTarget::Stream(dst) => dst.write_all(src)?,
            PipeTarget::File(dst) => dst.write_all(src)?,
            PipeTarget::Region(dst) => {
                if dst.remaining_mut() < len {
                    return Err(BufError::Capacity {
                        capacity: dst.remaining_mut(),
                    });
                }
                dst.put_slice(src);
            }
        }
        self.pos += len;
        Ok(())
    }

    fn pipe_from(&mut self, source: PipeSource<'_>, len: usize) -> Result<usize> {
        let n = match source {
            PipeSource::Bytes(src) => {
                if src.len() < len {
                    return Err(BufError::Index(len as i64));
                }
                self.write_window(len).copy_from_slice(&src[..len]);
                len
            }
            PipeSource::Stream(src) => read_once(src, self.read_window(len))?,
            PipeSource::File(src) => read_once(src, self.read_window(len))?,
            PipeSource::Region(src) => {
                let n = len.min(src.remaining());
                src.copy_to_slice(self.write_window(n));
                n
            }
        };
        self.commit_write(n);
        Ok(n)
    }

    fn shared_charset(&self) -> &SharedCharset {
        &self.charset
    }

    fn kind(&self) -> &'static str {
        "MemBuf"
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn set_capacity(&mut self, capacity: usize) -> Result<()> {
        if capacity < self.size {
            return Err(BufError::Arg(alloc::format!(
                "capacity {capacity} < size {}",
                self.size
            )));
        }
        tracing::debug!(from = self.data.len(), to = capacity, "MemBuf capacity");
        self.data.resize(capacity, 0);
        self.data.shrink_to_fit();
        Ok(())
    }

    fn trim(&mut self) -> Result<()> {
        if self.size != self.data.len() {
            self.set_capacity(self.size)?;
        }
        Ok(())
    }

    fn to_hex(&self) -> Result<String> {
        Ok(codec::to_hex(self.as_bytes()))
    }

    fn to_base64(&self) -> Result<String> {
        Ok(codec::to_base64(self.as_bytes()))
    }

    fn to_digest(&self, algorithm: &str) -> Result<MemBuf> {
        digest(algorithm, self.as_bytes()).map(MemBuf::from_vec)
    }
}

#[cfg(feature = "digest")]
pub(super) fn digest(algorithm: &str, bytes: &[u8]) -> Result<Vec<u8>> {
    use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

    let key: String = algorithm
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    Ok(match key.as_str() {
        "SHA224" => Sha224::digest(bytes).to_vec(),
        "SHA256" => Sha256::digest(bytes).to_vec(),
        "SHA384" => Sha384::digest(bytes).to_vec(),
        "SHA512" => Sha512::digest(bytes).to_vec(),
        _ => {
            return Err(BufError::Arg(alloc::format!(
                "unknown digest algorithm: {algorithm}"
            )));
        }
    })
}

#[cfg(not(feature = "digest"))]
pub(super) fn digest(_algorithm: &str, _bytes: &[u8]) -> Result<Vec<u8>> {
    Err(BufError::unsupported("to_digest without the `digest` feature"))
}

impl Sink for MemBuf {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.pipe_from(PipeSource::Bytes(bytes), bytes.len())?;
        Ok(())
    }

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_window(1)[0] = b;
        self.commit_write(1);
        Ok(())
    }
}

impl Source for MemBuf {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use rstest::rstest;

    use super::*;

    #[test]
    fn writes_grow_storage() {
        let mut buf = MemBuf::with_capacity(2);
        buf.write_bytes(b"hello").unwrap();
        assert_eq!(buf.as_bytes(), b"hello");
        assert!(buf.capacity() >= 5);
        assert_eq!(buf.pos(), 5);
    }

    #[test]
    fn overwrite_in_the_middle_keeps_size() {
        let mut buf = MemBuf::from(b"hello".to_vec());
        buf.seek(1).unwrap();
        buf.write_bytes(b"EL").unwrap();
        assert_eq!(buf.as_bytes(), b"hELlo");
        assert_eq!(buf.size(), 5);
        assert_eq!(buf.pos(), 3);
    }

    #[test]
    fn set_size_clamps_pos_and_zero_fills() {
        let mut buf = MemBuf::from(b"hello".to_vec());
        buf.seek(-1).unwrap();
        buf.set_size(2).unwrap();
        assert_eq!(buf.pos(), 2);
        buf.set_size(4).unwrap();
        assert_eq!(buf.as_bytes(), b"he\0\0");
    }

    #[test]
    fn capacity_cannot_drop_below_size() {
        let mut buf = MemBuf::from(b"hello".to_vec());
        assert!(matches!(buf.set_capacity(3), Err(BufError::Arg(_))));
        buf.set_capacity(100).unwrap();
        assert_eq!(buf.capacity(), 100);
        buf.trim().unwrap();
        assert_eq!(buf.capacity(), 5);
        assert_eq!(buf.as_bytes(), b"hello");
    }

    #[test]
    fn pipe_to_bytes_and_stream() {
        let mut buf = MemBuf::from(b"abcdef".to_vec());
        let mut block = [0u8; 4];
        buf.pipe_to(PipeTarget::Bytes(&mut block), 2).unwrap();
        assert_eq!(&block[..2], b"ab");
        let mut out = Vec::new();
        buf.pipe_to(PipeTarget::Stream(&mut out), 3).unwrap();
        assert_eq!(out, b"cde");
        assert_eq!(buf.pos(), 5);
        assert!(buf.pipe_to(PipeTarget::Stream(&mut out), 2).unwrap_err().is_eof());
        assert_eq!(buf.pos(), 5);
    }

    #[test]
    fn pipe_region_both_ways() {
        let mut buf = MemBuf::from(b"abcdef".to_vec());
        let mut region = bytes::BytesMut::with_capacity(8);
        buf.pipe_to(PipeTarget::Region(&mut region), 4).unwrap();
        assert_eq!(&region[..], b"abcd");

        let mut fixed = [0u8; 2];
        let mut window: &mut [u8] = &mut fixed;
        buf.pipe_to(PipeTarget::Region(&mut window), 2).unwrap();
        assert_eq!(&fixed, b"ef");

        let mut dst = MemBuf::new();
        let mut src = bytes::Bytes::from_static(b"xyz");
        assert_eq!(dst.pipe_from(PipeSource::Region(&mut src), 10).unwrap(), 3);
        assert_eq!(dst.as_bytes(), b"xyz");
    }

    #[test]
    fn pipe_from_stream_reports_partial_count() {
        let mut buf = MemBuf::new();
        let mut src: &[u8] = b"abc";
        assert_eq!(buf.pipe_from(PipeSource::Stream(&mut src), 10).unwrap(), 3);
        assert_eq!(buf.pipe_from(PipeSource::Stream(&mut src), 10).unwrap(), 0);
        assert_eq!(buf.as_bytes(), b"abc");
        assert_eq!(buf.pos(), 3);
    }

    #[rstest]
    #[case(usize::MAX)]
    #[case(usize::MAX - 2)]
    #[case(7)]
    fn pipe_to_past_the_end_is_eof(#[case] len: usize) {
        let mut buf = MemBuf::from(b"abcdef".to_vec());
        buf.seek(3).unwrap();
        let mut out = Vec::new();
        assert!(buf.pipe_to(PipeTarget::Stream(&mut out), len).unwrap_err().is_eof());
        assert!(buf.pipe_to(PipeTarget::Bytes(&mut [0u8; 4]), len).unwrap_err().is_eof());
        assert_eq!(buf.pos(), 3);
        assert!(out.is_empty());
    }

    #[test]
    fn pipe_from_stream_with_huge_len_reads_what_is_there() {
        let mut buf = MemBuf::with_capacity(4);
        let mut src: &[u8] = b"short";
        assert_eq!(buf.pipe_from(PipeSource::Stream(&mut src), usize::MAX).unwrap(), 5);
        assert_eq!(buf.as_bytes(), b"short");
    }

    #[test]
    fn random_fills_requested_size() {
        let a = MemBuf::random(33);
        assert_eq!((a.size(), a.pos()), (33, 0));
        assert!(MemBuf::random(0).is_empty());
        let b = MemBuf::random(33);
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn hex_and_base64() {
        let buf = MemBuf::from(vec![0xca, 0xfe, 0x01]);
        assert_eq!(buf.to_hex().unwrap(), "cafe01");
        assert_eq!(buf.to_base64().unwrap(), "yv4B");
        assert_eq!(MemBuf::from_hex("cafe01").unwrap().as_bytes(), buf.as_bytes());
        assert_eq!(MemBuf::from_base64("yv4B").as_bytes(), buf.as_bytes());
    }

    #[cfg(feature = "digest")]
    #[test]
    fn sha256_digest() {
        let buf = MemBuf::from(b"abc".to_vec());
        let digest = buf.to_digest("SHA-256").unwrap();
        assert_eq!(
            digest.to_hex().unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(matches!(buf.to_digest("MD4"), Err(BufError::Arg(_))));
    }
}
