use alloc::string::String;
use core::fmt;
use std::io::Write;

use bstr::BStr;

use super::{MemBuf, PipeSource, PipeTarget, PositionedBuffer, end_within, mem::digest, read_once};
use crate::{
    charset::SharedCharset,
    codec,
    error::{BufError, Result},
    stream::{Sink, Source},
};

/// Buffer over a fixed, caller-owned memory region.
///
/// Capacity is the region length and never changes; any write or resize
/// beyond it fails with [`BufError::Capacity`].
pub struct RegionBuf<'a> {
    region: &'a mut [u8],
    size: usize,
    pos: usize,
    charset: SharedCharset,
}

impl<'a> RegionBuf<'a> {
    /// The whole region is readable: `size` is the region length.
    pub fn new(region: &'a mut [u8]) -> Self {
        let size = region.len();
        Self {
            region,
            size,
            pos: 0,
            charset: SharedCharset::default(),
        }
    }

    /// Empty buffer ready to be filled up to the region length.
    pub fn empty(region: &'a mut [u8]) -> Self {
        Self {
            region,
            size: 0,
            pos: 0,
            charset: SharedCharset::default(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.region[..self.size]
    }

    fn capacity_error(&self) -> BufError {
        BufError::Capacity {
            capacity: self.region.len(),
        }
    }

    fn ensure_capacity(&self, needed: usize) -> Result<()> {
        if needed > self.region.len() {
            return Err(self.capacity_error());
        }
        Ok(())
    }

    /// Writable window for a stream read of up to `len` bytes at `pos`,
    /// clamped to the free space.
    fn read_window(&mut self, len: usize) -> Result<&mut [u8]> {
        let free = self.region.len() - self.pos;
        if free == 0 && len > 0 {
            return Err(self.capacity_error());
        }
        let end = self.pos + len.min(free);
        Ok(&mut self.region[self.pos..end])
    }

    fn commit_write(&mut self, n: usize) {
        self.pos += n;
        if self.pos > self.size {
            self.size = self.pos;
        }
        #[cfg(any(test, feature = "fuzzing"))]
        assert!(
            self.size <= self.region.len(),
            "Internal error: size past storage"
        );
    }
}

impl fmt::Debug for RegionBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionBuf")
            .field("pos", &self.pos)
            .field("size", &self.size)
            .field("capacity", &self.region.len())
            .field("data", &BStr::new(self.as_bytes()))
            .finish()
    }
}

impl fmt::Display for RegionBuf<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::display(self, f)
    }
}

impl PositionedBuffer for RegionBuf<'_> {
    fn size(&self) -> usize {
        self.size
    }

    fn set_size(&mut self, size: usize) -> Result<()> {
        self.ensure_capacity(size)?;
        if size > self.size {
            self.region[self.size..size].fill(0);
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
        Ok(self.region[pos])
    }

    fn get_bytes(&self, pos: usize, dst: &mut [u8]) -> Result<()> {
        dst.copy_from_slice(&self.region[pos..pos + dst.len()]);
        Ok(())
    }

    fn set_byte(&mut self, pos: usize, b: u8) -> Result<()> {
        self.region[pos] = b;
        Ok(())
    }

    fn pipe_to(&mut self, target: PipeTarget<'_>, len: usize) -> Result<()> {
        let end = end_within(self.pos, len, self.size).ok_or_else(BufError::eof)?;
        let src = &self.region[self.pos..end];
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
        let start = self.pos;
        let n = match source {
            PipeSource::Bytes(src) => {
                if src.len() < len {
                    return Err(BufError::Index(len as i64));
                }
                let end = end_within(start, len, self.region.len())
                    .ok_or_else(|| self.capacity_error())?;
                self.region[start..end].copy_from_slice(&src[..len]);
                len
            }
            PipeSource::Stream(src) => read_once(src, self.read_window(len)?)?,
            PipeSource::File(src) => read_once(src, self.read_window(len)?)?,
            PipeSource::Region(src) => {
                let n = len.min(src.remaining());
                let end = end_within(start, n, self.region.len())
                    .ok_or_else(|| self.capacity_error())?;
                src.copy_to_slice(&mut self.region[start..end]);
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
        "RegionBuf"
    }

    fn capacity(&self) -> usize {
        self.region.len()
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

impl Sink for RegionBuf<'_> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.pipe_from(PipeSource::Bytes(bytes), bytes.len())?;
        Ok(())
    }
}

impl Source for RegionBuf<'_> {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.region[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
