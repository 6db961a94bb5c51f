use core::fmt;
use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::Path,
};

use super::{PipeSource, PipeTarget, PositionedBuffer, end_within};
use crate::{
    charset::SharedCharset,
    error::{BufError, Result},
    stream::{Sink, Source},
};

const CHUNK: usize = 8 * 1024;

/// Buffer over a random-access file.
///
/// `size` is the file length and `pos` a cursor kept alongside it; every
/// access seeks explicitly, so the file's own offset is never relied on.
/// Encoding helpers that need the whole content in memory (`to_hex`,
/// `to_base64`, `to_digest`) are not offered here.
pub struct FileBuf {
    file: Option<File>,
    size: usize,
    pos: usize,
    charset: SharedCharset,
}

impl FileBuf {
    /// Open `path` for reading and writing, creating it when missing.
    ///
    /// # Errors
    ///
    /// I/O failures opening the file or reading its metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        tracing::debug!(path = %path.display(), "FileBuf open");
        Self::from_file(file)
    }

    /// Wrap an already opened file; `pos` starts at 0.
    ///
    /// # Errors
    ///
    /// I/O failures reading the file's metadata.
    pub fn from_file(file: File) -> Result<Self> {
        let size = usize::try_from(file.metadata()?.len())
            .map_err(|_| BufError::Arg("file too large".into()))?;
        Ok(Self {
            file: Some(file),
            size,
            pos: 0,
            charset: SharedCharset::default(),
        })
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// A handle positioned at `at`.
    fn file_at(&self, at: usize) -> Result<&File> {
        let mut file = self.file.as_ref().ok_or(BufError::Closed)?;
        file.seek(SeekFrom::Start(at as u64))?;
        Ok(file)
    }

    fn check_available(&self, len: usize) -> Result<()> {
        end_within(self.pos, len, self.size).ok_or_else(BufError::eof)?;
        Ok(())
    }

    fn commit_write(&mut self, n: usize) {
        self.pos += n;
        if self.pos > self.size {
            self.size = self.pos;
        }
    }

    /// Copy up to `len` bytes from `src` into the file at `pos`, stopping
    /// early at end of input.
    fn copy_in(&mut self, src: &mut dyn Read, len: usize) -> Result<usize> {
        let mut file = self.file_at(self.pos)?;
        let mut chunk = [0u8; CHUNK];
        let mut total = 0;
        while total < len {
            let want = CHUNK.min(len - total);
            let n = match src.read(&mut chunk[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(&chunk[..n])?;
            total += n;
        }
        self.commit_write(total);
        Ok(total)
    }
}

impl fmt::Debug for FileBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBuf")
            .field("pos", &self.pos)
            .field("size", &self.size)
            .field("closed", &self.is_closed())
            .field("charset", &self.charset)
            .finish()
    }
}

impl fmt::Display for FileBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        super::display(self, f)
    }
}

impl PositionedBuffer for FileBuf {
    fn size(&self) -> usize {
        self.size
    }

    fn set_size(&mut self, size: usize) -> Result<()> {
        self.file.as_ref().ok_or(BufError::Closed)?.set_len(size as u64)?;
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
        let mut b = [0u8; 1];
        self.get_bytes(pos, &mut b)?;
        Ok(b[0])
    }

    fn get_bytes(&self, pos: usize, dst: &mut [u8]) -> Result<()> {
        self.file_at(pos)?.read_exact(dst)?;
        Ok(())
    }

    fn set_byte(&mut self, pos: usize, b: u8) -> Result<()> {
        self.file_at(pos)?.write_all(&[b])?;
        Ok(())
    }

    fn pipe_to(&mut self, target: PipeTarget<'_>, len: usize) -> Result<()> {
        self.check_available(len)?;
        tracing::trace!(?target, len, pos = self.pos, "FileBuf pipe_to");
        let mut file = self.file_at(self.pos)?;
        match target {
            PipeTarget::Bytes(dst) => {
                if dst.len() < len {
                    return Err(BufError::Index(len as i64));
                }
                file.read_exact(&mut dst[..len])?;
            }
            PipeTarget::Stream(dst) => {
                io::copy(&mut file.take(len as u64), dst)?;
            }
            PipeTarget::File(dst) => {
                io::copy(&mut file.take(len as u64), dst)?;
            }
            PipeTarget::Region(dst) => {
                if dst.remaining_mut() < len {
                    return Err(BufError::Capacity {
                        capacity: dst.remaining_mut(),
                    });
                }
                let mut chunk = [0u8; CHUNK];
                let mut left = len;
                while left > 0 {
                    let n = CHUNK.min(left);
                    file.read_exact(&mut chunk[..n])?;
                    dst.put_slice(&chunk[..n]);
                    left -= n;
                }
            }
        }
        self.pos += len;
        Ok(())
    }

    fn pipe_from(&mut self, source: PipeSource<'_>, len: usize) -> Result<usize> {
        tracing::trace!(?source, len, pos = self.pos, "FileBuf pipe_from");
        match source {
            PipeSource::Bytes(src) => {
                if src.len() < len {
                    return Err(BufError::Index(len as i64));
                }
                self.file_at(self.pos)?.write_all(&src[..len])?;
                self.commit_write(len);
                Ok(len)
            }
            PipeSource::Stream(src) => self.copy_in(src, len),
            PipeSource::File(src) => self.copy_in(src, len),
            PipeSource::Region(src) => {
                let n = len.min(src.remaining());
                self.copy_in(&mut bytes::Buf::reader(bytes::Buf::take(src, n)), n)
            }
        }
    }

    fn shared_charset(&self) -> &SharedCharset {
        &self.charset
    }

    fn kind(&self) -> &'static str {
        "FileBuf"
    }
}

impl Sink for FileBuf {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.pipe_from(PipeSource::Bytes(bytes), bytes.len())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.as_ref().ok_or(BufError::Closed)?.sync_all()?;
        Ok(())
    }

    fn close(&mut self) -> Result<bool> {
        if let Some(file) = self.file.take() {
            tracing::debug!(size = self.size, "FileBuf close");
            file.sync_all()?;
        }
        Ok(true)
    }
}

impl Source for FileBuf {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = dst.len().min(self.remaining());
        self.get_bytes(self.pos, &mut dst[..n])?;
        self.pos += n;
        Ok(n)
    }
}
