//! Byte sink/source collaborators.
//!
//! Every buffer backend is both a [`Sink`] and a [`Source`]; [`IoSink`] and
//! [`IoSource`] adapt anything implementing `std::io::Write` / `std::io::Read`
//! (files, sockets, pipes) so an [`OutStream`](crate::OutStream) or
//! [`InStream`](crate::InStream) can sit on top of it.

use alloc::boxed::Box;
use std::io::{self, Read, Write};

use crate::error::Result;

pub trait Sink {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.write_bytes(&[b])
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the sink. Returns whether the sink is now closed.
    fn close(&mut self) -> Result<bool> {
        Ok(true)
    }
}

pub trait Source {
    /// Read up to `dst.len()` bytes, returning how many were read; `0` means
    /// end of input (for a non-empty `dst`).
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize>;
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn write_byte(&mut self, b: u8) -> Result<()> {
        (**self).write_byte(b)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<bool> {
        (**self).close()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(bytes)
    }

    fn write_byte(&mut self, b: u8) -> Result<()> {
        (**self).write_byte(b)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<bool> {
        (**self).close()
    }
}

impl<S: Source + ?Sized> Source for &mut S {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        (**self).read_bytes(dst)
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        (**self).read_bytes(dst)
    }
}

impl Source for &[u8] {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        let n = dst.len().min(self.len());
        let (head, tail) = self.split_at(n);
        dst[..n].copy_from_slice(head);
        *self = tail;
        Ok(n)
    }
}

/// [`Sink`] over a `std::io::Write`.
///
/// `close` flushes and then drops the writer; later writes fail with
/// [`BufError::Closed`](crate::BufError::Closed).
#[derive(Debug)]
pub struct IoSink<W: Write> {
    inner: Option<W>,
}

impl<W: Write> IoSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner: Some(inner) }
    }

    /// Recover the writer, if the sink has not been closed.
    pub fn into_inner(self) -> Option<W> {
        self.inner
    }

    fn inner(&mut self) -> Result<&mut W> {
        self.inner.as_mut().ok_or(crate::BufError::Closed)
    }
}

impl<W: Write> Sink for IoSink<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner()?.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner()?.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<bool> {
        if let Some(mut inner) = self.inner.take() {
            inner.flush()?;
        }
        Ok(true)
    }
}

/// [`Source`] over a `std::io::Read`.
#[derive(Debug)]
pub struct IoSource<R: Read> {
    inner: R,
}

impl<R: Read> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Source for IoSource<R> {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        loop {
            match self.inner.read(dst) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}
