//! Layered binary/text encoding writer.
//!
//! Every write funnels into [`OutStream::w`], which hands one byte to the
//! sink. Numeric forms are big-endian, floats reuse their IEEE-754 bits, and
//! strings have two forms: the fixed length-prefixed modified UTF-8 record
//! ([`OutStream::write_utf`]) and charset-encoded characters
//! ([`OutStream::write_char`] and friends), which depend on the installed
//! [`Charset`].

use alloc::{boxed::Box, format, string::ToString, vec::Vec};
use core::fmt::{self, Display};

use crate::{
    buffer::{PipeTarget, PositionedBuffer},
    charset::{Charset, SharedCharset},
    error::{BufError, FormatError, Result},
    stream::Sink,
};

/// Largest payload of a [`write_utf`](OutStream::write_utf) record.
pub const MAX_UTF_LEN: usize = 0xffff;

const PIPE_CHUNK: usize = 4096;

pub struct OutStream<'a> {
    sink: Option<Box<dyn Sink + 'a>>,
    charset: SharedCharset,
}

impl<'a> OutStream<'a> {
    /// Writer over `sink` with its own UTF-8 charset cell.
    pub fn new(sink: impl Sink + 'a) -> Self {
        Self::with_charset(Box::new(sink), SharedCharset::default())
    }

    /// Writer with no sink; every write fails with
    /// [`BufError::Unsupported`].
    #[must_use]
    pub fn detached() -> Self {
        Self {
            sink: None,
            charset: SharedCharset::default(),
        }
    }

    pub(crate) fn with_charset(sink: Box<dyn Sink + 'a>, charset: SharedCharset) -> Self {
        Self {
            sink: Some(sink),
            charset,
        }
    }

    fn sink(&mut self) -> Result<&mut (dyn Sink + 'a)> {
        match self.sink.as_deref_mut() {
            Some(sink) => Ok(sink),
            None => Err(BufError::unsupported(format!(
                "{} wraps no sink",
                core::any::type_name::<Self>()
            ))),
        }
    }

    // ── bytes ───────────────────────────────────────────────────────────

    /// Write one byte. All other writes end up here.
    ///
    /// # Errors
    ///
    /// [`BufError::Unsupported`] without a sink; sink failures otherwise.
    pub fn w(&mut self, b: u8) -> Result<&mut Self> {
        self.sink()?.write_byte(b)?;
        Ok(self)
    }

    /// Write the low 8 bits of `x`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write(&mut self, x: i64) -> Result<&mut Self> {
        self.w(x as u8)
    }

    /// Write raw bytes as-is.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.sink()?.write_bytes(bytes)?;
        Ok(self)
    }

    /// Move `n` bytes (default: all remaining) from `buf` into the sink,
    /// advancing `buf`'s position.
    ///
    /// # Errors
    ///
    /// An unexpected-EOF I/O error when `buf` has fewer than `n` bytes left.
    pub fn write_buf(&mut self, buf: &mut dyn PositionedBuffer, n: Option<usize>) -> Result<&mut Self> {
        let mut left = n.unwrap_or_else(|| buf.remaining());
        if left > buf.remaining() {
            return Err(BufError::eof());
        }
        let sink = self.sink()?;
        let mut chunk = [0u8; PIPE_CHUNK];
        while left > 0 {
            let len = left.min(PIPE_CHUNK);
            buf.pipe_to(PipeTarget::Bytes(&mut chunk), len)?;
            sink.write_bytes(&chunk[..len])?;
            left -= len;
        }
        Ok(self)
    }

    // ── fixed binary forms ──────────────────────────────────────────────

    /// Big-endian two's complement, low 16 bits of `x`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_i2(&mut self, x: impl Into<i64>) -> Result<&mut Self> {
        let v = x.into();
        self.w((v >> 8) as u8)?.w(v as u8)
    }

    /// Big-endian two's complement, low 32 bits of `x`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_i4(&mut self, x: impl Into<i64>) -> Result<&mut Self> {
        let v = x.into();
        self.w((v >> 24) as u8)?
            .w((v >> 16) as u8)?
            .w((v >> 8) as u8)?
            .w(v as u8)
    }

    /// Big-endian two's complement, all 64 bits.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_i8(&mut self, x: impl Into<i64>) -> Result<&mut Self> {
        let v = x.into();
        for shift in (0..8).rev() {
            self.w((v >> (shift * 8)) as u8)?;
        }
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_f4(&mut self, x: f32) -> Result<&mut Self> {
        self.write_i4(x.to_bits() as i32)
    }

    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_f8(&mut self, x: f64) -> Result<&mut Self> {
        self.write_i8(x.to_bits() as i64)
    }

    /// A decimal in its canonical text form, as a [`write_utf`](Self::write_utf)
    /// record.
    ///
    /// # Errors
    ///
    /// See [`write_utf`](Self::write_utf).
    pub fn write_decimal<D: Display + ?Sized>(&mut self, x: &D) -> Result<&mut Self> {
        self.write_utf(&x.to_string())
    }

    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_bool(&mut self, x: bool) -> Result<&mut Self> {
        self.w(u8::from(x))
    }

    /// Length-prefixed modified UTF-8 record.
    ///
    /// The 2-byte big-endian prefix counts encoded bytes. Encoding works on
    /// UTF-16 code units: `<= 0x7f` is one byte, `<= 0x7ff` two, anything else
    /// three, so a surrogate pair becomes two 3-byte sequences. Independent of
    /// the installed charset.
    ///
    /// # Errors
    ///
    /// [`FormatError::StringTooBig`] when the encoding exceeds
    /// [`MAX_UTF_LEN`] bytes; nothing is written in that case.
    pub fn write_utf(&mut self, s: &str) -> Result<&mut Self> {
        let utf_len: usize = s
            .encode_utf16()
            .map(|c| match c {
                0x0000..=0x007f => 1,
                0x0080..=0x07ff => 2,
                _ => 3,
            })
            .sum();
        if utf_len > MAX_UTF_LEN {
            return Err(FormatError::StringTooBig(utf_len).into());
        }

        let mut bytes = Vec::with_capacity(utf_len + 2);
        bytes.extend_from_slice(&(utf_len as u16).to_be_bytes());
        for c in s.encode_utf16() {
            match c {
                0x0000..=0x007f => bytes.push(c as u8),
                0x0080..=0x07ff => {
                    bytes.push(0xc0 | ((c >> 6) & 0x1f) as u8);
                    bytes.push(0x80 | (c & 0x3f) as u8);
                }
                _ => {
                    bytes.push(0xe0 | ((c >> 12) & 0x0f) as u8);
                    bytes.push(0x80 | ((c >> 6) & 0x3f) as u8);
                    bytes.push(0x80 | (c & 0x3f) as u8);
                }
            }
        }
        for b in bytes {
            self.w(b)?;
        }
        Ok(self)
    }

    // ── characters ──────────────────────────────────────────────────────

    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset.get()
    }

    /// Install `charset` for all later character writes. When this stream
    /// belongs to a buffer, the buffer and its reader see the change too.
    pub fn set_charset(&mut self, charset: Charset) {
        self.charset.set(charset);
    }

    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_char(&mut self, ch: char) -> Result<&mut Self> {
        let charset = self.charset.get();
        charset.codec().encode(ch, self)?;
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn write_chars(&mut self, s: &str) -> Result<&mut Self> {
        let charset = self.charset.get();
        for ch in s.chars() {
            charset.codec().encode(ch, self)?;
        }
        Ok(self)
    }

    /// Write `len` chars of `s` starting at char `off`; `len` defaults to the
    /// rest of the string.
    ///
    /// # Errors
    ///
    /// [`BufError::Index`] when `off`/`len` run past the end of `s`.
    pub fn write_chars_range(&mut self, s: &str, off: usize, len: Option<usize>) -> Result<&mut Self> {
        let count = s.chars().count();
        if off > count {
            return Err(BufError::Index(i64::try_from(off).unwrap_or(i64::MAX)));
        }
        let len = len.unwrap_or(count - off);
        if len > count - off {
            let end = i64::try_from(off.saturating_add(len)).unwrap_or(i64::MAX);
            return Err(BufError::Index(end));
        }
        let charset = self.charset.get();
        for ch in s.chars().skip(off).take(len) {
            charset.codec().encode(ch, self)?;
        }
        Ok(self)
    }

    /// Write the display text of `obj`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn print<T: Display + ?Sized>(&mut self, obj: &T) -> Result<&mut Self> {
        self.write_chars(&obj.to_string())
    }

    /// Like [`print`](Self::print); `None` prints `null`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn print_opt<T: Display>(&mut self, obj: Option<T>) -> Result<&mut Self> {
        match obj {
            Some(obj) => self.print(&obj),
            None => self.write_chars("null"),
        }
    }

    /// [`print`](Self::print) followed by one `\n`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn print_line<T: Display + ?Sized>(&mut self, obj: &T) -> Result<&mut Self> {
        self.print(obj)?.write_char('\n')
    }

    /// A lone `\n`.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn newline(&mut self) -> Result<&mut Self> {
        self.write_char('\n')
    }

    /// `n` spaces through the charset.
    ///
    /// # Errors
    ///
    /// See [`w`](Self::w).
    pub fn indent(&mut self, n: usize) -> Result<&mut Self> {
        let charset = self.charset.get();
        for _ in 0..n {
            charset.codec().encode(' ', self)?;
        }
        Ok(self)
    }

    /// Serialize `obj` as JSON text through the charset.
    ///
    /// # Errors
    ///
    /// [`BufError::Object`] when serialization fails; sink failures otherwise.
    #[cfg(feature = "serde")]
    pub fn write_obj<T: serde::Serialize + ?Sized>(
        &mut self,
        obj: &T,
        options: Option<&crate::ObjOptions>,
    ) -> Result<&mut Self> {
        let options = options.copied().unwrap_or_default();
        let text = match options.indent {
            Some(width) => {
                let indent = alloc::vec![b' '; width];
                let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
                let mut out = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
                obj.serialize(&mut ser)?;
                alloc::string::String::from_utf8(out)
                    .map_err(|_| FormatError::InvalidEncoding("UTF-8"))?
            }
            None => serde_json::to_string(obj)?,
        };
        self.write_chars(&text)
    }

    // ── properties ──────────────────────────────────────────────────────

    /// [`write_props_with`](Self::write_props_with) closing the sink
    /// afterwards.
    ///
    /// # Errors
    ///
    /// See [`write_props_with`](Self::write_props_with).
    pub fn write_props<I, K, V>(&mut self, props: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.write_props_with(props, true)
    }

    /// Write `key=value` lines sorted by the UTF-16 code units of each key, in
    /// UTF-8 whatever the installed charset; the charset is restored
    /// afterwards even on failure.
    ///
    /// `\n`, `\r`, `\t` and `\\` become two-character escapes. Other control
    /// characters, `=`, and a `/` that would start a `//` or `/*` comment
    /// become `\u00xx`. When `close` is set the sink is closed at the end; a
    /// failure there is logged and dropped since the payload is complete.
    ///
    /// # Errors
    ///
    /// Sink failures while writing the records.
    pub fn write_props_with<I, K, V>(&mut self, props: I, close: bool) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut pairs: Vec<(K, V)> = props.into_iter().collect();
        pairs.sort_by(|a, b| a.0.as_ref().encode_utf16().cmp(b.0.as_ref().encode_utf16()));

        let original = self.charset();
        self.set_charset(Charset::utf8());
        let written = self.write_prop_pairs(&pairs);
        if close {
            if let Err(err) = self.close() {
                tracing::warn!(error = %err, "closing sink after write_props failed");
            }
        }
        self.set_charset(original);
        written?;
        Ok(self)
    }

    fn write_prop_pairs<K: AsRef<str>, V: AsRef<str>>(&mut self, pairs: &[(K, V)]) -> Result<()> {
        for (key, value) in pairs {
            self.write_prop_str(key.as_ref())?;
            self.write_char('=')?;
            self.write_prop_str(value.as_ref())?;
            self.write_char('\n')?;
        }
        Ok(())
    }

    fn write_prop_str(&mut self, s: &str) -> Result<()> {
        let mut chars = s.chars().peekable();
        while let Some(ch) = chars.next() {
            let escape = match ch {
                '\n' => Some('n'),
                '\r' => Some('r'),
                '\t' => Some('t'),
                '\\' => Some('\\'),
                _ => None,
            };
            if let Some(e) = escape {
                self.write_char('\\')?.write_char(e)?;
                continue;
            }

            let opens_comment = ch == '/' && matches!(chars.peek(), Some('/' | '*'));
            if ch < ' ' || ch == '=' || opens_comment {
                let code = u32::from(ch);
                let hi = char::from_digit((code >> 4) & 0xf, 16).unwrap_or('0');
                let lo = char::from_digit(code & 0xf, 16).unwrap_or('0');
                self.write_chars("\\u00")?.write_char(hi)?.write_char(lo)?;
                continue;
            }

            self.write_char(ch)?;
        }
        Ok(())
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Sink failures.
    pub fn flush(&mut self) -> Result<&mut Self> {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.flush()?;
        }
        Ok(self)
    }

    /// Close the sink, returning its report; `true` when detached.
    ///
    /// # Errors
    ///
    /// Sink failures.
    pub fn close(&mut self) -> Result<bool> {
        match self.sink.as_deref_mut() {
            Some(sink) => sink.close(),
            None => Ok(true),
        }
    }
}

impl fmt::Debug for OutStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutStream")
            .field("attached", &self.sink.is_some())
            .field("charset", &self.charset)
            .finish()
    }
}

/// Chaining: an `OutStream` can be the sink of another.
impl Sink for OutStream<'_> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink()?.write_bytes(bytes)
    }

    fn write_byte(&mut self, b: u8) -> Result<()> {
        self.sink()?.write_byte(b)
    }

    fn flush(&mut self) -> Result<()> {
        OutStream::flush(self).map(|_| ())
    }

    fn close(&mut self) -> Result<bool> {
        OutStream::close(self)
    }
}
