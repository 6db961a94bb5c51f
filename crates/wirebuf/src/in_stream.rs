//! Reader mirroring [`OutStream`](crate::OutStream).
//!
//! Binary forms are decoded big-endian; character reads go through the
//! installed [`Charset`]'s codec, which pulls its bytes with
//! [`InStream::read`]. Byte and character push-back are kept separately.

use alloc::{boxed::Box, collections::BTreeMap, format, string::String, vec, vec::Vec};
use core::{fmt, str::FromStr};

use crate::{
    buffer::{MemBuf, PipeSource, PositionedBuffer},
    charset::{Charset, SharedCharset},
    error::{BufError, FormatError, Result},
    stream::Source,
};

const CHUNK: usize = 4096;

pub struct InStream<'a> {
    source: Option<Box<dyn Source + 'a>>,
    pushback: Vec<u8>,
    char_pushback: Vec<char>,
    charset: SharedCharset,
}

impl<'a> InStream<'a> {
    /// Reader over `source` with its own UTF-8 charset cell.
    pub fn new(source: impl Source + 'a) -> Self {
        Self::with_charset(Box::new(source), SharedCharset::default())
    }

    /// Reader with no source; every read fails with
    /// [`BufError::Unsupported`].
    #[must_use]
    pub fn detached() -> Self {
        Self {
            source: None,
            pushback: Vec::new(),
            char_pushback: Vec::new(),
            charset: SharedCharset::default(),
        }
    }

    pub(crate) fn with_charset(source: Box<dyn Source + 'a>, charset: SharedCharset) -> Self {
        Self {
            source: Some(source),
            pushback: Vec::new(),
            char_pushback: Vec::new(),
            charset,
        }
    }

    fn source(&mut self) -> Result<&mut (dyn Source + 'a)> {
        match self.source.as_deref_mut() {
            Some(source) => Ok(source),
            None => Err(BufError::unsupported(format!(
                "{} wraps no source",
                core::any::type_name::<Self>()
            ))),
        }
    }

    /// Fill `dst` from the push-back stack first, then with one source read.
    fn read_some(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut n = 0;
        while n < dst.len() {
            match self.pushback.pop() {
                Some(b) => {
                    dst[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        if n > 0 || dst.is_empty() {
            return Ok(n);
        }
        self.source()?.read_bytes(dst)
    }

    // ── bytes ───────────────────────────────────────────────────────────

    /// Next byte, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// [`BufError::Unsupported`] without a source; source failures otherwise.
    pub fn read(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        match self.read_some(&mut b)? {
            0 => Ok(None),
            _ => Ok(Some(b[0])),
        }
    }

    /// Next byte without consuming it.
    ///
    /// # Errors
    ///
    /// See [`read`](Self::read).
    pub fn peek(&mut self) -> Result<Option<u8>> {
        let b = self.read()?;
        if let Some(b) = b {
            self.unread(b);
        }
        Ok(b)
    }

    /// Push `b` back; it is the next byte [`read`](Self::read) returns.
    pub fn unread(&mut self, b: u8) -> &mut Self {
        self.pushback.push(b);
        self
    }

    /// Read up to `n` bytes into `buf` at its position. `None` at end of
    /// input, otherwise the count read, which may be short.
    ///
    /// # Errors
    ///
    /// Source failures or the target buffer's own failures.
    pub fn read_buf(&mut self, buf: &mut dyn PositionedBuffer, n: usize) -> Result<Option<usize>> {
        if n == 0 {
            return Ok(Some(0));
        }
        let mut chunk = vec![0u8; n.min(CHUNK)];
        let got = self.read_some(&mut chunk)?;
        if got == 0 {
            return Ok(None);
        }
        buf.pipe_from(PipeSource::Bytes(&chunk[..got]), got)?;
        Ok(Some(got))
    }

    /// Read exactly `n` bytes into `buf`.
    ///
    /// # Errors
    ///
    /// An unexpected-EOF I/O error when input ends first.
    pub fn read_buf_fully(&mut self, buf: &mut dyn PositionedBuffer, n: usize) -> Result<&mut Self> {
        let mut left = n;
        while left > 0 {
            match self.read_buf(buf, left)? {
                Some(got) => left -= got,
                None => return Err(BufError::eof()),
            }
        }
        Ok(self)
    }

    /// Drain the input into a new buffer positioned at 0.
    ///
    /// # Errors
    ///
    /// Source failures.
    pub fn read_all_buf(&mut self) -> Result<MemBuf> {
        let mut buf = MemBuf::new();
        while self.read_buf(&mut buf, CHUNK)?.is_some() {}
        buf.set_charset(self.charset());
        buf.flip()?;
        Ok(buf)
    }

    fn r(&mut self) -> Result<u8> {
        self.read()?.ok_or_else(BufError::eof)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        for b in &mut bytes {
            *b = self.r()?;
        }
        Ok(bytes)
    }

    // ── fixed binary forms ──────────────────────────────────────────────

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_u1(&mut self) -> Result<u8> {
        self.r()
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_s1(&mut self) -> Result<i8> {
        Ok(self.r()? as i8)
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_u2(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_s2(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.take()?))
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_u4(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_s4(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take()?))
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_s8(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_f4(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u4()?))
    }

    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_f8(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_s8()? as u64))
    }

    /// Any non-zero byte is `true`.
    ///
    /// # Errors
    ///
    /// An unexpected-EOF I/O error on a short read.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.r()? != 0)
    }

    /// Read one length-prefixed modified UTF-8 record.
    ///
    /// # Errors
    ///
    /// [`FormatError::MalformedUtf`] on a bad byte sequence or unpaired
    /// surrogate; an unexpected-EOF I/O error when the record is truncated.
    pub fn read_utf(&mut self) -> Result<String> {
        let len = usize::from(self.read_u2()?);
        let mut bytes = vec![0u8; len];
        for b in &mut bytes {
            *b = self.r()?;
        }

        let continuation = |b: u8| {
            if b & 0xc0 == 0x80 {
                Ok(u16::from(b & 0x3f))
            } else {
                Err(FormatError::MalformedUtf)
            }
        };
        let mut units = Vec::with_capacity(len);
        let mut i = 0;
        while i < len {
            let c = bytes[i];
            let unit = match c >> 4 {
                0..=7 => {
                    i += 1;
                    u16::from(c)
                }
                12 | 13 => {
                    let b1 = *bytes.get(i + 1).ok_or(FormatError::MalformedUtf)?;
                    i += 2;
                    (u16::from(c & 0x1f) << 6) | continuation(b1)?
                }
                14 => {
                    let (Some(&b1), Some(&b2)) = (bytes.get(i + 1), bytes.get(i + 2)) else {
                        return Err(FormatError::MalformedUtf.into());
                    };
                    i += 3;
                    (u16::from(c & 0x0f) << 12) | (continuation(b1)? << 6) | continuation(b2)?
                }
                _ => return Err(FormatError::MalformedUtf.into()),
            };
            units.push(unit);
        }
        String::from_utf16(&units).map_err(|_| FormatError::MalformedUtf.into())
    }

    /// Parse a [`write_decimal`](crate::OutStream::write_decimal) record.
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidDecimal`] when the text does not parse as `D`.
    pub fn read_decimal<D: FromStr>(&mut self) -> Result<D> {
        let text = self.read_utf()?;
        match text.parse() {
            Ok(value) => Ok(value),
            Err(_) => Err(FormatError::InvalidDecimal(text).into()),
        }
    }

    // ── characters ──────────────────────────────────────────────────────

    #[must_use]
    pub fn charset(&self) -> Charset {
        self.charset.get()
    }

    pub fn set_charset(&mut self, charset: Charset) {
        self.charset.set(charset);
    }

    /// Next character through the charset, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidEncoding`] on a malformed sequence.
    pub fn read_char(&mut self) -> Result<Option<char>> {
        if let Some(ch) = self.char_pushback.pop() {
            return Ok(Some(ch));
        }
        let charset = self.charset.get();
        charset.codec().decode(self)
    }

    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn peek_char(&mut self) -> Result<Option<char>> {
        let ch = self.read_char()?;
        if let Some(ch) = ch {
            self.unread_char(ch);
        }
        Ok(ch)
    }

    pub fn unread_char(&mut self, ch: char) -> &mut Self {
        self.char_pushback.push(ch);
        self
    }

    /// Next line without its terminator (`\n`, `\r` or `\r\n`), or `None`
    /// at end of input. With `max`, at most that many characters are read.
    ///
    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn read_line(&mut self, max: Option<usize>) -> Result<Option<String>> {
        let max = max.unwrap_or(usize::MAX);
        let Some(first) = self.read_char()? else {
            return Ok(None);
        };
        let mut line = String::new();
        let mut next = Some(first);
        let mut count = 0;
        while let Some(ch) = next {
            if count >= max {
                self.unread_char(ch);
                break;
            }
            match ch {
                '\n' => break,
                '\r' => {
                    match self.read_char()? {
                        Some('\n') | None => {}
                        Some(other) => {
                            self.unread_char(other);
                        }
                    }
                    break;
                }
                _ => line.push(ch),
            }
            count += 1;
            next = self.read_char()?;
        }
        Ok(Some(line))
    }

    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn read_all_lines(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line(None)? {
            lines.push(line);
        }
        Ok(lines)
    }

    /// Call `f` with each remaining line, then close the stream. The stream
    /// is closed on failure too.
    ///
    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn each_line(&mut self, mut f: impl FnMut(&str)) -> Result<()> {
        let mut result = Ok(());
        loop {
            match self.read_line(None) {
                Ok(Some(line)) => f(&line),
                Ok(None) => break,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.close();
        result
    }

    /// The rest of the input decoded as text. With `normalize_newlines`,
    /// `\r\n` and lone `\r` become `\n`.
    ///
    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn read_all_str(&mut self, normalize_newlines: bool) -> Result<String> {
        let mut text = String::new();
        let mut after_cr = false;
        while let Some(ch) = self.read_char()? {
            if normalize_newlines {
                if after_cr && ch == '\n' {
                    after_cr = false;
                    continue;
                }
                after_cr = ch == '\r';
                if after_cr {
                    text.push('\n');
                    continue;
                }
            }
            text.push(ch);
        }
        Ok(text)
    }

    /// Next whitespace-delimited token; see
    /// [`read_str_token_with`](Self::read_str_token_with).
    ///
    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn read_str_token(&mut self, max: Option<usize>) -> Result<Option<String>> {
        self.read_str_token_with(max, |ch| matches!(ch, ' ' | '\t' | '\n' | '\r' | '\u{c}'))
    }

    /// Read characters until `is_terminator` matches one, which is pushed
    /// back, or until `max` characters were read. `None` at end of input.
    ///
    /// # Errors
    ///
    /// See [`read_char`](Self::read_char).
    pub fn read_str_token_with(
        &mut self,
        max: Option<usize>,
        mut is_terminator: impl FnMut(char) -> bool,
    ) -> Result<Option<String>> {
        let max = max.unwrap_or(usize::MAX);
        if max == 0 {
            return Ok(Some(String::new()));
        }
        let Some(mut ch) = self.read_char()? else {
            return Ok(None);
        };
        let mut token = String::new();
        let mut count = 0;
        loop {
            if is_terminator(ch) {
                self.unread_char(ch);
                break;
            }
            token.push(ch);
            count += 1;
            if count >= max {
                break;
            }
            match self.read_char()? {
                Some(next) => ch = next,
                None => break,
            }
        }
        Ok(Some(token))
    }

    /// Deserialize one JSON value from the rest of the input, decoded
    /// through the charset.
    ///
    /// # Errors
    ///
    /// [`BufError::Object`] when the text is not a valid `T`; decoding
    /// failures otherwise.
    #[cfg(feature = "serde")]
    pub fn read_obj<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        let text = self.read_all_str(false)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Parse `name=value` lines into a sorted map.
    ///
    /// The input is read as UTF-8 regardless of the installed charset, which
    /// is restored afterwards.
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidProps`] with the 1-based line number for a line
    /// carrying a name but no `=`; decoding failures otherwise.
    pub fn read_props(&mut self) -> Result<BTreeMap<String, String>> {
        let original = self.charset();
        self.set_charset(Charset::utf8());
        let props = PropsReader::default().run(self);
        self.set_charset(original);
        props
    }

    // ── lifecycle ───────────────────────────────────────────────────────

    /// Drop the source. Later reads fail with [`BufError::Unsupported`].
    pub fn close(&mut self) -> bool {
        self.source = None;
        self.pushback.clear();
        self.char_pushback.clear();
        true
    }
}

#[derive(Default)]
struct PropsReader {
    props: BTreeMap<String, String>,
    name: Option<String>,
    text: String,
    line: usize,
}

impl PropsReader {
    fn run(mut self, input: &mut InStream<'_>) -> Result<BTreeMap<String, String>> {
        self.line = 1;
        // whether the previous char allows a comment to start here
        let mut boundary = true;
        while let Some(ch) = input.read_char()? {
            match ch {
                '\n' | '\r' => {
                    if ch == '\r' && input.peek_char()? == Some('\n') {
                        input.read_char()?;
                    }
                    self.end_line()?;
                    boundary = true;
                    continue;
                }
                '/' if boundary => match input.peek_char()? {
                    Some('/') => {
                        skip_line(input)?;
                        self.end_line()?;
                        continue;
                    }
                    Some('*') => {
                        input.read_char()?;
                        self.line += skip_block(input)?;
                        boundary = true;
                        continue;
                    }
                    _ => self.text.push('/'),
                },
                '=' if self.name.is_none() => {
                    self.name = Some(String::from(self.text.trim()));
                    self.text.clear();
                }
                '\\' => self.escape(input)?,
                _ => self.text.push(ch),
            }
            boundary = ch.is_whitespace();
        }
        self.end_line()?;
        Ok(self.props)
    }

    fn escape(&mut self, input: &mut InStream<'_>) -> Result<()> {
        let Some(ch) = input.read_char()? else {
            return Err(FormatError::InvalidProps(self.line).into());
        };
        match ch {
            'n' => self.text.push('\n'),
            'r' => self.text.push('\r'),
            't' => self.text.push('\t'),
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = input
                        .read_char()?
                        .and_then(|c| c.to_digit(16))
                        .ok_or(FormatError::InvalidProps(self.line))?;
                    code = (code << 4) | digit;
                }
                let ch = char::from_u32(code).ok_or(FormatError::InvalidProps(self.line))?;
                self.text.push(ch);
            }
            '\n' | '\r' => {
                if ch == '\r' && input.peek_char()? == Some('\n') {
                    input.read_char()?;
                }
                self.line += 1;
                while let Some(next) = input.peek_char()? {
                    if next == ' ' || next == '\t' {
                        input.read_char()?;
                    } else {
                        break;
                    }
                }
            }
            other => self.text.push(other),
        }
        Ok(())
    }

    fn end_line(&mut self) -> Result<()> {
        match self.name.take() {
            Some(name) => {
                self.props.insert(name, String::from(self.text.trim()));
            }
            None if !self.text.trim().is_empty() => {
                return Err(FormatError::InvalidProps(self.line).into());
            }
            None => {}
        }
        self.text.clear();
        self.line += 1;
        Ok(())
    }
}

fn skip_line(input: &mut InStream<'_>) -> Result<()> {
    while let Some(ch) = input.read_char()? {
        if ch == '\n' {
            break;
        }
        if ch == '\r' {
            if input.peek_char()? == Some('\n') {
                input.read_char()?;
            }
            break;
        }
    }
    Ok(())
}

/// Skip a (nested) block comment whose `/*` was consumed; returns the
/// newlines crossed.
fn skip_block(input: &mut InStream<'_>) -> Result<usize> {
    let mut depth = 1;
    let mut lines = 0;
    let mut prev = '\0';
    while depth > 0 {
        let Some(ch) = input.read_char()? else {
            break;
        };
        match (prev, ch) {
            ('*', '/') => {
                depth -= 1;
                prev = '\0';
                continue;
            }
            ('/', '*') => {
                depth += 1;
                prev = '\0';
                continue;
            }
            (_, '\n') => lines += 1,
            _ => {}
        }
        prev = ch;
    }
    Ok(lines)
}

impl fmt::Debug for InStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InStream")
            .field("attached", &self.source.is_some())
            .field("pushback", &self.pushback.len())
            .field("charset", &self.charset)
            .finish()
    }
}

impl Source for InStream<'_> {
    fn read_bytes(&mut self, dst: &mut [u8]) -> Result<usize> {
        self.read_some(dst)
    }
}
