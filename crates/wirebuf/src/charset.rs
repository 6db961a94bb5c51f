//! Pluggable character encodings.
//!
//! A [`Charset`] is a cheap handle around a [`CharCodec`]. Writers hand each
//! character to the codec, which emits bytes through [`OutStream::w`]; readers
//! ask the codec to pull one character worth of bytes through
//! [`InStream::read`]. Neither stream knows any text encoding of its own.

use alloc::{rc::Rc, sync::Arc};
use core::{cell::RefCell, fmt};

use crate::{
    error::{BufError, FormatError, Result},
    in_stream::InStream,
    out_stream::OutStream,
};

/// Capability to translate between characters and bytes for one encoding.
pub trait CharCodec: Send + Sync {
    /// Canonical name, e.g. `"UTF-8"`.
    fn name(&self) -> &str;

    /// Encode `ch` by writing its bytes through `out.w`.
    ///
    /// # Errors
    ///
    /// Whatever the underlying sink reports.
    fn encode(&self, ch: char, out: &mut OutStream<'_>) -> Result<()>;

    /// Decode one character, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// [`FormatError::InvalidEncoding`] on a malformed or truncated sequence.
    fn decode(&self, input: &mut InStream<'_>) -> Result<Option<char>>;
}

#[derive(Clone)]
pub struct Charset {
    codec: Arc<dyn CharCodec>,
}

impl Charset {
    #[must_use]
    pub fn utf8() -> Self {
        Self::from_codec(Arc::new(Utf8))
    }

    #[must_use]
    pub fn utf16be() -> Self {
        Self::from_codec(Arc::new(Utf16 { big_endian: true }))
    }

    #[must_use]
    pub fn utf16le() -> Self {
        Self::from_codec(Arc::new(Utf16 { big_endian: false }))
    }

    #[must_use]
    pub fn iso_8859_1() -> Self {
        Self::from_codec(Arc::new(Latin1))
    }

    /// Wrap a custom codec.
    #[must_use]
    pub fn from_codec(codec: Arc<dyn CharCodec>) -> Self {
        Self { codec }
    }

    /// Look up a built-in charset by name, ignoring case and `-`/`_`.
    ///
    /// # Errors
    ///
    /// [`BufError::Arg`] for names that are not built in.
    pub fn for_name(name: &str) -> Result<Self> {
        let key: alloc::string::String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "utf8" => Ok(Self::utf8()),
            "utf16be" => Ok(Self::utf16be()),
            "utf16le" => Ok(Self::utf16le()),
            "iso88591" | "latin1" => Ok(Self::iso_8859_1()),
            _ => Err(BufError::Arg(alloc::format!("unknown charset: {name}"))),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.codec.name()
    }

    pub(crate) fn codec(&self) -> &dyn CharCodec {
        &*self.codec
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::utf8()
    }
}

impl PartialEq for Charset {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl Eq for Charset {}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Charset").field(&self.name()).finish()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One charset cell shared by a buffer and the streams bound to it.
///
/// Cloning the handle shares the cell; setting through any clone is seen by
/// all of them.
#[derive(Clone, Default)]
pub struct SharedCharset(Rc<RefCell<Charset>>);

impl SharedCharset {
    #[must_use]
    pub fn new(charset: Charset) -> Self {
        Self(Rc::new(RefCell::new(charset)))
    }

    #[must_use]
    pub fn get(&self) -> Charset {
        self.0.borrow().clone()
    }

    pub fn set(&self, charset: Charset) {
        *self.0.borrow_mut() = charset;
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn same_cell(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for SharedCharset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0.borrow(), f)
    }
}

struct Utf8;

impl CharCodec for Utf8 {
    fn name(&self) -> &str {
        "UTF-8"
    }

    fn encode(&self, ch: char, out: &mut OutStream<'_>) -> Result<()> {
        let mut tmp = [0u8; 4];
        for &b in ch.encode_utf8(&mut tmp).as_bytes() {
            out.w(b)?;
        }
        Ok(())
    }

    fn decode(&self, input: &mut InStream<'_>) -> Result<Option<char>> {
        const INVALID: FormatError = FormatError::InvalidEncoding("UTF-8");

        let Some(b0) = input.read()? else {
            return Ok(None);
        };
        let (len, init) = match b0 {
            0x00..=0x7f => return Ok(Some(b0 as char)),
            0xc0..=0xdf => (2, u32::from(b0 & 0x1f)),
            0xe0..=0xef => (3, u32::from(b0 & 0x0f)),
            0xf0..=0xf7 => (4, u32::from(b0 & 0x07)),
            _ => return Err(INVALID.into()),
        };
        let mut code = init;
        for _ in 1..len {
            let b = input.read()?.ok_or(INVALID)?;
            if b & 0xc0 != 0x80 {
                return Err(INVALID.into());
            }
            code = (code << 6) | u32::from(b & 0x3f);
        }
        char::from_u32(code).map(Some).ok_or(INVALID.into())
    }
}

struct Utf16 {
    big_endian: bool,
}

impl Utf16 {
    fn read_unit(&self, input: &mut InStream<'_>) -> Result<Option<u16>> {
        let Some(a) = input.read()? else {
            return Ok(None);
        };
        let b = input
            .read()?
            .ok_or(FormatError::InvalidEncoding(self.label()))?;
        Ok(Some(if self.big_endian {
            u16::from_be_bytes([a, b])
        } else {
            u16::from_le_bytes([a, b])
        }))
    }

    fn label(&self) -> &'static str {
        if self.big_endian { "UTF-16BE" } else { "UTF-16LE" }
    }
}

impl CharCodec for Utf16 {
    fn name(&self) -> &str {
        self.label()
    }

    fn encode(&self, ch: char, out: &mut OutStream<'_>) -> Result<()> {
        let mut units = [0u16; 2];
        for unit in ch.encode_utf16(&mut units) {
            let bytes = if self.big_endian {
                unit.to_be_bytes()
            } else {
                unit.to_le_bytes()
            };
            out.w(bytes[0])?.w(bytes[1])?;
        }
        Ok(())
    }

    fn decode(&self, input: &mut InStream<'_>) -> Result<Option<char>> {
        let invalid = FormatError::InvalidEncoding(self.label());
        let Some(first) = self.read_unit(input)? else {
            return Ok(None);
        };
        let mut units = alloc::vec![first];
        if (0xd800..0xdc00).contains(&first) {
            units.push(self.read_unit(input)?.ok_or(invalid.clone())?);
        }
        match char::decode_utf16(units).next() {
            Some(Ok(ch)) => Ok(Some(ch)),
            _ => Err(invalid.into()),
        }
    }
}

struct Latin1;

impl CharCodec for Latin1 {
    fn name(&self) -> &str {
        "ISO-8859-1"
    }

    fn encode(&self, ch: char, out: &mut OutStream<'_>) -> Result<()> {
        let b = u8::try_from(u32::from(ch)).unwrap_or(b'?');
        out.w(b)?;
        Ok(())
    }

    fn decode(&self, input: &mut InStream<'_>) -> Result<Option<char>> {
        Ok(input.read()?.map(char::from))
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::String, vec::Vec};

    use rstest::rstest;

    use super::*;
    use crate::{buffer::MemBuf, PositionedBuffer};

    fn encode_with(charset: Charset, text: &str) -> Vec<u8> {
        let mut buf = MemBuf::new();
        buf.set_charset(charset);
        buf.out().write_chars(text).unwrap();
        buf.as_bytes().to_vec()
    }

    #[rstest]
    #[case(Charset::utf8(), "a\u{e9}\u{20ac}", vec![0x61, 0xc3, 0xa9, 0xe2, 0x82, 0xac])]
    #[case(Charset::utf16be(), "a\u{1f600}", vec![0x00, 0x61, 0xd8, 0x3d, 0xde, 0x00])]
    #[case(Charset::utf16le(), "a\u{e9}", vec![0x61, 0x00, 0xe9, 0x00])]
    #[case(Charset::iso_8859_1(), "a\u{e9}\u{20ac}", vec![0x61, 0xe9, b'?'])]
    fn encodes(#[case] charset: Charset, #[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(encode_with(charset, text), expected);
    }

    #[rstest]
    #[case(Charset::utf8())]
    #[case(Charset::utf16be())]
    #[case(Charset::utf16le())]
    fn decodes_what_it_encodes(#[case] charset: Charset) {
        let text = "x\u{e9}\u{20ac}\u{1f600}\n";
        let mut buf = MemBuf::from(encode_with(charset.clone(), text));
        buf.set_charset(charset);
        let decoded: String = buf.input().read_all_str(false).unwrap();
        assert_eq!(decoded, text);
    }

    #[test]
    fn utf8_rejects_truncated_sequence() {
        let mut buf = MemBuf::from(alloc::vec![0xe2, 0x82]);
        let err = buf.input().read_char().unwrap_err();
        assert!(matches!(
            err,
            BufError::Format(FormatError::InvalidEncoding("UTF-8"))
        ));
    }

    #[test]
    fn for_name_is_forgiving() {
        assert_eq!(Charset::for_name("utf-8").unwrap(), Charset::utf8());
        assert_eq!(Charset::for_name("UTF_16BE").unwrap(), Charset::utf16be());
        assert_eq!(Charset::for_name("Latin1").unwrap(), Charset::iso_8859_1());
        assert!(matches!(Charset::for_name("EBCDIC"), Err(BufError::Arg(_))));
    }

    #[test]
    fn shared_cell_is_shared() {
        let a = SharedCharset::default();
        let b = a.clone();
        b.set(Charset::utf16le());
        assert_eq!(a.get(), Charset::utf16le());
        assert!(a.same_cell(&b));
        assert!(!a.same_cell(&SharedCharset::default()));
    }
}
