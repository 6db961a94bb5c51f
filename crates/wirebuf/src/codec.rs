//! Hex and base64 tables and the pure encode/decode algorithms over them.
//!
//! Decoding is lenient in the places where text is commonly
//! decorated: separators between hex pairs and any character outside the
//! base64 alphabet are skipped. Hex is strict about a dangling nibble; base64
//! is not strict about a short final group.

use alloc::{string::String, vec::Vec};

use crate::error::{FormatError, Result};

pub(crate) const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

pub(crate) const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const BASE64_PAD: u8 = b'=';

/// ASCII -> nibble, `-1` for anything outside `0-9a-fA-F`.
static HEX_INV: [i8; 128] = build_hex_inv();

/// ASCII -> 6-bit code, `-1` outside the alphabet. `=` maps to zero.
static BASE64_INV: [i8; 128] = build_base64_inv();

const fn build_hex_inv() -> [i8; 128] {
    let mut inv = [-1i8; 128];
    let mut i = 0;
    while i < 10 {
        inv[b'0' as usize + i] = i as i8;
        i += 1;
    }
    let mut i = 10;
    while i < 16 {
        inv[b'a' as usize + i - 10] = i as i8;
        inv[b'A' as usize + i - 10] = i as i8;
        i += 1;
    }
    inv
}

const fn build_base64_inv() -> [i8; 128] {
    let mut inv = [-1i8; 128];
    let mut i = 0;
    while i < BASE64_CHARS.len() {
        inv[BASE64_CHARS[i] as usize] = i as i8;
        i += 1;
    }
    inv[BASE64_PAD as usize] = 0;
    inv
}

#[inline]
fn hex_val(c: char) -> Option<u8> {
    let code = c as usize;
    if code < HEX_INV.len() && HEX_INV[code] >= 0 {
        Some(HEX_INV[code] as u8)
    } else {
        None
    }
}

#[inline]
fn base64_val(c: char) -> Option<u32> {
    let code = c as usize;
    if code < BASE64_INV.len() && BASE64_INV[code] >= 0 {
        Some(BASE64_INV[code] as u32)
    } else {
        None
    }
}

/// Encode `bytes` as lowercase hex, two digits per byte.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    s
}

/// Decode hex text.
///
/// Characters that are not hex digits are skipped while looking for the first
/// nibble of a pair, so `"ca:fe"` and `"ca fe"` both decode. Once a first
/// nibble is found the very next character must complete the pair.
///
/// # Errors
///
/// [`FormatError::InvalidHex`] when a first nibble is followed by a non-hex
/// character or by the end of input.
pub fn from_hex(text: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() / 2);
    let mut chars = text.chars();
    while let Some(c0) = chars.next() {
        let Some(n0) = hex_val(c0) else {
            continue;
        };
        let n1 = chars
            .next()
            .and_then(hex_val)
            .ok_or(FormatError::InvalidHex)?;
        out.push((n0 << 4) | n1);
    }
    Ok(out)
}

/// Encode `bytes` as standard base64 with `=` padding.
#[must_use]
pub fn to_base64(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for group in bytes.chunks(3) {
        let b0 = u32::from(group[0]);
        let b1 = group.get(1).copied().map_or(0, u32::from);
        let b2 = group.get(2).copied().map_or(0, u32::from);
        let n = (b0 << 16) | (b1 << 8) | b2;
        s.push(BASE64_CHARS[((n >> 18) & 0x3f) as usize] as char);
        s.push(BASE64_CHARS[((n >> 12) & 0x3f) as usize] as char);
        if group.len() > 1 {
            s.push(BASE64_CHARS[((n >> 6) & 0x3f) as usize] as char);
        } else {
            s.push(BASE64_PAD as char);
        }
        if group.len() > 2 {
            s.push(BASE64_CHARS[(n & 0x3f) as usize] as char);
        } else {
            s.push(BASE64_PAD as char);
        }
    }
    s
}

/// Decode base64 text.
///
/// Input is consumed in groups of up to four symbols of the 65-symbol
/// alphabet (`A-Z a-z 0-9 + / =`); anything else is skipped without using a
/// slot. A pad occupies a slot but contributes no bits. With `v` non-pad
/// symbols in a group, the first byte is emitted when `v > 1`, the second when
/// `v > 2` and the third when `v > 3`. A short final group yields fewer bytes
/// instead of an error, and a lone symbol followed only by pads yields none.
#[must_use]
pub fn from_base64(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 6 / 8);
    let mut chars = text.chars().peekable();
    while chars.peek().is_some() {
        let mut n = 0u32;
        let mut v = 0;
        let mut slot = 0;
        while slot < 4 {
            let Some(ch) = chars.next() else {
                break;
            };
            let Some(code) = base64_val(ch) else {
                continue;
            };
            n |= code << (18 - slot * 6);
            slot += 1;
            if ch != BASE64_PAD as char {
                v += 1;
            }
        }

        if v > 1 {
            out.push((n >> 16) as u8);
        }
        if v > 2 {
            out.push((n >> 8) as u8);
        }
        if v > 3 {
            out.push(n as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use rstest::rstest;

    use super::*;
    use crate::error::BufError;

    #[rstest]
    #[case("ab", vec![0xab])]
    #[case("AB", vec![0xab])]
    #[case("zzab", vec![0xab])]
    #[case("ca fe:BA-be", vec![0xca, 0xfe, 0xba, 0xbe])]
    #[case("", vec![])]
    #[case("\u{00e9}0f", vec![0x0f])]
    fn hex_decodes(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(from_hex(text).unwrap(), expected);
    }

    #[rstest]
    #[case("a")]
    #[case("abc")]
    #[case("a g")]
    #[case("0x1")]
    fn hex_rejects_dangling_nibble(#[case] text: &str) {
        let err = from_hex(text).unwrap_err();
        assert!(matches!(err, BufError::Format(FormatError::InvalidHex)));
    }

    #[test]
    fn hex_encodes_lowercase() {
        assert_eq!(to_hex(&[0x00, 0x0f, 0xab, 0xff]), "000fabff");
        assert_eq!(to_hex(&[]), "");
    }

    #[rstest]
    #[case("QQ==", vec![0x41])]
    #[case("QUI=", vec![0x41, 0x42])]
    #[case("QUJD", vec![0x41, 0x42, 0x43])]
    #[case("QUJD\r\nRA==", vec![0x41, 0x42, 0x43, 0x44])]
    #[case("QQ", vec![0x41])]
    #[case("Q", vec![])]
    #[case("Q===", vec![])]
    #[case("", vec![])]
    #[case("****", vec![])]
    fn base64_decodes_leniently(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(from_base64(text), expected);
    }

    #[rstest]
    #[case(b"", "")]
    #[case(b"A", "QQ==")]
    #[case(b"AB", "QUI=")]
    #[case(b"ABC", "QUJD")]
    #[case(b"hello world", "aGVsbG8gd29ybGQ=")]
    fn base64_encodes_with_padding(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(to_base64(bytes), expected);
    }

    #[test]
    fn base64_full_alphabet() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(from_base64(&to_base64(&bytes)), bytes);
    }
}
