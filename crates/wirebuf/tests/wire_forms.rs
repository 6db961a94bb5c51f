#![expect(missing_docs)]

mod common;

use rstest::rstest;
use wirebuf::{
    BufError, Charset, FormatError, MemBuf, OutStream, PositionedBuffer, RegionBuf, codec,
};

use crate::common::written;

#[rstest]
#[case(0)]
#[case(1)]
#[case(-1)]
#[case(i32::MAX)]
#[case(i32::MIN)]
#[case(0x1234_5678)]
fn i4_reassembles(#[case] x: i32) {
    let bytes = written(|buf| {
        buf.out().write_i4(x).unwrap();
    });
    assert_eq!(bytes.len(), 4);
    let back = (u32::from(bytes[0]) << 24)
        | (u32::from(bytes[1]) << 16)
        | (u32::from(bytes[2]) << 8)
        | u32::from(bytes[3]);
    assert_eq!(back as i32, x);
}

#[rstest]
#[case("", &[0x00, 0x00])]
#[case("A", &[0x00, 0x01, 0x41])]
#[case("\u{800}", &[0x00, 0x03, 0xe0, 0xa0, 0x80])]
fn utf_wire_form(#[case] s: &str, #[case] expected: &[u8]) {
    let bytes = written(|buf| {
        buf.out().write_utf(s).unwrap();
    });
    assert_eq!(bytes, expected);
}

#[test]
fn utf_too_big_is_format_error() {
    let mut buf = MemBuf::new();
    let err = buf.out().write_utf(&"\u{800}".repeat(21_846)).unwrap_err();
    assert!(matches!(err, BufError::Format(FormatError::StringTooBig(_))));
    assert!(buf.is_empty());
}

#[rstest]
#[case("ab", &[0xab])]
#[case("zzab", &[0xab])]
#[case("CAFE babe", &[0xca, 0xfe, 0xba, 0xbe])]
fn from_hex_cases(#[case] text: &str, #[case] expected: &[u8]) {
    assert_eq!(codec::from_hex(text).unwrap(), expected);
    assert_eq!(MemBuf::from_hex(text).unwrap().as_bytes(), expected);
}

#[test]
fn from_hex_odd_digit_fails() {
    assert!(matches!(
        codec::from_hex("a"),
        Err(BufError::Format(FormatError::InvalidHex))
    ));
}

#[rstest]
#[case("QQ==", &[0x41])]
#[case("QUJD", b"ABC")]
#[case("QU JD\n", b"ABC")]
#[case("QUI", b"AB")]
#[case("Q===", &[])]
fn from_base64_cases(#[case] text: &str, #[case] expected: &[u8]) {
    assert_eq!(codec::from_base64(text), expected);
}

#[test]
fn props_restore_callers_charset() {
    let mut buf = MemBuf::new();
    buf.set_charset(Charset::utf16be());
    buf.out().write_props([("k", "v=1"), ("a", "1")]).unwrap();
    assert_eq!(buf.as_bytes(), b"a=1\nk=v\\u003d1\n");
    assert_eq!(buf.charset(), Charset::utf16be());
}

#[test]
fn writer_without_sink_is_unsupported() {
    let mut out = OutStream::detached();
    assert!(matches!(out.write(0), Err(BufError::Unsupported(_))));
    assert!(matches!(out.write_f8(1.0), Err(BufError::Unsupported(_))));
    assert!(matches!(out.print(&"x"), Err(BufError::Unsupported(_))));
}

#[test]
fn charset_change_is_shared() {
    let mut buf = MemBuf::new();
    buf.out().set_charset(Charset::iso_8859_1());
    assert_eq!(buf.charset(), Charset::iso_8859_1());
    buf.out().write_chars("\u{e9}").unwrap();
    assert_eq!(buf.as_bytes(), &[0xe9]);
    buf.flip().unwrap();
    let mut input = buf.input();
    assert_eq!(input.charset(), Charset::iso_8859_1());
    assert_eq!(input.read_char().unwrap(), Some('\u{e9}'));
}

#[test]
fn region_overflow_is_capacity_error() {
    let mut storage = [0u8; 6];
    let mut buf = RegionBuf::empty(&mut storage);
    buf.out().write_i4(7).unwrap();
    let err = buf.out().write_i4(8).unwrap_err();
    assert!(matches!(err, BufError::Capacity { capacity: 6 }), "{err:?}");
    assert_eq!(buf.size(), 6);
}

#[test]
fn slices_are_detached_from_source() {
    let mut buf = MemBuf::from(b"0123456789".to_vec());
    let slice = buf.slice(2..=5).unwrap();
    assert_eq!(slice.size(), 4);
    buf.set(3, 0).unwrap();
    assert_eq!(slice.as_bytes(), b"2345");
}
