use alloc::{string::String, vec::Vec};

use quickcheck::QuickCheck;

use crate::{MemBuf, PositionedBuffer, codec};

fn tests() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

/// Property: hex text decodes back to the bytes it was made from, and a
/// buffer built from it renders the same text.
#[test]
fn hex_roundtrip_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(bytes: Vec<u8>) -> bool {
        let text = codec::to_hex(&bytes);
        let Ok(decoded) = codec::from_hex(&text) else {
            return false;
        };
        let Ok(buf) = MemBuf::from_hex(&text) else {
            return false;
        };
        text.len() == bytes.len() * 2
            && decoded == bytes
            && buf.to_hex().is_ok_and(|again| again == text)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<u8>) -> bool);
}

/// Property: padded base64 output is a multiple of four characters and
/// decodes back to the original bytes.
#[test]
fn base64_roundtrip_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(bytes: Vec<u8>) -> bool {
        let text = codec::to_base64(&bytes);
        text.len() % 4 == 0
            && codec::from_base64(&text) == bytes
            && MemBuf::from_base64(&text).as_bytes() == bytes.as_slice()
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<u8>) -> bool);
}

/// Property: separators sprinkled between hex pairs are ignored.
#[test]
fn hex_skips_separators_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(bytes: Vec<u8>, seps: Vec<bool>) -> bool {
        let mut text = String::new();
        for (i, b) in bytes.iter().enumerate() {
            if seps.get(i).copied().unwrap_or(false) {
                text.push_str(" \n");
            }
            text.push_str(&codec::to_hex(&[*b]));
        }
        codec::from_hex(&text).is_ok_and(|decoded| decoded == bytes)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<u8>, Vec<bool>) -> bool);
}

/// Property: a slice is a copy of exactly the addressed bytes.
#[test]
fn slice_matches_vec_quickcheck() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(bytes: Vec<u8>, a: usize, b: usize) -> bool {
        if bytes.is_empty() {
            return true;
        }
        let (lo, hi) = (a % bytes.len(), b % bytes.len());
        let (lo, hi) = (lo.min(hi), lo.max(hi));
        let buf = MemBuf::from(bytes.clone());
        buf.slice(lo as i64..=hi as i64)
            .is_ok_and(|slice| slice.as_bytes() == &bytes[lo..=hi] && slice.pos() == 0)
    }

    QuickCheck::new()
        .tests(tests())
        .quickcheck(prop as fn(Vec<u8>, usize, usize) -> bool);
}
