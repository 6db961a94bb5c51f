#![allow(missing_docs)]
#![allow(dead_code)]

use core::fmt::Write;

use wirebuf::{MemBuf, PositionedBuffer};

/// Bytes as rows of 16 space-separated hex pairs.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for row in bytes.chunks(16) {
        let line: Vec<String> = row.iter().map(|b| format!("{b:02x}")).collect();
        writeln!(out, "{}", line.join(" ")).unwrap();
    }
    out
}

/// Text produced by `write_props` for `pairs`, keeping the sink open.
pub fn render_props(pairs: &[(&str, &str)]) -> String {
    let mut buf = MemBuf::new();
    buf.out().write_props_with(pairs.iter().copied(), false).unwrap();
    String::from_utf8(buf.into_vec()).unwrap()
}

/// Whatever `write` puts into a fresh buffer.
pub fn written(write: impl FnOnce(&mut MemBuf)) -> Vec<u8> {
    let mut buf = MemBuf::new();
    write(&mut buf);
    assert_eq!(buf.pos(), buf.size());
    buf.into_vec()
}
