#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wirebuf::{BufError, Charset, MemBuf, PositionedBuffer, RegionBuf};

#[derive(Arbitrary, Debug)]
enum Op {
    Byte(u8),
    I2(i16),
    I4(i32),
    I8(i64),
    F8(f64),
    Utf(String),
    Chars(String),
    Seek(i64),
    Set(i64, u8),
    SetSize(u16),
    Charset(u8),
}

#[derive(Arbitrary, Debug)]
struct Input {
    region_len: u8,
    ops: Vec<Op>,
    raw: Vec<u8>,
}

fn apply<B: PositionedBuffer>(buf: &mut B, op: &Op) -> Result<(), BufError> {
    match op {
        Op::Byte(b) => {
            buf.out().write(i64::from(*b))?;
        }
        Op::I2(x) => {
            buf.out().write_i2(*x)?;
        }
        Op::I4(x) => {
            buf.out().write_i4(*x)?;
        }
        Op::I8(x) => {
            buf.out().write_i8(*x)?;
        }
        Op::F8(x) => {
            buf.out().write_f8(*x)?;
        }
        Op::Utf(s) => {
            buf.out().write_utf(s)?;
        }
        Op::Chars(s) => {
            buf.out().write_chars(s)?;
        }
        Op::Seek(p) => {
            buf.seek(*p)?;
        }
        Op::Set(p, b) => {
            buf.set(*p, i64::from(*b))?;
        }
        Op::SetSize(n) => buf.set_size(usize::from(*n))?,
        Op::Charset(which) => buf.set_charset(match which % 4 {
            0 => Charset::utf8(),
            1 => Charset::utf16be(),
            2 => Charset::utf16le(),
            _ => Charset::iso_8859_1(),
        }),
    }
    Ok(())
}

fuzz_target!(|input: Input| {
    let mut mem = MemBuf::new();
    let mut storage = vec![0u8; usize::from(input.region_len)];
    let mut region = RegionBuf::empty(&mut storage);

    for op in &input.ops {
        let _ = apply(&mut mem, op);
        if let Err(err) = apply(&mut region, op) {
            assert!(
                !matches!(err, BufError::Io(_) | BufError::Closed),
                "unexpected {err:?}"
            );
        }
        assert!(mem.pos() <= mem.size());
        assert!(region.pos() <= region.size() && region.size() <= region.capacity());
    }

    // Reading arbitrary bytes must fail cleanly, never panic.
    let mut raw = MemBuf::from(input.raw);
    let mut reader = raw.input();
    let _ = reader.read_utf();
    let _ = reader.read_props();
    let _ = reader.read_all_lines();
});
