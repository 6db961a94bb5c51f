#![no_main]

use libfuzzer_sys::fuzz_target;
use wirebuf::{MemBuf, PositionedBuffer, codec};

fuzz_target!(|data: &[u8]| {
    // Encoders must invert through the decoders for any bytes.
    let hex = codec::to_hex(data);
    assert_eq!(codec::from_hex(&hex).unwrap(), data);
    let base64 = codec::to_base64(data);
    assert_eq!(codec::from_base64(&base64), data);

    // Decoders must never panic on arbitrary text, and whatever they accept
    // must re-encode to something they accept again.
    if let Ok(text) = core::str::from_utf8(data) {
        if let Ok(bytes) = codec::from_hex(text) {
            let buf = MemBuf::from(bytes.clone());
            assert_eq!(codec::from_hex(&buf.to_hex().unwrap()).unwrap(), bytes);
        }
        let bytes = codec::from_base64(text);
        assert!(bytes.len() <= text.len());
    }
});
