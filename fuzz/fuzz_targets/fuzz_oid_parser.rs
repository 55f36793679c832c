#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_agentx::codec::{ByteOrder, Decoder};
use async_agentx::oid::Oid;

fuzz_target!(|data: &[u8]| {
    // Fuzz OID from the wire encoding in both byte orders
    for order in [ByteOrder::Network, ByteOrder::Little] {
        let mut decoder = Decoder::new(Bytes::copy_from_slice(data), order);
        let _ = decoder.read_oid();
    }

    // Fuzz OID from dotted string notation (if data is valid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Oid::parse(s);
    }
});
