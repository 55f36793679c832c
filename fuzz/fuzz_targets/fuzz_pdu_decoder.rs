#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use async_agentx::codec::Header;
use async_agentx::pdu::Pdu;

fuzz_target!(|data: &[u8]| {
    let _ = Header::decode(data);

    // Anything that decodes must encode again
    if let Ok(pdu) = Pdu::decode(Bytes::copy_from_slice(data)) {
        let frame = pdu.encode().expect("decoded PDU re-encodes");
        let again = Pdu::decode(frame).expect("re-encoded PDU decodes");
        assert_eq!(again, pdu);
    }
});
