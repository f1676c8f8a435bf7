#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use nexus_protocol::{Frame, Packet};

fuzz_target!(|data: &[u8]| {
    let Some((&packet_type, body)) = data.split_first() else {
        return;
    };

    let frame = Frame {
        packet_type,
        body: Bytes::copy_from_slice(body),
    };

    // Decoding must only ever return Err for invalid bodies
    if let Ok(packet) = Packet::decode(frame) {
        // Whatever decoded must re-encode into a decodable frame
        let again = Packet::decode(packet.to_frame());
        assert!(again.is_ok());
    }
});
