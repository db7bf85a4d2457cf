//! Fuzz target: `FrameAssembler::push` followed by `protocol::decode`
//!
//! Streams arbitrary bytes through the inbound reassembler and decodes
//! every completed body, the same path the driver's poll loop takes.
//! Neither step may panic, and every accepted body must re-encode to
//! the bytes it was decoded from.
//!
//! cargo fuzz run fuzz_frame_assembler

#![no_main]

use airnode::protocol::codec::FrameAssembler;
use airnode::protocol::{INBOUND_FRAME_LEN, decode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut assembler = FrameAssembler::<INBOUND_FRAME_LEN>::new();

    for &byte in data {
        let Some(Ok(body)) = assembler.push(byte) else {
            continue;
        };
        assert_eq!(body.len(), INBOUND_FRAME_LEN - 2);
        if let Ok(packet) = decode(body) {
            assert_eq!(packet.encode().as_slice(), body);
        }
        assert!(assembler.pending() == 0);
    }

    assembler.reset();
    assert_eq!(assembler.pending(), 0);
});
