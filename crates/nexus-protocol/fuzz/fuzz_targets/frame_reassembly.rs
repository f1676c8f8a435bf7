#![no_main]

use libfuzzer_sys::fuzz_target;
use nexus_protocol::FrameBuffer;

fuzz_target!(|data: &[u8]| {
    // First byte picks the read size so split headers get explored
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let read_size = usize::from(split).max(1);

    // Never panics, never buffers more than the input
    let mut buffer = FrameBuffer::with_max_body_len(64 * 1024);
    for chunk in rest.chunks(read_size) {
        if buffer.feed(chunk, |_| {}).is_err() {
            assert_eq!(buffer.buffered_len(), 0);
            return;
        }
        assert!(buffer.buffered_len() <= rest.len());
    }
});
