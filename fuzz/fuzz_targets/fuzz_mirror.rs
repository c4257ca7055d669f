//! Fuzz target for the peer mirror.
//!
//! Feeds the input as a sequence of length-prefixed frames. The mirror must
//! never panic and a rejected frame must leave it unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nt_bridge::PeerMirror;

fuzz_target!(|data: &[u8]| {
    let mut mirror = PeerMirror::new();
    let mut rest = data;

    while let Some((&len, tail)) = rest.split_first() {
        let len = (len as usize).min(tail.len());
        let (frame, tail) = tail.split_at(len);
        rest = tail;

        let before = mirror.len();
        if mirror.apply(frame).is_err() {
            assert_eq!(mirror.len(), before);
        }
    }
});
