//! Fuzz target for the wire codec.
//!
//! `decode` must never panic, and anything it accepts must re-encode to a
//! stable frame.

#![no_main]

use libfuzzer_sys::fuzz_target;
use nt_bridge::codec::{decode, encode};

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = decode(data) {
        let frame = encode(&message).expect("decoded message must re-encode");
        let again = decode(&frame).expect("re-encoded frame must decode");
        // Compare bytes, not messages: NaN doubles are not equal to themselves
        assert_eq!(encode(&again).expect("re-encode"), frame);
    }
});
