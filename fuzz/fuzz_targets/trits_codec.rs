//! Fuzz target for the trit data model and PB3 reader
//!
//! Covers digit validation, byte/trit conversion, and cursor reads with
//! arbitrary widths. No input may panic or over-read.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mam_proto::{Pb3Reader, Trits, bytes_to_trits, trits_to_bytes};

fuzz_target!(|data: &[u8]| {
    let trits: Vec<i8> = data.iter().map(|&b| b as i8).collect();

    if let Ok(valid) = Trits::from_slice(&trits) {
        // Byte conversion only succeeds on whole six-trit groups.
        let _ = trits_to_bytes(valid.as_slice());

        let mut r = Pb3Reader::new(valid.as_slice());
        let _ = r.read_flag();
        let _ = r.read_trint9();
        let _ = r.read_length();
        let _ = r.read_trits(r.remaining());
    }

    // Round trip through the byte encoding is total on byte input.
    let as_trits = bytes_to_trits(data);
    let back = trits_to_bytes(as_trits.as_slice()).expect("whole groups");
    assert_eq!(back, data);
});
