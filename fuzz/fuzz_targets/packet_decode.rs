//! Fuzz target for packet decoding
//!
//! Arbitrary trit streams through the packet decoder: ordinal, length
//! prefix, ciphertext, checksum, and signature parsing must reject every
//! malformed input with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mam_core::RecvPacketContext;
use mam_crypto::HostAllocator;

fuzz_target!(|data: &[u8]| {
    let trits: Vec<i8> = data.iter().map(|&b| b as i8).collect();

    let alloc = HostAllocator;
    let signer_id = [0i8; 243];
    let session_key = [0i8; 243];

    if let Ok(mut ctx) = RecvPacketContext::new(&alloc, &signer_id, &session_key) {
        let _ = ctx.decode(&trits);
    }
});
