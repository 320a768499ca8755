//! Fuzz target for message decoding
//!
//! Feeds arbitrary trit streams (including out-of-range digits) into the
//! message decoder to find:
//! - Parser panics on malformed headers
//! - Over-reads past declared length prefixes
//! - Arithmetic overflow in trit/integer conversions
//!
//! The decoder should NEVER panic. All invalid inputs must return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mam_core::{Psk, PskRegistry, RecvMsgContext};
use mam_crypto::{HostAllocator, TritPrng};
use mam_proto::Trits;

fuzz_target!(|data: &[u8]| {
    // Map bytes to the full i8 range so digit validation is exercised too.
    let trits: Vec<i8> = data.iter().map(|&b| b as i8).collect();

    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"fuzz");
    let mut psks = PskRegistry::new();
    if let Ok(psk) = Psk::generate(&prng, Trits::zero(81)) {
        psks.add(psk);
    }

    if let Ok(ctx) = RecvMsgContext::new(&alloc) {
        let mut ctx = ctx.with_psks(&psks);
        let _ = ctx.decode(&trits);
    }
});
