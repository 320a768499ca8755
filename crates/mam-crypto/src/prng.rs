//! Deterministic trit PRNG capability.
//!
//! One PRNG instance, seeded out-of-band, drives all key generation for a
//! party: Merkle leaf secrets, session keys, ephemeral wrapping keys. The
//! same seed plus the same domain always reproduces the same output, which
//! is what makes stateless leaf re-derivation in the signature scheme work.

use hkdf::Hkdf;
use mam_proto::{Trit, Trits};
use sha2::Sha256;
use zeroize::Zeroize;

/// Label under which PRNG output is derived.
const PRNG_LABEL: &[u8] = b"mamPrngV1";

/// Deterministic pseudorandom trits from a seed and a domain.
///
/// The domain is a sequence of trit slices (name, index encodings, ...)
/// concatenated with length framing, so distinct domains never collide.
pub trait Prng {
    /// Produce `out_len` pseudorandom trits for the given domain.
    fn generate(&self, domain: &[&[Trit]], out_len: usize) -> Trits;

    /// Fill `out` with pseudorandom bytes for the given domain.
    ///
    /// Used where a primitive backend is byte-oriented (ephemeral wrapping
    /// keys).
    fn generate_bytes(&self, domain: &[&[Trit]], out: &mut [u8]);
}

/// HKDF-SHA256 reference implementation.
pub struct TritPrng {
    key: [u8; 32],
}

impl TritPrng {
    /// PRNG from a byte seed.
    #[must_use]
    pub fn from_seed(seed: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, seed);
        let mut key = [0u8; 32];
        let Ok(()) = hkdf.expand(PRNG_LABEL, &mut key) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };
        Self { key }
    }

    /// PRNG seeded from trit material.
    #[must_use]
    pub fn from_trits(seed: &[Trit]) -> Self {
        let bytes: Vec<u8> = seed.iter().map(|&t| (t + 1) as u8).collect();
        Self::from_seed(&bytes)
    }

    fn expand(&self, domain: &[&[Trit]], out: &mut [u8]) {
        let mut info = Vec::new();
        for part in domain {
            info.extend_from_slice(&(part.len() as u64).to_be_bytes());
            info.extend(part.iter().map(|&t| (t + 1) as u8));
        }

        let hkdf = Hkdf::<Sha256>::from_prk(&self.key)
            .unwrap_or_else(|_| unreachable!("PRK is exactly one hash length"));

        // HKDF-SHA256 caps a single expand at 255 * 32 bytes; chunk with a
        // block counter so arbitrarily long outputs stay within bounds.
        for (block, chunk) in out.chunks_mut(8160).enumerate() {
            let mut block_info = info.clone();
            block_info.extend_from_slice(&(block as u64).to_be_bytes());
            let Ok(()) = hkdf.expand(&block_info, chunk) else {
                unreachable!("chunk length is within HKDF-SHA256 bounds");
            };
        }
    }
}

impl Prng for TritPrng {
    fn generate(&self, domain: &[&[Trit]], out_len: usize) -> Trits {
        let mut bytes = vec![0u8; out_len];
        self.expand(domain, &mut bytes);
        let trits: Vec<Trit> = bytes.iter().map(|&b| (b % 3) as Trit - 1).collect();
        bytes.zeroize();
        Trits::from_slice(&trits).unwrap_or_default()
    }

    fn generate_bytes(&self, domain: &[&[Trit]], out: &mut [u8]) {
        self.expand(domain, out);
    }
}

impl Drop for TritPrng {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}
