//! Sponge capability: the absorb/squeeze hash-and-encrypt state machine.
//!
//! The protocol core treats the sponge as opaque: it absorbs wire fields as
//! they are written or read, squeezes digests and MACs, and encrypts or
//! decrypts payloads against the running state. Because both sides drive
//! their sponge through the identical sequence of operations, their states
//! stay in lockstep and the keystream lines up.
//!
//! Instances come from a [`SpongeAllocator`], a capability object injected
//! into every component that needs one, so no global allocator state
//! exists and each concurrent context owns a fresh instance.

use hmac::{Hmac, Mac};
use mam_proto::{Trit, Trits, add_mod3, sub_mod3};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::errors::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Width of a squeezed digest in trits.
pub const HASH_SIZE: usize = 243;

// Domain-separation tags for state updates
const TAG_ABSORB: u8 = 0x01;
const TAG_SQUEEZE: u8 = 0x02;
const TAG_ADVANCE: u8 = 0x03;
const TAG_KEYSTREAM: u8 = 0x04;

/// Absorb/squeeze/encrypt/decrypt contract consumed by the protocol core.
///
/// Every operation advances the internal state; encrypt and decrypt are
/// symmetric (both absorb the ciphertext after producing it), so a sender
/// and a receiver that process the same wire sequence share state at every
/// point.
pub trait Sponge {
    /// Mix data into the state.
    fn absorb(&mut self, data: &[Trit]);

    /// Produce `n` pseudorandom trits and advance the state.
    fn squeeze(&mut self, n: usize) -> Trits;

    /// Encrypt under the current state; the ciphertext is absorbed.
    fn encrypt(&mut self, plain: &[Trit]) -> Trits;

    /// Inverse of [`Sponge::encrypt`] against the same state sequence.
    fn decrypt(&mut self, cipher: &[Trit]) -> Trits;

    /// Return the state to its initial value.
    fn reset(&mut self);
}

/// Capability object supplying sponge instances.
///
/// Passed explicitly to every component that needs a sponge. Release is
/// guaranteed on every exit path because instances are owned boxes; the
/// explicit [`SpongeAllocator::destroy_sponge`] hook exists for providers
/// that pool or track instances.
pub trait SpongeAllocator {
    /// Obtain a fresh sponge in its initial state.
    fn create_sponge(&self) -> Result<Box<dyn Sponge>, CryptoError>;

    /// Return a sponge to the provider. The default drops it, scrubbing
    /// state via the instance's own `Drop`.
    fn destroy_sponge(&self, sponge: Box<dyn Sponge>) {
        drop(sponge);
    }
}

/// Default allocator: hands out [`HashSponge`] instances.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostAllocator;

impl SpongeAllocator for HostAllocator {
    fn create_sponge(&self) -> Result<Box<dyn Sponge>, CryptoError> {
        Ok(Box::new(HashSponge::new()))
    }
}

/// Reference sponge built on HMAC-SHA256 state updates.
///
/// The keystream is defined by this implementation alone; the protocol
/// core treats the primitive as opaque and only depends on both sides
/// driving the same state machine.
pub struct HashSponge {
    state: [u8; 32],
}

impl HashSponge {
    /// Sponge in the all-zero initial state.
    #[must_use]
    pub fn new() -> Self {
        Self { state: [0u8; 32] }
    }

    fn update(&mut self, tag: u8, data: &[u8]) {
        self.state = mac(&self.state, tag, data);
    }

    /// Pseudorandom trits from the current state without advancing it.
    fn keystream(&self, tag: u8, n: usize) -> Vec<Trit> {
        let mut out = Vec::with_capacity(n);
        let mut counter: u64 = 0;
        while out.len() < n {
            let block = mac(&self.state, tag, &counter.to_be_bytes());
            for b in block {
                if out.len() == n {
                    break;
                }
                out.push((b % 3) as Trit - 1);
            }
            counter += 1;
        }
        out
    }
}

impl Default for HashSponge {
    fn default() -> Self {
        Self::new()
    }
}

impl Sponge for HashSponge {
    fn absorb(&mut self, data: &[Trit]) {
        let mut bytes: Vec<u8> = data.iter().map(|&t| (t + 1) as u8).collect();
        bytes.extend_from_slice(&(data.len() as u64).to_be_bytes());
        self.update(TAG_ABSORB, &bytes);
    }

    fn squeeze(&mut self, n: usize) -> Trits {
        let out = self.keystream(TAG_SQUEEZE, n);
        self.update(TAG_ADVANCE, &(n as u64).to_be_bytes());
        Trits::from_slice(&out).unwrap_or_default()
    }

    fn encrypt(&mut self, plain: &[Trit]) -> Trits {
        let ks = self.keystream(TAG_KEYSTREAM, plain.len());
        let cipher: Vec<Trit> =
            plain.iter().zip(&ks).map(|(&p, &k)| add_mod3(p, k)).collect();
        self.absorb(&cipher);
        Trits::from_slice(&cipher).unwrap_or_default()
    }

    fn decrypt(&mut self, cipher: &[Trit]) -> Trits {
        let ks = self.keystream(TAG_KEYSTREAM, cipher.len());
        let plain: Vec<Trit> =
            cipher.iter().zip(&ks).map(|(&c, &k)| sub_mod3(c, k)).collect();
        self.absorb(cipher);
        Trits::from_slice(&plain).unwrap_or_default()
    }

    fn reset(&mut self) {
        self.state.zeroize();
    }
}

impl Drop for HashSponge {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

fn mac(key: &[u8; 32], tag: u8, data: &[u8]) -> [u8; 32] {
    let Ok(mut m) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    m.update(&[tag]);
    m.update(data);
    let digest = m.finalize().into_bytes();

    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// One-shot hash: absorb each part in order, squeeze a 243-trit digest.
///
/// The sponge is created from and returned to the allocator inside the
/// call, so the caller never holds an instance.
pub fn sponge_hash(
    allocator: &dyn SpongeAllocator,
    parts: &[&[Trit]],
) -> Result<Trits, CryptoError> {
    let mut sponge = allocator.create_sponge()?;
    for part in parts {
        sponge.absorb(part);
    }
    let digest = sponge.squeeze(HASH_SIZE);
    allocator.destroy_sponge(sponge);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> HashSponge {
        HashSponge::new()
    }

    #[test]
    fn absorb_changes_squeeze_output() {
        let mut a = fresh();
        let mut b = fresh();
        b.absorb(&[1, 0, -1]);

        assert_ne!(a.squeeze(81), b.squeeze(81));
    }

    #[test]
    fn identical_op_sequences_share_state() {
        let mut a = fresh();
        let mut b = fresh();
        for s in [&mut a, &mut b] {
            s.absorb(&[1, 1, -1, 0]);
            let _ = s.squeeze(10);
            s.absorb(&[0, 0, 1]);
        }
        assert_eq!(a.squeeze(243), b.squeeze(243));
    }

    #[test]
    fn encrypt_decrypt_are_symmetric() {
        let digits: Vec<i8> = (0i8..54).map(|i| (i % 3) - 1).collect();
        let plain = Trits::from_slice(&digits).unwrap();

        let mut tx = fresh();
        tx.absorb(&[1, 1]); // shared key material
        let cipher = tx.encrypt(plain.as_slice());
        assert_ne!(cipher, plain);

        let mut rx = fresh();
        rx.absorb(&[1, 1]);
        let recovered = rx.decrypt(cipher.as_slice());
        assert_eq!(recovered, plain);

        // Both sides end in the same state
        assert_eq!(tx.squeeze(27), rx.squeeze(27));
    }

    #[test]
    fn different_keys_give_different_ciphertext() {
        let plain = [0i8; 24];

        let mut a = fresh();
        a.absorb(&[1]);
        let mut b = fresh();
        b.absorb(&[-1]);

        assert_ne!(a.encrypt(&plain), b.encrypt(&plain));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = fresh();
        s.absorb(&[1, 1, 1]);
        s.reset();
        assert_eq!(s.squeeze(81), fresh().squeeze(81));
    }

    #[test]
    fn hash_is_deterministic_and_domain_sensitive() {
        let alloc = HostAllocator;
        let h1 = sponge_hash(&alloc, &[&[1, 0], &[-1]]).unwrap();
        let h2 = sponge_hash(&alloc, &[&[1, 0], &[-1]]).unwrap();
        let h3 = sponge_hash(&alloc, &[&[1], &[0, -1]]).unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3, "part boundaries must be domain separated");
        assert_eq!(h1.len(), HASH_SIZE);
    }
}
