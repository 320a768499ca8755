//! Winternitz-style one-time signatures over trits.
//!
//! The leaf signature primitive of the Merkle scheme. Secret segments are
//! derived on demand from the PRNG (nothing is stored between calls), each
//! segment is advanced along a hash chain by the corresponding message
//! tryte, and the public key is the digest of the fully-advanced chains. A
//! three-tryte checksum over the chain positions closes the usual
//! Winternitz forgery gap.
//!
//! Signing is one-time by construction: the caller (the Merkle layer) must
//! never sign two digests under the same derivation nonce.

use mam_proto::{Pb3Writer, Trit, Trits};
use zeroize::Zeroize;

use crate::{
    errors::CryptoError,
    prng::Prng,
    sponge::{HASH_SIZE, Sponge, SpongeAllocator},
};

/// Trytes in a message digest (243 trits / 3).
const MSG_TRYTES: usize = 81;

/// Trytes carrying the chain-position checksum.
const CHECKSUM_TRYTES: usize = 3;

/// Hash chain segments per signature.
const SEGMENTS: usize = MSG_TRYTES + CHECKSUM_TRYTES;

/// Trits per chain segment.
const SEGMENT_SIZE: usize = HASH_SIZE;

/// Total signature width in trits.
pub const SIG_SIZE: usize = SEGMENTS * SEGMENT_SIZE;

/// Longest hash chain (tryte domain is 0..=26).
const MAX_CHAIN: u8 = 26;

/// Chain positions for a digest: 81 message trytes plus 3 checksum trytes,
/// each in `0..=26`.
fn chain_positions(digest: &[Trit]) -> Result<[u8; SEGMENTS], CryptoError> {
    if digest.len() != HASH_SIZE {
        return Err(CryptoError::MalformedSignature("digest width"));
    }

    let mut positions = [0u8; SEGMENTS];
    let mut checksum: u32 = 0;
    for (i, tryte) in digest.chunks_exact(3).enumerate() {
        let v = i32::from(tryte[0]) + 3 * i32::from(tryte[1]) + 9 * i32::from(tryte[2]);
        let u = (v + 13) as u8;
        positions[i] = u;
        checksum += u32::from(MAX_CHAIN - u);
    }
    for slot in positions.iter_mut().skip(MSG_TRYTES) {
        *slot = (checksum % 27) as u8;
        checksum /= 27;
    }
    Ok(positions)
}

/// Derive the secret segment for one chain.
fn secret_segment(prng: &dyn Prng, nonce: &[&[Trit]], index: usize) -> Trits {
    let mut idx = Pb3Writer::new();
    // SEGMENTS < 9_841, always fits a trint9
    let _ = idx.write_trint9(index as i64);

    let mut domain: Vec<&[Trit]> = nonce.to_vec();
    domain.push(idx.as_slice());
    prng.generate(&domain, SEGMENT_SIZE)
}

/// Advance a segment one hash step, scrubbing the previous value.
fn step(sponge: &mut dyn Sponge, segment: &mut Trits) {
    sponge.reset();
    sponge.absorb(segment.as_slice());
    let next = sponge.squeeze(SEGMENT_SIZE);
    segment.as_mut_slice().zeroize();
    *segment = next;
}

/// Digest the concatenated chain heads into the public key.
fn fold_chains(sponge: &mut dyn Sponge, chains: &[Trits]) -> Trits {
    sponge.reset();
    for c in chains {
        sponge.absorb(c.as_slice());
    }
    sponge.squeeze(HASH_SIZE)
}

/// Public key for the one-time keypair derived under `nonce`.
pub fn public_key(
    allocator: &dyn SpongeAllocator,
    prng: &dyn Prng,
    nonce: &[&[Trit]],
) -> Result<Trits, CryptoError> {
    let mut sponge = allocator.create_sponge()?;
    let mut chains = Vec::with_capacity(SEGMENTS);
    for i in 0..SEGMENTS {
        let mut seg = secret_segment(prng, nonce, i);
        for _ in 0..MAX_CHAIN {
            step(sponge.as_mut(), &mut seg);
        }
        chains.push(seg);
    }
    let pk = fold_chains(sponge.as_mut(), &chains);
    allocator.destroy_sponge(sponge);
    Ok(pk)
}

/// Sign a 243-trit digest, consuming the one-time key.
pub fn sign(
    allocator: &dyn SpongeAllocator,
    prng: &dyn Prng,
    nonce: &[&[Trit]],
    digest: &[Trit],
) -> Result<Trits, CryptoError> {
    let positions = chain_positions(digest)?;
    let mut sponge = allocator.create_sponge()?;

    let mut sig = Trits::zero(0);
    for (i, &pos) in positions.iter().enumerate() {
        let mut seg = secret_segment(prng, nonce, i);
        for _ in 0..pos {
            step(sponge.as_mut(), &mut seg);
        }
        sig.extend(seg.as_slice());
        seg.as_mut_slice().zeroize();
    }

    allocator.destroy_sponge(sponge);
    Ok(sig)
}

/// Recover the public key a signature speaks for.
///
/// Comparison against the expected public key is the caller's verify step:
/// tampering with either the digest or the signature lands on a different
/// recovered key.
pub fn recover(
    allocator: &dyn SpongeAllocator,
    digest: &[Trit],
    sig: &[Trit],
) -> Result<Trits, CryptoError> {
    if sig.len() != SIG_SIZE {
        return Err(CryptoError::MalformedSignature("signature width"));
    }
    let positions = chain_positions(digest)?;
    let mut sponge = allocator.create_sponge()?;

    let mut chains = Vec::with_capacity(SEGMENTS);
    for (i, &pos) in positions.iter().enumerate() {
        let mut seg = Trits::from_slice(&sig[i * SEGMENT_SIZE..(i + 1) * SEGMENT_SIZE])
            .map_err(|_| CryptoError::MalformedSignature("segment digits"))?;
        for _ in 0..(MAX_CHAIN - pos) {
            step(sponge.as_mut(), &mut seg);
        }
        chains.push(seg);
    }

    let pk = fold_chains(sponge.as_mut(), &chains);
    allocator.destroy_sponge(sponge);
    Ok(pk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prng::TritPrng, sponge::HostAllocator};

    fn digest(prng: &TritPrng, label: i8) -> Trits {
        prng.generate(&[&[label]], HASH_SIZE)
    }

    #[test]
    fn sign_then_recover_matches_public_key() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"wots test seed");
        let nonce: &[&[Trit]] = &[&[1, 0, -1]];

        let pk = public_key(&alloc, &prng, nonce).unwrap();
        let d = digest(&prng, 0);
        let sig = sign(&alloc, &prng, nonce, d.as_slice()).unwrap();
        assert_eq!(sig.len(), SIG_SIZE);

        let recovered = recover(&alloc, d.as_slice(), sig.as_slice()).unwrap();
        assert_eq!(recovered, pk);
    }

    #[test]
    fn tampered_signature_recovers_different_key() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"wots test seed");
        let nonce: &[&[Trit]] = &[&[0]];

        let pk = public_key(&alloc, &prng, nonce).unwrap();
        let d = digest(&prng, 1);
        let sig = sign(&alloc, &prng, nonce, d.as_slice()).unwrap();

        let mut bad: Vec<Trit> = sig.as_slice().to_vec();
        bad[100] = if bad[100] == 1 { -1 } else { 1 };
        let recovered = recover(&alloc, d.as_slice(), &bad).unwrap();
        assert_ne!(recovered, pk);
    }

    #[test]
    fn tampered_digest_recovers_different_key() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"wots test seed");
        let nonce: &[&[Trit]] = &[&[0]];

        let pk = public_key(&alloc, &prng, nonce).unwrap();
        let d = digest(&prng, 2);
        let sig = sign(&alloc, &prng, nonce, d.as_slice()).unwrap();

        let mut bad: Vec<Trit> = d.as_slice().to_vec();
        bad[0] = if bad[0] == 1 { -1 } else { 1 };
        let recovered = recover(&alloc, &bad, sig.as_slice()).unwrap();
        assert_ne!(recovered, pk);
    }

    #[test]
    fn wrong_length_signature_is_malformed() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"wots test seed");
        let d = digest(&prng, 3);
        assert!(matches!(
            recover(&alloc, d.as_slice(), &[0; 100]),
            Err(CryptoError::MalformedSignature(_))
        ));
    }

    #[test]
    fn different_nonces_give_different_keys() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"wots test seed");
        let pk_a = public_key(&alloc, &prng, &[&[1]]).unwrap();
        let pk_b = public_key(&alloc, &prng, &[&[-1]]).unwrap();
        assert_ne!(pk_a, pk_b);
    }
}
