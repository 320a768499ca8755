//! Merkle signature scheme: stateful multi-use signatures over one-time keys.
//!
//! A tree of height `h` commits to `2^h` WOTS keypairs; the root is the
//! identity's public key. Each signature spends one leaf and carries the
//! leaf index, the WOTS signature, and the authentication path from leaf to
//! root. The leaf counter is the only mutable state; leaf secrets are
//! re-derived from the PRNG on demand, so there is no private tree to
//! persist or scrub beyond the caller's seed.
//!
//! Leaves are recomputed per operation, which keeps signing O(2^h) hashes;
//! fine for the small heights this layer uses.

use mam_proto::{Pb3Reader, Pb3Writer, TRINT18_SIZE, Trit, Trits};

use crate::{
    errors::CryptoError,
    prng::Prng,
    sponge::{HASH_SIZE, SpongeAllocator, sponge_hash},
    wots,
};

/// Largest supported tree height (capacity 2^20 signatures).
pub const MSS_MAX_HEIGHT: u32 = 20;

/// A Merkle signature scheme instance: private tree (derived on demand)
/// plus the issued-leaf counter.
///
/// Signing mutates the counter, so concurrent signing from two threads
/// needs external synchronization; the read-only accessors do not.
pub struct Mss {
    height: u32,
    /// Next unspent leaf.
    skn: u32,
    /// Derivation nonce separating this instance's leaves from any other.
    nonce: Trits,
    root: Trits,
}

impl Mss {
    /// Generate a keypair deterministically from the PRNG.
    ///
    /// # Errors
    ///
    /// - `InvalidHeight` for heights outside `1..=MSS_MAX_HEIGHT`.
    /// - Allocation failures from the sponge provider.
    pub fn generate(
        allocator: &dyn SpongeAllocator,
        prng: &dyn Prng,
        height: u32,
        nonce: &[Trit],
    ) -> Result<Self, CryptoError> {
        if height == 0 || height > MSS_MAX_HEIGHT {
            return Err(CryptoError::InvalidHeight { height, max: MSS_MAX_HEIGHT });
        }

        let nonce = Trits::from_slice(nonce)
            .map_err(|_| CryptoError::MalformedSignature("nonce digits"))?;
        let leaves = leaf_keys(allocator, prng, height, &nonce)?;
        let root = merkle_root(allocator, leaves)?;

        Ok(Self { height, skn: 0, nonce, root })
    }

    /// Tree height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Public key: the Merkle root.
    #[must_use]
    pub fn root(&self) -> &Trits {
        &self.root
    }

    /// Total one-time signatures this instance started with.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        1 << self.height
    }

    /// One-time signatures left before exhaustion.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.capacity() - self.skn
    }

    /// Encoded signature width for a tree of `height`, in trits.
    #[must_use]
    pub fn signature_size(height: u32) -> usize {
        TRINT18_SIZE + wots::SIG_SIZE + (height as usize) * HASH_SIZE
    }

    /// Sign a 243-trit digest, spending one leaf.
    ///
    /// # Errors
    ///
    /// `MssExhausted` once every leaf has been spent; the instance stays
    /// usable for verification but can never sign again.
    pub fn sign(
        &mut self,
        allocator: &dyn SpongeAllocator,
        prng: &dyn Prng,
        digest: &[Trit],
    ) -> Result<Trits, CryptoError> {
        if self.skn >= self.capacity() {
            return Err(CryptoError::MssExhausted { capacity: self.capacity() });
        }
        let leaf = self.skn;

        let idx = leaf_nonce(leaf);
        let wots_sig = wots::sign(
            allocator,
            prng,
            &[self.nonce.as_slice(), idx.as_slice()],
            digest,
        )?;

        let leaves = leaf_keys(allocator, prng, self.height, &self.nonce)?;
        let path = auth_path(allocator, leaves, leaf)?;

        let mut out = Pb3Writer::with_capacity(Self::signature_size(self.height));
        // Leaf index always fits: capacity <= 2^20
        let _ = out.write_trint18(i64::from(leaf));
        out.write_trits(wots_sig.as_slice());
        for node in &path {
            out.write_trits(node.as_slice());
        }

        self.skn += 1;
        Ok(out.finish())
    }

    /// Verify a signature against a public key (root).
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match;
    /// structurally unusable blobs are `MalformedSignature` errors.
    pub fn verify(
        allocator: &dyn SpongeAllocator,
        root: &[Trit],
        digest: &[Trit],
        sig: &[Trit],
    ) -> Result<bool, CryptoError> {
        let mut r = Pb3Reader::new(sig);
        let leaf = r
            .read_trint18()
            .map_err(|_| CryptoError::MalformedSignature("leaf index"))?;
        let leaf = u32::try_from(leaf)
            .map_err(|_| CryptoError::MalformedSignature("negative leaf index"))?;

        let wots_sig = r
            .read_trits(wots::SIG_SIZE)
            .map_err(|_| CryptoError::MalformedSignature("wots segment"))?;

        // Remaining trits are the auth path; must be whole nodes.
        if r.remaining() % HASH_SIZE != 0 {
            return Err(CryptoError::MalformedSignature("auth path width"));
        }
        let depth = r.remaining() / HASH_SIZE;
        if depth > MSS_MAX_HEIGHT as usize || u64::from(leaf) >= (1u64 << depth) {
            return Err(CryptoError::MalformedSignature("leaf index out of tree"));
        }

        let mut node = wots::recover(allocator, digest, wots_sig)?;
        for level in 0..depth {
            let sibling = r
                .read_trits(HASH_SIZE)
                .map_err(|_| CryptoError::MalformedSignature("auth path node"))?;
            node = if (leaf >> level) & 1 == 0 {
                sponge_hash(allocator, &[node.as_slice(), sibling])?
            } else {
                sponge_hash(allocator, &[sibling, node.as_slice()])?
            };
        }

        Ok(node.as_slice() == root)
    }
}

impl std::fmt::Debug for Mss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mss")
            .field("height", &self.height)
            .field("skn", &self.skn)
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

/// Derivation suffix for one leaf.
fn leaf_nonce(leaf: u32) -> Trits {
    let mut w = Pb3Writer::new();
    let _ = w.write_trint18(i64::from(leaf));
    w.finish()
}

/// WOTS public keys for every leaf, in index order.
fn leaf_keys(
    allocator: &dyn SpongeAllocator,
    prng: &dyn Prng,
    height: u32,
    nonce: &Trits,
) -> Result<Vec<Trits>, CryptoError> {
    let count = 1u32 << height;
    let mut leaves = Vec::with_capacity(count as usize);
    for leaf in 0..count {
        let idx = leaf_nonce(leaf);
        leaves.push(wots::public_key(
            allocator,
            prng,
            &[nonce.as_slice(), idx.as_slice()],
        )?);
    }
    Ok(leaves)
}

/// Fold a full layer of leaves up to the root.
fn merkle_root(
    allocator: &dyn SpongeAllocator,
    mut layer: Vec<Trits>,
) -> Result<Trits, CryptoError> {
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2);
        for pair in layer.chunks_exact(2) {
            next.push(sponge_hash(allocator, &[pair[0].as_slice(), pair[1].as_slice()])?);
        }
        layer = next;
    }
    layer.pop().ok_or(CryptoError::MalformedSignature("empty tree"))
}

/// Sibling nodes from `leaf` up to (excluding) the root.
fn auth_path(
    allocator: &dyn SpongeAllocator,
    mut layer: Vec<Trits>,
    leaf: u32,
) -> Result<Vec<Trits>, CryptoError> {
    let mut path = Vec::new();
    let mut index = leaf as usize;
    while layer.len() > 1 {
        let sibling = index ^ 1;
        path.push(layer[sibling].clone());

        let mut next = Vec::with_capacity(layer.len() / 2);
        for pair in layer.chunks_exact(2) {
            next.push(sponge_hash(allocator, &[pair[0].as_slice(), pair[1].as_slice()])?);
        }
        layer = next;
        index >>= 1;
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{prng::TritPrng, sponge::HostAllocator};

    fn setup(height: u32) -> (HostAllocator, TritPrng, Mss) {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"mss test seed");
        let mss = Mss::generate(&alloc, &prng, height, &[1, 0, -1]).unwrap();
        (alloc, prng, mss)
    }

    fn digest(prng: &TritPrng, label: i8) -> Trits {
        prng.generate(&[&[label, label]], HASH_SIZE)
    }

    #[test]
    fn rejects_invalid_heights() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"seed");
        assert!(matches!(
            Mss::generate(&alloc, &prng, 0, &[]),
            Err(CryptoError::InvalidHeight { height: 0, .. })
        ));
        assert!(matches!(
            Mss::generate(&alloc, &prng, MSS_MAX_HEIGHT + 1, &[]),
            Err(CryptoError::InvalidHeight { .. })
        ));
    }

    #[test]
    fn every_leaf_verifies_until_exhaustion() {
        let (alloc, prng, mut mss) = setup(2);
        let root = mss.root().clone();
        assert_eq!(mss.capacity(), 4);

        for i in 0..4i8 {
            let d = digest(&prng, i);
            assert_eq!(mss.remaining(), 4 - u32::from(i as u8));
            let sig = mss.sign(&alloc, &prng, d.as_slice()).unwrap();
            assert_eq!(sig.len(), Mss::signature_size(2));
            assert!(Mss::verify(&alloc, root.as_slice(), d.as_slice(), sig.as_slice()).unwrap());
        }

        let d = digest(&prng, 100);
        assert!(matches!(
            mss.sign(&alloc, &prng, d.as_slice()),
            Err(CryptoError::MssExhausted { capacity: 4 })
        ));
    }

    #[test]
    fn verify_rejects_wrong_root() {
        let (alloc, prng, mut mss) = setup(1);
        let other = Mss::generate(&alloc, &prng, 1, &[-1, -1]).unwrap();

        let d = digest(&prng, 7);
        let sig = mss.sign(&alloc, &prng, d.as_slice()).unwrap();
        assert!(!Mss::verify(&alloc, other.root().as_slice(), d.as_slice(), sig.as_slice())
            .unwrap());
    }

    #[test]
    fn verify_rejects_tampered_digest_and_signature() {
        let (alloc, prng, mut mss) = setup(1);
        let root = mss.root().clone();

        let d = digest(&prng, 3);
        let sig = mss.sign(&alloc, &prng, d.as_slice()).unwrap();

        let mut bad_digest: Vec<Trit> = d.as_slice().to_vec();
        bad_digest[10] = if bad_digest[10] == 0 { 1 } else { 0 };
        assert!(!Mss::verify(&alloc, root.as_slice(), &bad_digest, sig.as_slice()).unwrap());

        let mut bad_sig: Vec<Trit> = sig.as_slice().to_vec();
        let pos = TRINT18_SIZE + 5; // inside the WOTS body
        bad_sig[pos] = if bad_sig[pos] == 0 { 1 } else { 0 };
        assert!(!Mss::verify(&alloc, root.as_slice(), d.as_slice(), &bad_sig).unwrap());
    }

    #[test]
    fn malformed_blobs_are_distinct_from_mismatches() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"seed");
        let d = digest(&prng, 0);
        assert!(matches!(
            Mss::verify(&alloc, &[0; HASH_SIZE], d.as_slice(), &[0; 10]),
            Err(CryptoError::MalformedSignature(_))
        ));
    }

    #[test]
    fn generation_is_deterministic() {
        let (_, _, a) = setup(2);
        let (_, _, b) = setup(2);
        assert_eq!(a.root(), b.root());
    }
}
