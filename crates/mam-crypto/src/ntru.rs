//! Recipient public-key session-key wrapping.
//!
//! The core consumes this as an opaque encrypt/decrypt service keyed by a
//! public/private pair: wrap a 243-trit session key for a recipient's
//! public key, unwrap it with the matching secret key. The reference
//! implementation is an x25519 KEM: an ephemeral keypair per wrap, the
//! shared secret keying a sponge that encrypts the session key. Wire sizes
//! are fixed so headers stay positionally decodable.
//!
//! Key ids are derived from the public key itself, so a receiver can match
//! a header's declared id against its own keys without trial decryption.

use mam_proto::{Trit, Trits, bytes_to_trits, trits_to_bytes};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{
    errors::CryptoError,
    prng::Prng,
    sponge::{SpongeAllocator, sponge_hash},
};

/// Width of a key id in trits.
pub const NTRU_ID_SIZE: usize = 81;

/// Public key width in trits (32 bytes, six trits per byte).
pub const NTRU_PK_SIZE: usize = 192;

/// Session key width in trits.
const KEY_SIZE: usize = 243;

/// Wrapped-key ciphertext width: ephemeral public key plus encrypted key.
pub const NTRU_CT_SIZE: usize = NTRU_PK_SIZE + KEY_SIZE;

/// A recipient's public key. Carries no secret material.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NtruPk {
    trits: Trits,
}

impl NtruPk {
    /// Validate and wrap a public key blob.
    ///
    /// # Errors
    ///
    /// `DecryptionFailed` if the blob is not a well-formed 192-trit key.
    pub fn from_trits(trits: Trits) -> Result<Self, CryptoError> {
        if trits.len() != NTRU_PK_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        // Must decode to bytes, otherwise encapsulation can never work.
        trits_to_bytes(trits.as_slice()).map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(Self { trits })
    }

    /// The raw key blob.
    #[must_use]
    pub fn trits(&self) -> &Trits {
        &self.trits
    }

    /// Id derived from the key: the first 81 trits of its sponge hash.
    pub fn id(&self, allocator: &dyn SpongeAllocator) -> Result<Trits, CryptoError> {
        let digest = sponge_hash(allocator, &[self.trits.as_slice()])?;
        Trits::from_slice(&digest.as_slice()[..NTRU_ID_SIZE])
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    fn to_dalek(&self) -> Result<PublicKey, CryptoError> {
        let bytes = trits_to_bytes(self.trits.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::DecryptionFailed)?;
        Ok(PublicKey::from(arr))
    }
}

/// A recipient's secret key. Lives only on the decrypting side.
pub struct NtruSk {
    secret: StaticSecret,
    public: NtruPk,
}

impl NtruSk {
    /// Generate deterministically from the PRNG under a caller domain.
    pub fn generate(prng: &dyn Prng, domain: &[Trit]) -> Self {
        // Domain-separation label for secret key derivation
        const SK_LABEL: [Trit; 6] = [1, -1, 0, 1, -1, 1];

        let mut seed = [0u8; 32];
        prng.generate_bytes(&[&SK_LABEL, domain], &mut seed);
        let secret = StaticSecret::from(seed);
        seed.zeroize();

        let public = NtruPk {
            trits: bytes_to_trits(PublicKey::from(&secret).as_bytes()),
        };
        Self { secret, public }
    }

    /// The matching public key.
    #[must_use]
    pub fn public_key(&self) -> &NtruPk {
        &self.public
    }

    /// Unwrap a session key produced by [`encrypt`] for our public key.
    ///
    /// # Errors
    ///
    /// `DecryptionFailed` on a malformed ciphertext. A structurally valid
    /// ciphertext for a *different* recipient unwraps to garbage; the
    /// message signature check upstream is what catches that.
    pub fn decrypt(
        &self,
        allocator: &dyn SpongeAllocator,
        nonce: &[Trit],
        ct: &[Trit],
    ) -> Result<Trits, CryptoError> {
        if ct.len() != NTRU_CT_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let eph_bytes = trits_to_bytes(&ct[..NTRU_PK_SIZE])
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let eph_arr: [u8; 32] =
            eph_bytes.try_into().map_err(|_| CryptoError::DecryptionFailed)?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(eph_arr));

        let mut sponge = allocator.create_sponge()?;
        sponge.absorb(bytes_to_trits(shared.as_bytes()).as_slice());
        sponge.absorb(nonce);
        let key = sponge.decrypt(&ct[NTRU_PK_SIZE..]);
        allocator.destroy_sponge(sponge);
        Ok(key)
    }
}

impl std::fmt::Debug for NtruSk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NtruSk").field("public", &self.public).finish_non_exhaustive()
    }
}

/// Wrap a session key for `pk`.
///
/// The ephemeral keypair comes from the caller's volatile RNG and the
/// message nonce, so two wraps of the same key under different nonces
/// produce unrelated ciphertexts.
pub fn encrypt(
    allocator: &dyn SpongeAllocator,
    pk: &NtruPk,
    rng: &dyn Prng,
    nonce: &[Trit],
    session_key: &[Trit],
) -> Result<Trits, CryptoError> {
    let mut seed = [0u8; 32];
    rng.generate_bytes(&[nonce, pk.trits.as_slice()], &mut seed);
    let ephemeral = StaticSecret::from(seed);
    seed.zeroize();

    let eph_pk = bytes_to_trits(PublicKey::from(&ephemeral).as_bytes());
    let shared = ephemeral.diffie_hellman(&pk.to_dalek()?);

    let mut sponge = allocator.create_sponge()?;
    sponge.absorb(bytes_to_trits(shared.as_bytes()).as_slice());
    sponge.absorb(nonce);
    let wrapped = sponge.encrypt(session_key);
    allocator.destroy_sponge(sponge);

    let mut ct = eph_pk;
    ct.extend(wrapped.as_slice());
    Ok(ct)
}
