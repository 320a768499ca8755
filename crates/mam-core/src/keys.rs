//! Pre-shared keys, session keys, and the recipient key registries.
//!
//! Registries are ordered, insertion-preserving collections keyed by a
//! fixed-size id. They do not deduplicate (id uniqueness is the caller's
//! contract) and lookup returns the first match, so insertion order is
//! observable and stable.

use mam_crypto::{NTRU_ID_SIZE, NtruPk, Prng, SpongeAllocator};
use mam_proto::{Trit, Trits};
use zeroize::Zeroize;

use crate::error::MamError;

/// Width of a pre-shared key id in trits.
pub const PSK_ID_SIZE: usize = 81;

/// Width of a pre-shared key secret in trits.
pub const PSK_SIZE: usize = 243;

/// Width of a session key in trits.
pub const SESSION_KEY_SIZE: usize = 243;

// Derivation label for PSK secrets
const PSK_LABEL: [Trit; 4] = [1, 1, -1, 0];

// Derivation label for session keys
const SESSION_LABEL: [Trit; 4] = [-1, 0, 1, 1];

/// A symmetric secret shared out-of-band, immutable once created.
///
/// The secret is scrubbed on drop.
pub struct Psk {
    id: Trits,
    secret: Trits,
}

impl Psk {
    /// Wrap an id/secret pair, validating widths.
    pub fn new(id: Trits, secret: Trits) -> Result<Self, MamError> {
        if id.len() != PSK_ID_SIZE {
            return Err(MamError::InvalidParameter("psk id width"));
        }
        if secret.len() != PSK_SIZE {
            return Err(MamError::InvalidParameter("psk secret width"));
        }
        Ok(Self { id, secret })
    }

    /// Derive a secret for `id` from the PRNG.
    pub fn generate(prng: &dyn Prng, id: Trits) -> Result<Self, MamError> {
        if id.len() != PSK_ID_SIZE {
            return Err(MamError::InvalidParameter("psk id width"));
        }
        let secret = prng.generate(&[&PSK_LABEL, id.as_slice()], PSK_SIZE);
        Ok(Self { id, secret })
    }

    /// Key id.
    #[must_use]
    pub fn id(&self) -> &[Trit] {
        self.id.as_slice()
    }

    /// The secret itself.
    #[must_use]
    pub fn secret(&self) -> &[Trit] {
        self.secret.as_slice()
    }
}

impl Drop for Psk {
    fn drop(&mut self) {
        self.secret.as_mut_slice().zeroize();
    }
}

impl std::fmt::Debug for Psk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret intentionally omitted
        f.debug_struct("Psk").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Per-message symmetric key used to encrypt the payload.
///
/// Never reuse one session key across two nonces; nonce uniqueness is a
/// caller contract the codec does not enforce. Scrubbed on drop.
pub struct SessionKey(Trits);

impl SessionKey {
    /// Derive a fresh key from the volatile RNG and the message nonce.
    #[must_use]
    pub fn generate(rng: &dyn Prng, nonce: &[Trit]) -> Self {
        Self(rng.generate(&[&SESSION_LABEL, nonce], SESSION_KEY_SIZE))
    }

    /// Wrap caller-provided key material, validating its width.
    pub fn from_trits(trits: Trits) -> Result<Self, MamError> {
        if trits.len() != SESSION_KEY_SIZE {
            return Err(MamError::InvalidParameter("session key width"));
        }
        Ok(Self(trits))
    }

    /// The key material.
    #[must_use]
    pub fn as_slice(&self) -> &[Trit] {
        self.0.as_slice()
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.0.as_mut_slice().zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Ordered collection of pre-shared keys.
#[derive(Debug, Default)]
pub struct PskRegistry {
    entries: Vec<Psk>,
}

impl PskRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key. Ids are not deduplicated.
    pub fn add(&mut self, psk: Psk) {
        self.entries.push(psk);
    }

    /// First key whose id matches.
    #[must_use]
    pub fn find(&self, id: &[Trit]) -> Option<&Psk> {
        self.entries.iter().find(|p| p.id() == id)
    }

    /// Keys in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Psk> {
        self.entries.iter()
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered collection of recipient public keys.
///
/// Ids are derived from the keys at insertion time, so lookups during
/// decode never need the allocator.
#[derive(Debug, Default)]
pub struct NtruPkRegistry {
    entries: Vec<(Trits, NtruPk)>,
}

impl NtruPkRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a public key, deriving its id.
    pub fn add(
        &mut self,
        allocator: &dyn SpongeAllocator,
        pk: NtruPk,
    ) -> Result<(), MamError> {
        let id = pk.id(allocator)?;
        debug_assert_eq!(id.len(), NTRU_ID_SIZE);
        self.entries.push((id, pk));
        Ok(())
    }

    /// First key whose id matches.
    #[must_use]
    pub fn find(&self, id: &[Trit]) -> Option<&NtruPk> {
        self.entries.iter().find(|(i, _)| i.as_slice() == id).map(|(_, pk)| pk)
    }

    /// `(id, key)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&[Trit], &NtruPk)> {
        self.entries.iter().map(|(id, pk)| (id.as_slice(), pk))
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use mam_crypto::{HostAllocator, NtruSk, TritPrng};

    use super::*;

    fn id_of(fill: i8) -> Trits {
        Trits::from_slice(&[fill; PSK_ID_SIZE]).unwrap()
    }

    #[test]
    fn psk_width_validation() {
        let prng = TritPrng::from_seed(b"keys seed");
        assert!(Psk::generate(&prng, Trits::zero(10)).is_err());
        let psk = Psk::generate(&prng, id_of(1)).unwrap();
        assert_eq!(psk.secret().len(), PSK_SIZE);
    }

    #[test]
    fn registry_preserves_insertion_order_and_first_match() {
        let prng = TritPrng::from_seed(b"keys seed");
        let mut reg = PskRegistry::new();
        assert!(reg.is_empty());

        reg.add(Psk::generate(&prng, id_of(1)).unwrap());
        reg.add(Psk::generate(&prng, id_of(0)).unwrap());
        // Duplicate id: not deduplicated, first wins on lookup
        let dup = Psk::new(id_of(1), Trits::zero(PSK_SIZE)).unwrap();
        reg.add(dup);

        assert_eq!(reg.len(), 3);
        let ids: Vec<&[i8]> = reg.iter().map(Psk::id).collect();
        assert_eq!(ids[0], id_of(1).as_slice());
        assert_eq!(ids[1], id_of(0).as_slice());

        let hit = reg.find(id_of(1).as_slice()).unwrap();
        assert_ne!(hit.secret(), Trits::zero(PSK_SIZE).as_slice());
        assert!(reg.find(id_of(-1).as_slice()).is_none());
    }

    #[test]
    fn ntru_registry_lookup_by_derived_id() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"keys seed");
        let sk_a = NtruSk::generate(&prng, &[1]);
        let sk_b = NtruSk::generate(&prng, &[-1]);

        let mut reg = NtruPkRegistry::new();
        reg.add(&alloc, sk_a.public_key().clone()).unwrap();
        reg.add(&alloc, sk_b.public_key().clone()).unwrap();

        let id_b = sk_b.public_key().id(&alloc).unwrap();
        assert_eq!(reg.find(id_b.as_slice()), Some(sk_b.public_key()));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn session_key_width_is_enforced() {
        assert!(SessionKey::from_trits(Trits::zero(SESSION_KEY_SIZE)).is_ok());
        assert!(SessionKey::from_trits(Trits::zero(100)).is_err());
    }
}
