//! Channel: a root identity backed by a Merkle signature scheme.

use mam_crypto::{HASH_SIZE, Mss, Prng, SpongeAllocator};
use mam_proto::{Trit, Trits};

use crate::{error::MamError, identity::Identity};

/// Width of a channel identifier in trits.
pub const CHANNEL_ID_SIZE: usize = HASH_SIZE;

// Derivation label keeping channel trees apart from endpoint trees that
// might share a name.
const CHANNEL_LABEL: [Trit; 1] = [1];

/// A long-lived root identity.
///
/// Owns one Merkle signature scheme instance; the public identifier is the
/// tree root, derived once at creation. A channel must outlive every
/// endpoint created under it; endpoints hold no ownership over the
/// channel, this is a caller contract.
pub struct Channel {
    mss: Mss,
    id: Trits,
    name: Trits,
}

impl Channel {
    /// Generate a channel deterministically from the PRNG.
    ///
    /// `height` bounds the number of signatures the channel can ever issue
    /// (`2^height`); that is a capacity, not a time bound.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidHeight` for a zero or oversized height.
    /// - Allocation failures from the sponge provider.
    pub fn create(
        allocator: &dyn SpongeAllocator,
        prng: &dyn Prng,
        height: u32,
        name: Trits,
    ) -> Result<Self, MamError> {
        let mut nonce = Trits::from_slice(&CHANNEL_LABEL).unwrap_or_default();
        nonce.extend(name.as_slice());

        let mss = Mss::generate(allocator, prng, height, nonce.as_slice())?;
        let id = mss.root().clone();
        tracing::debug!(height, id = ?id, "channel created");
        Ok(Self { mss, id, name })
    }

    /// Channel name as trits. Borrowed view into the channel.
    #[must_use]
    pub fn name(&self) -> &[Trit] {
        self.name.as_slice()
    }
}

impl Identity for Channel {
    fn id(&self) -> &[Trit] {
        self.id.as_slice()
    }

    fn height(&self) -> u32 {
        self.mss.height()
    }

    fn remaining_signatures(&self) -> u32 {
        self.mss.remaining()
    }

    fn sign(
        &mut self,
        allocator: &dyn SpongeAllocator,
        prng: &dyn Prng,
        digest: &[Trit],
    ) -> Result<Trits, MamError> {
        Ok(self.mss.sign(allocator, prng, digest)?)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("mss", &self.mss)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mam_crypto::{HostAllocator, TritPrng};

    use super::*;

    fn name(digits: &[i8]) -> Trits {
        Trits::from_slice(digits).unwrap()
    }

    #[test]
    fn id_is_deterministic_for_seed_and_name() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"channel seed");

        let a = Channel::create(&alloc, &prng, 1, name(&[1, 0])).unwrap();
        let b = Channel::create(&alloc, &prng, 1, name(&[1, 0])).unwrap();
        let c = Channel::create(&alloc, &prng, 1, name(&[0, 1])).unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().len(), CHANNEL_ID_SIZE);
    }

    #[test]
    fn capacity_tracks_height() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"channel seed");
        let ch = Channel::create(&alloc, &prng, 2, name(&[])).unwrap();
        assert_eq!(ch.remaining_signatures(), 4);
        assert_eq!(ch.height(), 2);
    }

    #[test]
    fn invalid_height_is_rejected() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"channel seed");
        assert!(Channel::create(&alloc, &prng, 0, name(&[])).is_err());
    }
}
