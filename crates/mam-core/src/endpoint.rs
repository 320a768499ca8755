//! Endpoint: a named sub-identity scoped to one channel.

use mam_crypto::{HASH_SIZE, Mss, Prng, SpongeAllocator};
use mam_proto::{Trit, Trits};

use crate::{error::MamError, identity::Identity};

/// Width of an endpoint identifier in trits.
pub const ENDPOINT_ID_SIZE: usize = HASH_SIZE;

const ENDPOINT_LABEL: [Trit; 1] = [-1];

/// A sub-identity delegated from a channel.
///
/// Owns its own Merkle signature scheme instance and remembers the owning
/// channel's name. The delegation itself is proven on the wire: when a
/// message requests an endpoint binding, the *channel* signs the endpoint's
/// id so a verifier can confirm the delegation against the channel's tree
/// without trusting the transport.
///
/// Destroy an endpoint before its owning channel.
pub struct Endpoint {
    mss: Mss,
    id: Trits,
    channel_name: Trits,
    name: Trits,
}

impl Endpoint {
    /// Generate an endpoint deterministically from the PRNG.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Channel::create`](crate::Channel::create).
    pub fn create(
        allocator: &dyn SpongeAllocator,
        prng: &dyn Prng,
        height: u32,
        channel_name: Trits,
        name: Trits,
    ) -> Result<Self, MamError> {
        let mut nonce = Trits::from_slice(&ENDPOINT_LABEL).unwrap_or_default();
        nonce.extend(channel_name.as_slice());
        nonce.extend(name.as_slice());

        let mss = Mss::generate(allocator, prng, height, nonce.as_slice())?;
        let id = mss.root().clone();
        tracing::debug!(height, id = ?id, "endpoint created");
        Ok(Self { mss, id, channel_name, name })
    }

    /// Name of the owning channel. Borrowed view into the endpoint.
    #[must_use]
    pub fn channel_name(&self) -> &[Trit] {
        self.channel_name.as_slice()
    }

    /// Endpoint's own name. Borrowed view into the endpoint.
    #[must_use]
    pub fn name(&self) -> &[Trit] {
        self.name.as_slice()
    }
}

impl Identity for Endpoint {
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

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("channel_name", &self.channel_name)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use mam_crypto::{HostAllocator, TritPrng};

    use super::*;
    use crate::channel::Channel;

    #[test]
    fn endpoint_id_differs_from_channel_id() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"endpoint seed");
        let ch_name = Trits::from_slice(&[1, 1]).unwrap();

        let ch = Channel::create(&alloc, &prng, 1, ch_name.clone()).unwrap();
        let ep = Endpoint::create(
            &alloc,
            &prng,
            1,
            ch_name.clone(),
            Trits::from_slice(&[-1]).unwrap(),
        )
        .unwrap();

        assert_ne!(ch.id(), ep.id());
        assert_eq!(ep.channel_name(), ch_name.as_slice());
        assert_eq!(ep.name(), &[-1]);
        assert_eq!(ep.id().len(), ENDPOINT_ID_SIZE);
    }

    #[test]
    fn distinct_names_under_same_channel_diverge() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"endpoint seed");
        let ch_name = Trits::from_slice(&[0]).unwrap();

        let a = Endpoint::create(&alloc, &prng, 1, ch_name.clone(), Trits::from_slice(&[1]).unwrap())
            .unwrap();
        let b = Endpoint::create(&alloc, &prng, 1, ch_name, Trits::from_slice(&[-1]).unwrap())
            .unwrap();
        assert_ne!(a.id(), b.id());
    }
}
