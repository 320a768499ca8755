//! Signing-identity seam shared by channels and endpoints.

use mam_crypto::{Mss, Prng, SpongeAllocator};
use mam_proto::{Trit, Trits};

use crate::error::MamError;

/// An identity that can authenticate messages and packets.
///
/// Both [`Channel`](crate::Channel) and [`Endpoint`](crate::Endpoint) are
/// backed by a Merkle signature scheme instance; signing spends one leaf,
/// so implementations are mutable and must not sign concurrently from two
/// threads without external synchronization. The read-only accessors are
/// safe to call concurrently.
pub trait Identity {
    /// Public identifier: the Merkle root, borrowed from the identity.
    ///
    /// The slice aliases internal state; do not retain it past the
    /// identity's destruction.
    fn id(&self) -> &[Trit];

    /// Merkle tree height.
    fn height(&self) -> u32;

    /// One-time signatures left before exhaustion.
    fn remaining_signatures(&self) -> u32;

    /// Sign a 243-trit digest, spending one leaf.
    fn sign(
        &mut self,
        allocator: &dyn SpongeAllocator,
        prng: &dyn Prng,
        digest: &[Trit],
    ) -> Result<Trits, MamError>;

    /// Width of this identity's encoded signatures, in trits.
    fn signature_size(&self) -> usize {
        Mss::signature_size(self.height())
    }
}
