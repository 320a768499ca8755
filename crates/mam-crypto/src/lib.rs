//! MAM Cryptographic Capabilities
//!
//! The protocol core composes cryptographic primitives without implementing
//! them: it consumes a sponge (hash-and-encrypt state machine), a
//! deterministic trit PRNG, a Merkle signature scheme over one-time keys,
//! and a recipient public-key wrapping service. This crate defines those
//! seams as traits and ships deterministic reference implementations.
//!
//! # Key Lifecycle
//!
//! ```text
//! PRNG seed
//!     │
//!     ▼ domain-separated expand
//! WOTS secret segments (per Merkle leaf, derived on demand)
//!     │
//!     ▼ hash chains
//! WOTS public keys ──► Merkle tree ──► root = channel/endpoint identity
//! ```
//!
//! Signing consumes one Merkle leaf; the leaf counter makes the scheme
//! stateful and capacity-bounded at `2^height` signatures.
//!
//! # Security
//!
//! - Secret segments, sponge state and chain keys are zeroized as soon as
//!   they leave scope.
//! - All derivation is deterministic from the seed, so two parties sharing
//!   a seed reproduce identical key material.
//! - Sponge instances are never shared between concurrent operations; the
//!   [`SpongeAllocator`] capability hands out a fresh instance per use.

pub mod errors;
pub mod mss;
pub mod ntru;
pub mod prng;
pub mod sponge;
pub mod wots;

pub use errors::CryptoError;
pub use mss::{MSS_MAX_HEIGHT, Mss};
pub use ntru::{NTRU_CT_SIZE, NTRU_ID_SIZE, NTRU_PK_SIZE, NtruPk, NtruSk};
pub use prng::{Prng, TritPrng};
pub use sponge::{
    HASH_SIZE, HostAllocator, Sponge, SpongeAllocator, sponge_hash,
};
