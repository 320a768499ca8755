//! Error types for the cryptographic capability layer.

use thiserror::Error;

/// Failures surfaced by the primitives the protocol core consumes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The sponge allocator could not provide an instance.
    #[error("sponge allocation failed")]
    AllocationFailed,

    /// Merkle tree height outside the supported range.
    #[error("invalid tree height {height}: must be in 1..={max}")]
    InvalidHeight {
        /// Height that was requested.
        height: u32,
        /// Largest supported height.
        max: u32,
    },

    /// Every one-time leaf of the Merkle tree has been spent.
    #[error("signature scheme exhausted: all {capacity} one-time keys used")]
    MssExhausted {
        /// Total leaves the tree started with.
        capacity: u32,
    },

    /// A signature blob is structurally unusable (wrong size, bad leaf
    /// index). Distinct from a well-formed signature that fails to verify.
    #[error("malformed signature: {0}")]
    MalformedSignature(&'static str),

    /// Recipient key unwrap failed (corrupt ciphertext or wrong key blob).
    #[error("key decapsulation failed")]
    DecryptionFailed,
}
