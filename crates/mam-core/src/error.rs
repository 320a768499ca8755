//! Error types for the MAM protocol core.
//!
//! Errors are categorical: every encode/decode failure names its kind so
//! callers can tell a retryable condition (allocation, undersized buffer)
//! from a terminal one (bad signature, missing key, malformed input). No
//! partial state survives an error; pipelines short-circuit on the first
//! failure.

use mam_crypto::CryptoError;
use mam_proto::Pb3Error;
use thiserror::Error;

/// Failures surfaced by identity management and the send/receive pipelines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MamError {
    /// Failure inside a cryptographic capability (allocation, invalid tree
    /// height, leaf exhaustion, malformed signature blob, unwrap failure).
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Truncated or out-of-domain wire data.
    #[error("malformed input: {0}")]
    Wire(#[from] Pb3Error),

    /// A well-formed signature that does not verify.
    #[error("signature verification failed: {context}")]
    SignatureInvalid {
        /// Which signature failed (rotation, endpoint binding, message,
        /// packet).
        context: &'static str,
    },

    /// The header declares wrapped session keys but none matches local
    /// key material. Distinct from a generic decode failure so callers can
    /// fetch the right key and retry from scratch.
    #[error("no matching decryption key among {candidates} declared recipients")]
    KeyNotFound {
        /// Wrapped-key entries the header declared.
        candidates: usize,
    },

    /// Caller-supplied output buffer cannot hold the encoding.
    #[error("output buffer too small: need {needed} trits, have {available}")]
    BufferTooSmall {
        /// Trits the encoding requires.
        needed: usize,
        /// Trits the caller supplied.
        available: usize,
    },

    /// A context field violates its contract (wrong nonce width, bad key
    /// length).
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Structurally decodable input with inconsistent content.
    #[error("format inconsistency: {0}")]
    FormatInvalid(&'static str),

    /// Packet checksum does not match the running sponge state.
    #[error("packet checksum mismatch")]
    ChecksumMismatch,
}

impl MamError {
    /// True if the caller may retry the operation after addressing the
    /// condition (bigger buffer, allocation pressure). Everything else is
    /// terminal for the current encode/decode call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BufferTooSmall { .. } | Self::Crypto(CryptoError::AllocationFailed)
        )
    }
}
