//! Wire-level error type for the PB3 codec.
//!
//! Strongly-typed errors in the same spirit as the rest of the workspace:
//! every decode failure names the field-level cause so higher layers can
//! distinguish a truncated stream from a malformed value.

use thiserror::Error;

/// Errors produced by the PB3 trit codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Pb3Error {
    /// Reader ran out of trits before the field was complete.
    #[error("truncated input: needed {needed} trits, {available} available")]
    Truncated {
        /// Trits required by the field being read.
        needed: usize,
        /// Trits actually remaining in the input.
        available: usize,
    },

    /// A fixed-width integer did not fit its declared width, or a decoded
    /// value is outside the field's domain (e.g. a presence flag trit of -1).
    #[error("value out of range for {field}")]
    ValueOutOfRange {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A buffer had a length incompatible with the conversion requested.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Length the conversion requires.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },
}

/// Convenience alias used throughout the codec.
pub type Result<T> = std::result::Result<T, Pb3Error>;
