//! MAM wire-format primitives.
//!
//! Everything on the MAM wire is a flat sequence of balanced-ternary digits
//! ("trits"), decoded positionally. This crate holds the data model
//! ([`Trits`]) and the PB3 codec primitives ([`Pb3Writer`], [`Pb3Reader`]):
//! fixed-width balanced-ternary integers, presence flags, and exact-size
//! field reads with fail-fast truncation errors.
//!
//! Higher layers (identity management, the send/receive pipelines) live in
//! `mam-core`; this crate performs no cryptography.
//!
//! # Invariants
//!
//! - Positional decoding: readers consume exactly the declared number of
//!   trits per field, in field order. Trailing trits after a well-formed
//!   value are left for the caller.
//! - Round-trip: writing a value and reading it back with the same width
//!   MUST produce an equal value. Verified by property tests.

pub mod errors;
pub mod pb3;
pub mod trits;

pub use errors::Pb3Error;
pub use pb3::{Pb3Reader, Pb3Writer, TRINT9_SIZE, TRINT18_SIZE};
pub use trits::{Trit, Trits, TRITS_PER_BYTE, add_mod3, bytes_to_trits, sub_mod3, trits_to_bytes};
