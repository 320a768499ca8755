//! Balanced-ternary buffers.
//!
//! A trit is a digit in `{-1, 0, 1}`. The protocol's identifiers, keys,
//! nonces and wire fields are all fixed-length trit buffers; this module
//! provides the owned, bounds-checked buffer type the rest of the workspace
//! builds on, plus byte conversion for key blobs that originate as bytes.

use crate::errors::{Pb3Error, Result};

/// A single balanced-ternary digit: -1, 0 or 1.
pub type Trit = i8;

/// Trits needed to losslessly encode one byte (3^6 = 729 > 256).
pub const TRITS_PER_BYTE: usize = 6;

/// An owned buffer of balanced-ternary digits.
///
/// Every element is guaranteed to be in `{-1, 0, 1}`; constructors validate
/// and the buffer is never exposed for unchecked writes outside this crate's
/// mutation helpers.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Trits(Vec<Trit>);

impl Trits {
    /// All-zero buffer of the given length.
    #[must_use]
    pub fn zero(len: usize) -> Self {
        Self(vec![0; len])
    }

    /// Validating constructor from raw digits.
    ///
    /// # Errors
    ///
    /// `Pb3Error::ValueOutOfRange` if any digit is outside `{-1, 0, 1}`.
    pub fn from_slice(digits: &[Trit]) -> Result<Self> {
        if digits.iter().any(|&t| !(-1..=1).contains(&t)) {
            return Err(Pb3Error::ValueOutOfRange { field: "trit" });
        }
        Ok(Self(digits.to_vec()))
    }

    /// Number of trits in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the buffer holds no trits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the digits.
    #[must_use]
    pub fn as_slice(&self) -> &[Trit] {
        &self.0
    }

    /// Mutably borrow the digits.
    ///
    /// Callers are responsible for keeping digits in `{-1, 0, 1}`; this
    /// exists so secret-bearing buffers can be scrubbed in place.
    pub fn as_mut_slice(&mut self) -> &mut [Trit] {
        &mut self.0
    }

    /// Append the digits of `other`.
    pub fn extend(&mut self, other: &[Trit]) {
        self.0.extend_from_slice(other);
    }
}

impl From<Trits> for Vec<Trit> {
    fn from(t: Trits) -> Self {
        t.0
    }
}

impl std::fmt::Debug for Trits {
    /// Compact rendering: `+` for 1, `.` for 0, `-` for -1.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Trits[{}](", self.len())?;
        for &t in &self.0 {
            let c = match t {
                1 => '+',
                -1 => '-',
                _ => '.',
            };
            write!(f, "{c}")?;
        }
        write!(f, ")")
    }
}

/// Sum of two trits modulo 3, balanced.
#[must_use]
pub fn add_mod3(a: Trit, b: Trit) -> Trit {
    ((a + 1 + b + 1) % 3) - 1
}

/// Difference of two trits modulo 3, balanced.
#[must_use]
pub fn sub_mod3(a: Trit, b: Trit) -> Trit {
    (((a + 1) - (b + 1)).rem_euclid(3)) - 1
}

/// Encode bytes as trits, six unbalanced base-3 digits per byte.
///
/// Digit `d` in `{0, 1, 2}` is stored as the trit `d - 1`, least significant
/// digit first. The encoding is lossless and fixed-size: `n` bytes become
/// `n * 6` trits.
#[must_use]
pub fn bytes_to_trits(bytes: &[u8]) -> Trits {
    let mut out = Vec::with_capacity(bytes.len() * TRITS_PER_BYTE);
    for &b in bytes {
        let mut v = u32::from(b);
        for _ in 0..TRITS_PER_BYTE {
            out.push((v % 3) as Trit - 1);
            v /= 3;
        }
    }
    Trits(out)
}

/// Decode trits written by [`bytes_to_trits`] back into bytes.
///
/// # Errors
///
/// - `Pb3Error::LengthMismatch` if the length is not a multiple of six.
/// - `Pb3Error::ValueOutOfRange` if a six-trit group decodes above 255.
pub fn trits_to_bytes(trits: &[Trit]) -> Result<Vec<u8>> {
    if trits.len() % TRITS_PER_BYTE != 0 {
        return Err(Pb3Error::LengthMismatch {
            expected: trits.len().div_ceil(TRITS_PER_BYTE) * TRITS_PER_BYTE,
            actual: trits.len(),
        });
    }
    let mut out = Vec::with_capacity(trits.len() / TRITS_PER_BYTE);
    for group in trits.chunks_exact(TRITS_PER_BYTE) {
        let mut v: u32 = 0;
        for &t in group.iter().rev() {
            let d = t + 1;
            if !(0..=2).contains(&d) {
                return Err(Pb3Error::ValueOutOfRange { field: "byte group trit" });
            }
            v = v * 3 + d as u32;
        }
        if v > 255 {
            return Err(Pb3Error::ValueOutOfRange { field: "byte group" });
        }
        out.push(v as u8);
    }
    Ok(out)
}
