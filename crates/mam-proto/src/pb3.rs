//! PB3 positional codec primitives.
//!
//! PB3 fields are written in a fixed order with one-trit presence flags for
//! optional sections and fixed-width balanced-ternary integers (`trint9`,
//! `trint18`) for counts, ordinals and length prefixes. Receivers decode
//! positionally, so field order and widths are part of the wire contract.
//!
//! The reader is fail-fast: every read validates that enough trits remain
//! before touching the buffer, and malformed values (a flag trit of -1, an
//! out-of-domain integer) surface as [`Pb3Error`] immediately.

use crate::{
    errors::{Pb3Error, Result},
    trits::{Trit, Trits},
};

/// Width of a `trint9` field (range ±9_841).
pub const TRINT9_SIZE: usize = 9;

/// Width of a `trint18` field (range ±193_710_244).
pub const TRINT18_SIZE: usize = 18;

/// Encode `value` as `width` balanced-ternary digits, least significant
/// first.
///
/// # Errors
///
/// `Pb3Error::ValueOutOfRange` if the value does not fit the width.
fn encode_trint(value: i64, width: usize, out: &mut Vec<Trit>) -> Result<()> {
    let mut digits = [0i8; TRINT18_SIZE];
    let mut v = value;
    for slot in digits.iter_mut().take(width) {
        let r = v.rem_euclid(3);
        let digit: i64 = if r == 2 { -1 } else { r };
        *slot = digit as Trit;
        v = (v - digit) / 3;
    }
    if v != 0 {
        return Err(Pb3Error::ValueOutOfRange { field: "trint" });
    }
    out.extend_from_slice(&digits[..width]);
    Ok(())
}

/// Decode a fixed-width balanced-ternary integer.
fn decode_trint(digits: &[Trit]) -> i64 {
    digits.iter().rev().fold(0i64, |acc, &t| acc * 3 + i64::from(t))
}

/// Growable trit sink for assembling a PB3 message.
#[derive(Debug, Default)]
pub struct Pb3Writer {
    buf: Vec<Trit>,
}

impl Pb3Writer {
    /// Empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer pre-sized for an expected encoded length.
    #[must_use]
    pub fn with_capacity(trits: usize) -> Self {
        Self { buf: Vec::with_capacity(trits) }
    }

    /// Trits written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append raw trits.
    pub fn write_trits(&mut self, trits: &[Trit]) {
        self.buf.extend_from_slice(trits);
    }

    /// Append a one-trit presence flag: 1 for present, 0 for absent.
    pub fn write_flag(&mut self, present: bool) {
        self.buf.push(Trit::from(present));
    }

    /// Append a `trint9`.
    pub fn write_trint9(&mut self, value: i64) -> Result<()> {
        encode_trint(value, TRINT9_SIZE, &mut self.buf)
    }

    /// Append a `trint18`.
    pub fn write_trint18(&mut self, value: i64) -> Result<()> {
        encode_trint(value, TRINT18_SIZE, &mut self.buf)
    }

    /// Finish and take the assembled buffer.
    #[must_use]
    pub fn finish(self) -> Trits {
        // Digits only enter through validated paths, so this cannot fail.
        Trits::from_slice(&self.buf).unwrap_or_default()
    }

    /// Borrow what has been written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[Trit] {
        &self.buf
    }
}

/// Cursor over a received trit stream.
///
/// Reads are exact-size: a field either consumes precisely its declared
/// width or fails with [`Pb3Error::Truncated`] without advancing past the
/// end. Trailing trits after the last field are the caller's concern.
#[derive(Debug)]
pub struct Pb3Reader<'a> {
    trits: &'a [Trit],
    pos: usize,
}

impl<'a> Pb3Reader<'a> {
    /// Reader over the full input.
    #[must_use]
    pub fn new(trits: &'a [Trit]) -> Self {
        Self { trits, pos: 0 }
    }

    /// Trits not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.trits.len() - self.pos
    }

    /// True when every trit has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` trits.
    ///
    /// # Errors
    ///
    /// `Pb3Error::Truncated` if fewer than `n` trits remain.
    pub fn read_trits(&mut self, n: usize) -> Result<&'a [Trit]> {
        if self.remaining() < n {
            return Err(Pb3Error::Truncated { needed: n, available: self.remaining() });
        }
        let out = &self.trits[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Consume a presence flag.
    ///
    /// # Errors
    ///
    /// - `Pb3Error::Truncated` on empty input.
    /// - `Pb3Error::ValueOutOfRange` if the trit is -1 (flags are 0 or 1).
    pub fn read_flag(&mut self) -> Result<bool> {
        let t = self.read_trits(1)?[0];
        match t {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(Pb3Error::ValueOutOfRange { field: "presence flag" }),
        }
    }

    /// Consume a `trint9`.
    pub fn read_trint9(&mut self) -> Result<i64> {
        Ok(decode_trint(self.read_trits(TRINT9_SIZE)?))
    }

    /// Consume a `trint18`.
    pub fn read_trint18(&mut self) -> Result<i64> {
        Ok(decode_trint(self.read_trits(TRINT18_SIZE)?))
    }

    /// Consume a `trint18` and validate it as a non-negative length that
    /// still fits the remaining input.
    ///
    /// # Errors
    ///
    /// - `Pb3Error::ValueOutOfRange` for negative lengths.
    /// - `Pb3Error::Truncated` if the declared length exceeds what remains.
    pub fn read_length(&mut self) -> Result<usize> {
        let raw = self.read_trint18()?;
        let len = usize::try_from(raw)
            .map_err(|_| Pb3Error::ValueOutOfRange { field: "length prefix" })?;
        if len > self.remaining() {
            return Err(Pb3Error::Truncated { needed: len, available: self.remaining() });
        }
        Ok(len)
    }
}
