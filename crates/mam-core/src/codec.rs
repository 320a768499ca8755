//! Shared encode/decode plumbing for the message and packet pipelines.
//!
//! Every header field travels through these helpers so the wire buffer and
//! the running sponge stay in lockstep: whatever a sender writes and
//! absorbs, the receiver reads and absorbs in the same order. Signatures
//! cover a fork digest derived from the main sponge, which commits them to
//! every field absorbed so far without disturbing the main state.

use mam_crypto::{HASH_SIZE, Sponge, SpongeAllocator};
use mam_proto::{Pb3Error, Pb3Reader, Pb3Writer, TRINT9_SIZE, TRINT18_SIZE, Trit, Trits};

use crate::{error::MamError, keys::Psk};

/// Write raw trits and absorb them.
pub(crate) fn put(w: &mut Pb3Writer, sponge: &mut dyn Sponge, trits: &[Trit]) {
    w.write_trits(trits);
    sponge.absorb(trits);
}

/// Write a presence flag and absorb it.
pub(crate) fn put_flag(w: &mut Pb3Writer, sponge: &mut dyn Sponge, present: bool) {
    let start = w.len();
    w.write_flag(present);
    sponge.absorb(&w.as_slice()[start..]);
}

/// Write a `trint9` and absorb its encoding.
pub(crate) fn put_trint9(
    w: &mut Pb3Writer,
    sponge: &mut dyn Sponge,
    value: i64,
) -> Result<(), Pb3Error> {
    let start = w.len();
    w.write_trint9(value)?;
    sponge.absorb(&w.as_slice()[start..]);
    Ok(())
}

/// Write a `trint18` and absorb its encoding.
pub(crate) fn put_trint18(
    w: &mut Pb3Writer,
    sponge: &mut dyn Sponge,
    value: i64,
) -> Result<(), Pb3Error> {
    let start = w.len();
    w.write_trint18(value)?;
    sponge.absorb(&w.as_slice()[start..]);
    Ok(())
}

/// Read exactly `n` trits and absorb them.
pub(crate) fn take<'a>(
    r: &mut Pb3Reader<'a>,
    sponge: &mut dyn Sponge,
    n: usize,
) -> Result<&'a [Trit], Pb3Error> {
    let trits = r.read_trits(n)?;
    sponge.absorb(trits);
    Ok(trits)
}

/// Read a presence flag and absorb it.
pub(crate) fn take_flag(
    r: &mut Pb3Reader<'_>,
    sponge: &mut dyn Sponge,
) -> Result<bool, Pb3Error> {
    let raw = take(r, sponge, 1)?;
    match raw[0] {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(Pb3Error::ValueOutOfRange { field: "presence flag" }),
    }
}

/// Read a `trint9` and absorb its encoding.
pub(crate) fn take_trint9(
    r: &mut Pb3Reader<'_>,
    sponge: &mut dyn Sponge,
) -> Result<i64, Pb3Error> {
    let raw = take(r, sponge, TRINT9_SIZE)?;
    Pb3Reader::new(raw).read_trint9()
}

/// Read a `trint18` and absorb its encoding.
pub(crate) fn take_trint18(
    r: &mut Pb3Reader<'_>,
    sponge: &mut dyn Sponge,
) -> Result<i64, Pb3Error> {
    let raw = take(r, sponge, TRINT18_SIZE)?;
    Pb3Reader::new(raw).read_trint18()
}

/// Read a `trint18` length prefix, absorb it, and validate it against what
/// remains in the stream.
pub(crate) fn take_length(
    r: &mut Pb3Reader<'_>,
    sponge: &mut dyn Sponge,
) -> Result<usize, Pb3Error> {
    let raw = take_trint18(r, sponge)?;
    let len = usize::try_from(raw)
        .map_err(|_| Pb3Error::ValueOutOfRange { field: "length prefix" })?;
    if len > r.remaining() {
        return Err(Pb3Error::Truncated { needed: len, available: r.remaining() });
    }
    Ok(len)
}

/// Lossy usize-to-i64 for length prefixes. Saturates so an absurd length
/// surfaces as `ValueOutOfRange` from the trint encoder instead of a cast
/// truncation.
pub(crate) fn trint_len(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX)
}

/// Derive the digest a signature covers at this point in the stream.
///
/// Squeezes a commitment out of the main sponge (advancing it, so sender
/// and receiver move together), then runs it through the reset fork sponge
/// so signing operates on an independent state.
pub(crate) fn fork_digest(main: &mut dyn Sponge, fork: &mut dyn Sponge) -> Trits {
    let seed = main.squeeze(HASH_SIZE);
    fork.reset();
    fork.absorb(seed.as_slice());
    fork.squeeze(HASH_SIZE)
}

/// Encrypt a session key under a pre-shared key, bound to the message
/// nonce. Uses a scratch sponge so the main stream state is untouched.
pub(crate) fn wrap_with_psk(
    allocator: &dyn SpongeAllocator,
    psk: &Psk,
    nonce: &[Trit],
    session_key: &[Trit],
) -> Result<Trits, MamError> {
    let mut sponge = allocator.create_sponge()?;
    sponge.absorb(psk.secret());
    sponge.absorb(nonce);
    let wrapped = sponge.encrypt(session_key);
    allocator.destroy_sponge(sponge);
    Ok(wrapped)
}

/// Inverse of [`wrap_with_psk`].
pub(crate) fn unwrap_with_psk(
    allocator: &dyn SpongeAllocator,
    psk: &Psk,
    nonce: &[Trit],
    wrapped: &[Trit],
) -> Result<Trits, MamError> {
    let mut sponge = allocator.create_sponge()?;
    sponge.absorb(psk.secret());
    sponge.absorb(nonce);
    let key = sponge.decrypt(wrapped);
    allocator.destroy_sponge(sponge);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use mam_crypto::{HostAllocator, Prng, TritPrng};
    use mam_proto::Trits;

    use super::*;
    use crate::keys::{PSK_ID_SIZE, SESSION_KEY_SIZE};

    fn sponge_pair() -> (Box<dyn Sponge>, Box<dyn Sponge>) {
        let alloc = HostAllocator;
        (alloc.create_sponge().unwrap(), alloc.create_sponge().unwrap())
    }

    #[test]
    fn put_take_keep_sponges_in_lockstep() {
        let (mut tx, mut rx) = sponge_pair();

        let mut w = Pb3Writer::new();
        put(&mut w, tx.as_mut(), &[1, -1, 0]);
        put_flag(&mut w, tx.as_mut(), true);
        put_trint9(&mut w, tx.as_mut(), -42).unwrap();
        put_trint18(&mut w, tx.as_mut(), 100_000).unwrap();
        let wire = w.finish();

        let mut r = Pb3Reader::new(wire.as_slice());
        assert_eq!(take(&mut r, rx.as_mut(), 3).unwrap(), &[1, -1, 0]);
        assert!(take_flag(&mut r, rx.as_mut()).unwrap());
        assert_eq!(take_trint9(&mut r, rx.as_mut()).unwrap(), -42);
        assert_eq!(take_trint18(&mut r, rx.as_mut()).unwrap(), 100_000);
        assert!(r.is_exhausted());

        // Identical absorb history means identical squeeze output
        assert_eq!(tx.squeeze(81), rx.squeeze(81));
    }

    #[test]
    fn fork_digest_advances_main_state() {
        let (mut main, mut fork) = sponge_pair();
        main.absorb(&[1, 1, -1]);
        let first = fork_digest(main.as_mut(), fork.as_mut());
        let second = fork_digest(main.as_mut(), fork.as_mut());
        assert_eq!(first.len(), HASH_SIZE);
        assert_ne!(first, second);
    }

    #[test]
    fn psk_wrap_round_trip_is_nonce_bound() {
        let alloc = HostAllocator;
        let prng = TritPrng::from_seed(b"codec seed");
        let psk =
            Psk::generate(&prng, Trits::from_slice(&[1; PSK_ID_SIZE]).unwrap()).unwrap();
        let key = prng.generate(&[&[0]], SESSION_KEY_SIZE);
        let nonce = prng.generate(&[&[1]], 81);

        let ct = wrap_with_psk(&alloc, &psk, nonce.as_slice(), key.as_slice()).unwrap();
        assert_ne!(ct, key);
        let back = unwrap_with_psk(&alloc, &psk, nonce.as_slice(), ct.as_slice()).unwrap();
        assert_eq!(back, key);

        let other_nonce = prng.generate(&[&[-1]], 81);
        let garbage =
            unwrap_with_psk(&alloc, &psk, other_nonce.as_slice(), ct.as_slice()).unwrap();
        assert_ne!(garbage, key);
    }
}
