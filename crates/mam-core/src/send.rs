//! Sender-side message and packet pipelines.
//!
//! A [`SendMsgContext`] encodes one session header: channel announcement,
//! optional rotation and endpoint sections, the wrapped session key for
//! every configured recipient, an authenticating signature, and the first
//! payload. A [`SendPacketContext`] then carries follow-up payloads under
//! the same session key, each with a cumulative checksum and its own
//! signature.
//!
//! Both contexts own their sponge state, so one context maps to one
//! message (or one ordered packet stream) and is not reusable across
//! sessions.

use mam_crypto::{NTRU_CT_SIZE, NTRU_ID_SIZE, Prng, Sponge, SpongeAllocator, ntru};
use mam_proto::{Pb3Writer, TRINT9_SIZE, TRINT18_SIZE, Trit, Trits};

use crate::{
    CHECKSUM_SIZE, NONCE_SIZE,
    channel::{CHANNEL_ID_SIZE, Channel},
    codec::{fork_digest, put, put_flag, put_trint9, put_trint18, trint_len, wrap_with_psk},
    endpoint::{ENDPOINT_ID_SIZE, Endpoint},
    error::MamError,
    identity::Identity,
    keys::{NtruPkRegistry, PSK_ID_SIZE, PskRegistry, SESSION_KEY_SIZE, SessionKey},
};

/// One-shot encoder for a session header message.
///
/// Configure with the builder methods, then call [`encode`](Self::encode)
/// exactly once. Signing spends Merkle leaves on the channel (and endpoint,
/// if one signs), so a failed encode may still have consumed capacity.
pub struct SendMsgContext<'a> {
    allocator: &'a dyn SpongeAllocator,
    sponge: Box<dyn Sponge>,
    fork: Box<dyn Sponge>,
    prng: &'a dyn Prng,
    rng: &'a dyn Prng,
    channel: &'a mut Channel,
    new_channel: Option<&'a Channel>,
    endpoint: Option<&'a mut Endpoint>,
    sign_endpoint: bool,
    nonce: Trits,
    session_key: SessionKey,
    key_plain: bool,
    psks: Option<&'a PskRegistry>,
    ntru_pks: Option<&'a NtruPkRegistry>,
}

impl<'a> SendMsgContext<'a> {
    /// Build a context for `channel` with a fresh sponge pair.
    ///
    /// `prng` derives signatures (deterministic, seed-bound); `rng` feeds
    /// ephemeral key wrapping. Nonce uniqueness per session key is the
    /// caller's contract.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter` if the nonce is not 81 trits wide.
    /// - Allocation failures from the sponge provider.
    pub fn new(
        allocator: &'a dyn SpongeAllocator,
        prng: &'a dyn Prng,
        rng: &'a dyn Prng,
        channel: &'a mut Channel,
        nonce: Trits,
        session_key: SessionKey,
    ) -> Result<Self, MamError> {
        if nonce.len() != NONCE_SIZE {
            return Err(MamError::InvalidParameter("nonce width"));
        }
        Ok(Self {
            allocator,
            sponge: allocator.create_sponge()?,
            fork: allocator.create_sponge()?,
            prng,
            rng,
            channel,
            new_channel: None,
            endpoint: None,
            sign_endpoint: false,
            nonce,
            session_key,
            key_plain: false,
            psks: None,
            ntru_pks: None,
        })
    }

    /// Announce a rotation to `new_channel`, signed by the current channel.
    #[must_use]
    pub fn rotate_to(mut self, new_channel: &'a Channel) -> Self {
        self.new_channel = Some(new_channel);
        self
    }

    /// Publish under `endpoint`. The endpoint signs the message; when
    /// `sign_endpoint` is set the channel additionally signs a binding over
    /// the endpoint id.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &'a mut Endpoint, sign_endpoint: bool) -> Self {
        self.endpoint = Some(endpoint);
        self.sign_endpoint = sign_endpoint;
        self
    }

    /// Ship the session key in the clear (public channel mode).
    #[must_use]
    pub fn key_plain(mut self) -> Self {
        self.key_plain = true;
        self
    }

    /// Wrap the session key for every pre-shared key in `psks`.
    #[must_use]
    pub fn with_psks(mut self, psks: &'a PskRegistry) -> Self {
        self.psks = Some(psks);
        self
    }

    /// Wrap the session key for every recipient public key in `ntru_pks`.
    #[must_use]
    pub fn with_ntru_pks(mut self, ntru_pks: &'a NtruPkRegistry) -> Self {
        self.ntru_pks = Some(ntru_pks);
        self
    }

    fn psk_count(&self) -> usize {
        self.psks.map_or(0, PskRegistry::len)
    }

    fn ntru_count(&self) -> usize {
        self.ntru_pks.map_or(0, NtruPkRegistry::len)
    }

    /// Exact encoded width in trits for a payload of `payload_len` trits.
    #[must_use]
    pub fn size(&self, payload_len: usize) -> usize {
        let channel_sig = self.channel.signature_size();
        let mut size = CHANNEL_ID_SIZE;
        size += 1;
        if self.new_channel.is_some() {
            size += CHANNEL_ID_SIZE + TRINT18_SIZE + channel_sig;
        }
        size += 1;
        if self.endpoint.is_some() {
            size += ENDPOINT_ID_SIZE + 1;
            if self.sign_endpoint {
                size += TRINT18_SIZE + channel_sig;
            }
        }
        size += NONCE_SIZE;
        size += 1;
        if self.key_plain {
            size += SESSION_KEY_SIZE;
        }
        size += TRINT9_SIZE + self.psk_count() * (PSK_ID_SIZE + SESSION_KEY_SIZE);
        size += TRINT9_SIZE + self.ntru_count() * (NTRU_ID_SIZE + NTRU_CT_SIZE);
        let signer_sig = self
            .endpoint
            .as_deref()
            .map_or(channel_sig, Identity::signature_size);
        size += TRINT18_SIZE + signer_sig;
        size += TRINT18_SIZE + payload_len;
        size
    }

    /// Encode the header and encrypted payload.
    ///
    /// # Errors
    ///
    /// - `Crypto(MssExhausted)` when a signer has no leaves left.
    /// - `Wire(ValueOutOfRange)` for a payload too large for a `trint18`
    ///   length prefix.
    /// - Allocation failures from the sponge provider.
    pub fn encode(&mut self, payload: &[Trit]) -> Result<Trits, MamError> {
        let expected = self.size(payload.len());
        let psk_count = self.psk_count();
        let ntru_count = self.ntru_count();
        tracing::debug!(
            payload_len = payload.len(),
            rotation = self.new_channel.is_some(),
            endpoint = self.endpoint.is_some(),
            psks = psk_count,
            ntru_pks = ntru_count,
            key_plain = self.key_plain,
            size = expected,
            "encoding message"
        );

        let mut w = Pb3Writer::with_capacity(expected);
        let sponge = self.sponge.as_mut();

        put(&mut w, sponge, self.channel.id());

        // Rotation: the outgoing channel vouches for its successor.
        put_flag(&mut w, sponge, self.new_channel.is_some());
        if let Some(next) = self.new_channel {
            put(&mut w, sponge, next.id());
            let digest = fork_digest(sponge, self.fork.as_mut());
            let sig = self.channel.sign(self.allocator, self.prng, digest.as_slice())?;
            put_trint18(&mut w, sponge, trint_len(sig.len()))?;
            put(&mut w, sponge, sig.as_slice());
        }

        put_flag(&mut w, sponge, self.endpoint.is_some());
        if let Some(endpoint) = self.endpoint.as_deref() {
            put(&mut w, sponge, endpoint.id());
            put_flag(&mut w, sponge, self.sign_endpoint);
            if self.sign_endpoint {
                let digest = fork_digest(sponge, self.fork.as_mut());
                let sig =
                    self.channel.sign(self.allocator, self.prng, digest.as_slice())?;
                put_trint18(&mut w, sponge, trint_len(sig.len()))?;
                put(&mut w, sponge, sig.as_slice());
            }
        }

        put(&mut w, sponge, self.nonce.as_slice());

        // Session key section: one wrapped copy per recipient, each tagged
        // with the wrapping key's id so receivers look up directly.
        put_flag(&mut w, sponge, self.key_plain);
        if self.key_plain {
            put(&mut w, sponge, self.session_key.as_slice());
        }
        put_trint9(&mut w, sponge, trint_len(psk_count))?;
        if let Some(psks) = self.psks {
            for psk in psks.iter() {
                put(&mut w, sponge, psk.id());
                let wrapped = wrap_with_psk(
                    self.allocator,
                    psk,
                    self.nonce.as_slice(),
                    self.session_key.as_slice(),
                )?;
                put(&mut w, sponge, wrapped.as_slice());
            }
        }
        put_trint9(&mut w, sponge, trint_len(ntru_count))?;
        if let Some(ntru_pks) = self.ntru_pks {
            for (id, pk) in ntru_pks.iter() {
                put(&mut w, sponge, id);
                let ct = ntru::encrypt(
                    self.allocator,
                    pk,
                    self.rng,
                    self.nonce.as_slice(),
                    self.session_key.as_slice(),
                )?;
                put(&mut w, sponge, ct.as_slice());
            }
        }

        // Message signature by the publishing identity.
        let digest = fork_digest(sponge, self.fork.as_mut());
        let sig = match self.endpoint.as_deref_mut() {
            Some(endpoint) => {
                endpoint.sign(self.allocator, self.prng, digest.as_slice())?
            }
            None => self.channel.sign(self.allocator, self.prng, digest.as_slice())?,
        };
        put_trint18(&mut w, sponge, trint_len(sig.len()))?;
        put(&mut w, sponge, sig.as_slice());

        // Only now does the session key enter the stream state, keying the
        // payload. Ciphertext is absorbed by encrypt itself.
        sponge.absorb(self.session_key.as_slice());
        put_trint18(&mut w, sponge, trint_len(payload.len()))?;
        let ct = sponge.encrypt(payload);
        w.write_trits(ct.as_slice());

        debug_assert_eq!(w.len(), expected);
        Ok(w.finish())
    }

    /// Encode into a caller-provided buffer, returning the trits written.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` before any state is consumed if `out` cannot hold
    /// the encoded message; otherwise as [`encode`](Self::encode).
    pub fn encode_into(
        &mut self,
        payload: &[Trit],
        out: &mut [Trit],
    ) -> Result<usize, MamError> {
        let needed = self.size(payload.len());
        if out.len() < needed {
            return Err(MamError::BufferTooSmall { needed, available: out.len() });
        }
        let encoded = self.encode(payload)?;
        out[..needed].copy_from_slice(encoded.as_slice());
        Ok(needed)
    }
}

/// Encoder for an ordered stream of payload packets under one session.
///
/// The caller supplies each packet's ordinal; ordering is a stream level
/// concern and this context does not track or enforce it. The sponge state
/// is cumulative across the stream, so every checksum commits to everything
/// sent before it.
pub struct SendPacketContext<'a> {
    allocator: &'a dyn SpongeAllocator,
    sponge: Box<dyn Sponge>,
    fork: Box<dyn Sponge>,
    prng: &'a dyn Prng,
    signer: &'a mut dyn Identity,
}

impl<'a> SendPacketContext<'a> {
    /// Build a packet context keyed by `session_key`.
    ///
    /// # Errors
    ///
    /// Allocation failures from the sponge provider.
    pub fn new(
        allocator: &'a dyn SpongeAllocator,
        prng: &'a dyn Prng,
        signer: &'a mut dyn Identity,
        session_key: &[Trit],
    ) -> Result<Self, MamError> {
        let mut sponge = allocator.create_sponge()?;
        sponge.absorb(session_key);
        Ok(Self {
            allocator,
            sponge,
            fork: allocator.create_sponge()?,
            prng,
            signer,
        })
    }

    /// Exact encoded width in trits for a payload of `payload_len` trits.
    #[must_use]
    pub fn size(&self, payload_len: usize) -> usize {
        TRINT18_SIZE
            + TRINT18_SIZE
            + payload_len
            + CHECKSUM_SIZE
            + TRINT18_SIZE
            + self.signer.signature_size()
    }

    /// Encode one packet carrying `ord`.
    ///
    /// # Errors
    ///
    /// - `Crypto(MssExhausted)` when the signer has no leaves left.
    /// - `Wire(ValueOutOfRange)` for an oversized payload.
    pub fn encode(&mut self, ord: i64, payload: &[Trit]) -> Result<Trits, MamError> {
        let expected = self.size(payload.len());
        tracing::debug!(ord, payload_len = payload.len(), "encoding packet");

        let mut w = Pb3Writer::with_capacity(expected);
        let sponge = self.sponge.as_mut();

        put_trint18(&mut w, sponge, ord)?;
        put_trint18(&mut w, sponge, trint_len(payload.len()))?;
        let ct = sponge.encrypt(payload);
        w.write_trits(ct.as_slice());

        // Checksum squeezed from the cumulative state; squeeze advances
        // both sides identically so it is not re-absorbed.
        let checksum = sponge.squeeze(CHECKSUM_SIZE);
        w.write_trits(checksum.as_slice());

        let digest = fork_digest(sponge, self.fork.as_mut());
        let sig = self.signer.sign(self.allocator, self.prng, digest.as_slice())?;
        put_trint18(&mut w, sponge, trint_len(sig.len()))?;
        put(&mut w, sponge, sig.as_slice());

        debug_assert_eq!(w.len(), expected);
        Ok(w.finish())
    }
}
