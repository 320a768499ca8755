//! Receiver-side message and packet pipelines.
//!
//! Decoding mirrors encoding field for field: every header trit is absorbed
//! into the main sponge in wire order, so honest sender and receiver evolve
//! identical sponge state and every signature verifies against the same
//! fork digest the sender produced. Decode is fail-fast: the first
//! malformed field, failed verification, or unmatchable key aborts with an
//! error and no partial payload.
//!
//! Trust is out of scope here. The decoder authenticates that the declared
//! identities produced the message; whether those identities are *trusted*
//! is the caller's policy, applied to the ids in [`ReceivedMessage`].

use mam_crypto::{Mss, NTRU_CT_SIZE, NTRU_ID_SIZE, NtruSk, Sponge, SpongeAllocator};
use mam_proto::{Pb3Reader, Trit, Trits};

use crate::{
    CHECKSUM_SIZE, NONCE_SIZE,
    channel::CHANNEL_ID_SIZE,
    codec::{fork_digest, take, take_flag, take_length, take_trint9, take_trint18, unwrap_with_psk},
    endpoint::ENDPOINT_ID_SIZE,
    error::MamError,
    keys::{PSK_ID_SIZE, PskRegistry, SESSION_KEY_SIZE},
};

/// Which key in the session-key section recovered the payload key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The session key was shipped in the clear.
    Plain,
    /// Unwrapped with the pre-shared key carrying this id.
    Psk(Trits),
    /// Unwrapped with the recipient secret key matching this public key id.
    Ntru(Trits),
}

/// A fully decoded and verified session header message.
#[derive(Debug)]
pub struct ReceivedMessage {
    /// Declared channel identity (verified as the header signer or the
    /// endpoint's certifier).
    pub channel_id: Trits,
    /// Successor channel id, when the message announces a rotation.
    pub new_channel_id: Option<Trits>,
    /// Publishing endpoint id, when one is present.
    pub endpoint_id: Option<Trits>,
    /// Message nonce.
    pub nonce: Trits,
    /// How the session key was recovered.
    pub key_source: KeySource,
    /// Identity whose signature authenticated the message: the endpoint if
    /// present, otherwise the channel.
    pub signer_id: Trits,
    /// Decrypted payload.
    pub payload: Trits,
}

/// One payload packet decoded from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    /// Ordinal the sender stamped on this packet.
    pub ord: i64,
    /// Decrypted payload.
    pub payload: Trits,
}

/// One-shot decoder for a session header message.
pub struct RecvMsgContext<'a> {
    allocator: &'a dyn SpongeAllocator,
    sponge: Box<dyn Sponge>,
    fork: Box<dyn Sponge>,
    psks: Option<&'a PskRegistry>,
    ntru_sk: Option<&'a NtruSk>,
}

impl<'a> RecvMsgContext<'a> {
    /// Build a decode context with a fresh sponge pair.
    ///
    /// # Errors
    ///
    /// Allocation failures from the sponge provider.
    pub fn new(allocator: &'a dyn SpongeAllocator) -> Result<Self, MamError> {
        Ok(Self {
            allocator,
            sponge: allocator.create_sponge()?,
            fork: allocator.create_sponge()?,
            psks: None,
            ntru_sk: None,
        })
    }

    /// Candidate pre-shared keys for session-key recovery.
    #[must_use]
    pub fn with_psks(mut self, psks: &'a PskRegistry) -> Self {
        self.psks = Some(psks);
        self
    }

    /// Recipient secret key for session-key recovery.
    #[must_use]
    pub fn with_ntru_sk(mut self, ntru_sk: &'a NtruSk) -> Self {
        self.ntru_sk = Some(ntru_sk);
        self
    }

    /// Decode and verify one message.
    ///
    /// Trailing trits after the encoded message are ignored, so a message
    /// can be decoded out of a larger carrier.
    ///
    /// # Errors
    ///
    /// - `Wire` for truncation or malformed fields.
    /// - `SignatureInvalid` when a rotation, binding, or message signature
    ///   does not verify against its declared identity.
    /// - `KeyNotFound` when the key section carries no key this context can
    ///    recover.
    #[allow(clippy::too_many_lines)]
    pub fn decode(&mut self, encoded: &[Trit]) -> Result<ReceivedMessage, MamError> {
        // Validate digits up front so sponge arithmetic never sees an
        // out-of-range trit from a hostile buffer.
        let input = Trits::from_slice(encoded)?;
        let mut r = Pb3Reader::new(input.as_slice());
        let sponge = self.sponge.as_mut();

        let channel_id = Trits::from_slice(take(&mut r, sponge, CHANNEL_ID_SIZE)?)?;

        let new_channel_id = if take_flag(&mut r, sponge)? {
            let next = Trits::from_slice(take(&mut r, sponge, CHANNEL_ID_SIZE)?)?;
            let digest = fork_digest(sponge, self.fork.as_mut());
            let sig_len = take_length(&mut r, sponge)?;
            let sig = take(&mut r, sponge, sig_len)?;
            if !Mss::verify(self.allocator, channel_id.as_slice(), digest.as_slice(), sig)? {
                tracing::warn!("rotation signature rejected");
                return Err(MamError::SignatureInvalid { context: "channel rotation" });
            }
            Some(next)
        } else {
            None
        };

        let endpoint_id = if take_flag(&mut r, sponge)? {
            let id = Trits::from_slice(take(&mut r, sponge, ENDPOINT_ID_SIZE)?)?;
            if take_flag(&mut r, sponge)? {
                let digest = fork_digest(sponge, self.fork.as_mut());
                let sig_len = take_length(&mut r, sponge)?;
                let sig = take(&mut r, sponge, sig_len)?;
                if !Mss::verify(
                    self.allocator,
                    channel_id.as_slice(),
                    digest.as_slice(),
                    sig,
                )? {
                    tracing::warn!("endpoint binding signature rejected");
                    return Err(MamError::SignatureInvalid { context: "endpoint binding" });
                }
            }
            Some(id)
        } else {
            None
        };

        let nonce = Trits::from_slice(take(&mut r, sponge, NONCE_SIZE)?)?;

        // Session-key section. Every entry is absorbed whether or not we
        // hold its key, keeping the sponge in lockstep with the sender.
        let mut session_key: Option<Trits> = None;
        let mut key_source: Option<KeySource> = None;
        let mut candidates = 0usize;

        if take_flag(&mut r, sponge)? {
            let key = Trits::from_slice(take(&mut r, sponge, SESSION_KEY_SIZE)?)?;
            session_key = Some(key);
            key_source = Some(KeySource::Plain);
        }

        let psk_count = usize::try_from(take_trint9(&mut r, sponge)?)
            .map_err(|_| MamError::FormatInvalid("negative psk count"))?;
        for _ in 0..psk_count {
            candidates += 1;
            let id = take(&mut r, sponge, PSK_ID_SIZE)?;
            let wrapped = take(&mut r, sponge, SESSION_KEY_SIZE)?;
            if session_key.is_none()
                && let Some(psk) = self.psks.and_then(|p| p.find(id))
            {
                let key =
                    unwrap_with_psk(self.allocator, psk, nonce.as_slice(), wrapped)?;
                session_key = Some(key);
                key_source = Some(KeySource::Psk(Trits::from_slice(id)?));
            }
        }

        let own_ntru_id = match self.ntru_sk {
            Some(sk) => Some(sk.public_key().id(self.allocator)?),
            None => None,
        };
        let ntru_count = usize::try_from(take_trint9(&mut r, sponge)?)
            .map_err(|_| MamError::FormatInvalid("negative ntru count"))?;
        for _ in 0..ntru_count {
            candidates += 1;
            let id = take(&mut r, sponge, NTRU_ID_SIZE)?;
            let ct = take(&mut r, sponge, NTRU_CT_SIZE)?;
            if session_key.is_none()
                && let (Some(sk), Some(own_id)) = (self.ntru_sk, own_ntru_id.as_ref())
                && own_id.as_slice() == id
            {
                let key = sk.decrypt(self.allocator, nonce.as_slice(), ct)?;
                session_key = Some(key);
                key_source = Some(KeySource::Ntru(Trits::from_slice(id)?));
            }
        }

        let (session_key, key_source) = match (session_key, key_source) {
            (Some(key), Some(source)) => (key, source),
            _ => {
                tracing::warn!(candidates, "no recoverable session key");
                return Err(MamError::KeyNotFound { candidates });
            }
        };

        let digest = fork_digest(sponge, self.fork.as_mut());
        let sig_len = take_length(&mut r, sponge)?;
        let sig = take(&mut r, sponge, sig_len)?;
        let signer_id = endpoint_id.clone().unwrap_or_else(|| channel_id.clone());
        if !Mss::verify(self.allocator, signer_id.as_slice(), digest.as_slice(), sig)? {
            tracing::warn!("message signature rejected");
            return Err(MamError::SignatureInvalid { context: "message" });
        }

        sponge.absorb(session_key.as_slice());
        let payload_len = take_length(&mut r, sponge)?;
        // Ciphertext is absorbed by decrypt itself, not via take.
        let ct = r.read_trits(payload_len)?;
        let payload = sponge.decrypt(ct);

        tracing::debug!(
            payload_len,
            rotation = new_channel_id.is_some(),
            endpoint = endpoint_id.is_some(),
            "message decoded"
        );
        Ok(ReceivedMessage {
            channel_id,
            new_channel_id,
            endpoint_id,
            nonce,
            key_source,
            signer_id,
            payload,
        })
    }
}

/// Decoder for an ordered stream of payload packets under one session.
///
/// Must see packets in the order they were encoded: the sponge state is
/// cumulative, so a dropped, replayed, or reordered packet fails its
/// checksum.
pub struct RecvPacketContext<'a> {
    allocator: &'a dyn SpongeAllocator,
    sponge: Box<dyn Sponge>,
    fork: Box<dyn Sponge>,
    signer_id: &'a [Trit],
}

impl<'a> RecvPacketContext<'a> {
    /// Build a packet decoder keyed by `session_key`, verifying signatures
    /// against `signer_id`.
    ///
    /// # Errors
    ///
    /// Allocation failures from the sponge provider.
    pub fn new(
        allocator: &'a dyn SpongeAllocator,
        signer_id: &'a [Trit],
        session_key: &[Trit],
    ) -> Result<Self, MamError> {
        let mut sponge = allocator.create_sponge()?;
        sponge.absorb(session_key);
        Ok(Self {
            allocator,
            sponge,
            fork: allocator.create_sponge()?,
            signer_id,
        })
    }

    /// Decode and verify the next packet in the stream.
    ///
    /// # Errors
    ///
    /// - `Wire` for truncation or malformed fields.
    /// - `ChecksumMismatch` when the cumulative checksum disagrees, which
    ///   also covers replay and reordering.
    /// - `SignatureInvalid` when the packet signature does not verify.
    pub fn decode(&mut self, encoded: &[Trit]) -> Result<ReceivedPacket, MamError> {
        let input = Trits::from_slice(encoded)?;
        let mut r = Pb3Reader::new(input.as_slice());
        let sponge = self.sponge.as_mut();

        let ord = take_trint18(&mut r, sponge)?;
        let payload_len = take_length(&mut r, sponge)?;
        let ct = r.read_trits(payload_len)?;
        let payload = sponge.decrypt(ct);

        let declared = r.read_trits(CHECKSUM_SIZE)?;
        let expected = sponge.squeeze(CHECKSUM_SIZE);
        if expected.as_slice() != declared {
            tracing::warn!(ord, "packet checksum rejected");
            return Err(MamError::ChecksumMismatch);
        }

        let digest = fork_digest(sponge, self.fork.as_mut());
        let sig_len = take_length(&mut r, sponge)?;
        let sig = take(&mut r, sponge, sig_len)?;
        if !Mss::verify(self.allocator, self.signer_id, digest.as_slice(), sig)? {
            tracing::warn!(ord, "packet signature rejected");
            return Err(MamError::SignatureInvalid { context: "packet" });
        }

        tracing::debug!(ord, payload_len, "packet decoded");
        Ok(ReceivedPacket { ord, payload })
    }
}
