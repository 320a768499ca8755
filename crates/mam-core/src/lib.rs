//! MAM Protocol Core
//!
//! Masked Authenticated Messaging: channels and endpoints publish encrypted,
//! signed payloads that any holder of the right key material can decode and
//! verify, without either side sharing long-term secrets beyond the initial
//! exchange.
//!
//! # Session Shape
//!
//! ```text
//! Channel (MSS root)
//!     │ optionally certifies
//!     ▼
//! Endpoint (MSS root)
//!     │ signs
//!     ▼
//! Message header ── wrapped session key per recipient ── first payload
//!     │
//!     ▼ same session key
//! Packet stream (ordinal + cumulative checksum + signature each)
//! ```
//!
//! A message header announces the channel, optionally rotates to a successor
//! and introduces an endpoint, and ships the session key wrapped for each
//! configured recipient (in the clear, under pre-shared keys, or under
//! recipient public keys). Follow-up payloads travel as packets under the
//! same session key.
//!
//! # Security
//!
//! - Every signature covers a fork digest of the running sponge state, so it
//!   commits to every header field before it. Flipping any absorbed trit
//!   invalidates the next signature.
//! - Signing spends one-time Merkle leaves; channels and endpoints are
//!   capacity-bounded at `2^height` signatures and error on exhaustion.
//! - Session keys, pre-shared keys, and signing material zeroize on drop.
//! - Whether a decoded channel or endpoint id is *trusted* is the caller's
//!   policy; this crate only authenticates that the ids signed the bytes.

pub mod channel;
pub mod endpoint;
pub mod error;
pub mod identity;
pub mod keys;
pub mod recv;
pub mod send;

mod codec;

/// Width of a message nonce in trits.
pub const NONCE_SIZE: usize = 81;

/// Width of a packet checksum in trits.
pub const CHECKSUM_SIZE: usize = 81;

pub use channel::{CHANNEL_ID_SIZE, Channel};
pub use endpoint::{ENDPOINT_ID_SIZE, Endpoint};
pub use error::MamError;
pub use identity::Identity;
pub use keys::{
    NtruPkRegistry, PSK_ID_SIZE, PSK_SIZE, Psk, PskRegistry, SESSION_KEY_SIZE, SessionKey,
};
pub use recv::{KeySource, ReceivedMessage, ReceivedPacket, RecvMsgContext, RecvPacketContext};
pub use send::{SendMsgContext, SendPacketContext};
