//! End-to-end message pipeline tests: encode on one side, decode on a
//! fresh context, verify payloads, identities, and failure modes.

use mam_core::{
    Channel, Endpoint, Identity, KeySource, MamError, NONCE_SIZE, PSK_ID_SIZE, Psk,
    PskRegistry, NtruPkRegistry, RecvMsgContext, SendMsgContext, SessionKey,
};
use mam_crypto::{CryptoError, HostAllocator, NtruSk, Prng, TritPrng};
use mam_proto::{TRINT18_SIZE, Trits, bytes_to_trits, trits_to_bytes};

fn fresh_nonce(prng: &TritPrng, tag: i8) -> Trits {
    prng.generate(&[&[tag]], NONCE_SIZE)
}

fn psk_id(fill: i8) -> Trits {
    Trits::from_slice(&[fill; PSK_ID_SIZE]).unwrap()
}

#[test]
fn hello_round_trip_on_public_channel() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"hello seed");
    let mut channel = Channel::create(&alloc, &prng, 2, Trits::default()).unwrap();
    let channel_id = Trits::from_slice(channel.id()).unwrap();

    let nonce = fresh_nonce(&prng, 1);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let payload = bytes_to_trits(b"HELLO");

    let mut tx =
        SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce.clone(), key)
            .unwrap()
            .key_plain();
    let expected_size = tx.size(payload.len());
    let encoded = tx.encode(payload.as_slice()).unwrap();
    assert_eq!(encoded.len(), expected_size);

    let mut rx = RecvMsgContext::new(&alloc).unwrap();
    let msg = rx.decode(encoded.as_slice()).unwrap();

    assert_eq!(msg.payload, payload);
    assert_eq!(trits_to_bytes(msg.payload.as_slice()).unwrap(), b"HELLO");
    assert_eq!(msg.channel_id, channel_id);
    assert_eq!(msg.signer_id, channel_id);
    assert_eq!(msg.nonce, nonce);
    assert_eq!(msg.key_source, KeySource::Plain);
    assert!(msg.new_channel_id.is_none());
    assert!(msg.endpoint_id.is_none());
}

#[test]
fn second_psk_alone_recovers_the_payload() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"psk seed");
    let mut channel = Channel::create(&alloc, &prng, 1, Trits::default()).unwrap();

    let mut sender_psks = PskRegistry::new();
    sender_psks.add(Psk::generate(&prng, psk_id(1)).unwrap());
    sender_psks.add(Psk::generate(&prng, psk_id(-1)).unwrap());

    let nonce = fresh_nonce(&prng, 0);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let payload = bytes_to_trits(b"for the second key only");

    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .with_psks(&sender_psks);
    let encoded = tx.encode(payload.as_slice()).unwrap();

    // Receiver holds only the second of the two declared keys.
    let mut receiver_psks = PskRegistry::new();
    receiver_psks.add(Psk::generate(&prng, psk_id(-1)).unwrap());

    let mut rx = RecvMsgContext::new(&alloc).unwrap().with_psks(&receiver_psks);
    let msg = rx.decode(encoded.as_slice()).unwrap();

    assert_eq!(msg.payload, payload);
    assert_eq!(msg.key_source, KeySource::Psk(psk_id(-1)));
}

#[test]
fn missing_key_is_a_distinct_error() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"psk seed");
    let mut channel = Channel::create(&alloc, &prng, 1, Trits::default()).unwrap();

    let mut psks = PskRegistry::new();
    psks.add(Psk::generate(&prng, psk_id(1)).unwrap());
    psks.add(Psk::generate(&prng, psk_id(0)).unwrap());

    let nonce = fresh_nonce(&prng, 1);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .with_psks(&psks);
    let encoded = tx.encode(bytes_to_trits(b"locked").as_slice()).unwrap();

    // No key material at all on the receiving side.
    let mut rx = RecvMsgContext::new(&alloc).unwrap();
    assert_eq!(
        rx.decode(encoded.as_slice()).unwrap_err(),
        MamError::KeyNotFound { candidates: 2 }
    );
}

#[test]
fn ntru_wrapped_key_round_trip() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"ntru seed");
    let mut channel = Channel::create(&alloc, &prng, 1, Trits::default()).unwrap();

    let recipient = NtruSk::generate(&prng, &[1, -1, 1]);
    let stranger = NtruSk::generate(&prng, &[0, 0, 1]);
    let mut pks = NtruPkRegistry::new();
    pks.add(&alloc, recipient.public_key().clone()).unwrap();

    let nonce = fresh_nonce(&prng, -1);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let payload = bytes_to_trits(b"wrapped");
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .with_ntru_pks(&pks);
    let encoded = tx.encode(payload.as_slice()).unwrap();

    let mut rx = RecvMsgContext::new(&alloc).unwrap().with_ntru_sk(&recipient);
    let msg = rx.decode(encoded.as_slice()).unwrap();
    assert_eq!(msg.payload, payload);
    let expected_id = recipient.public_key().id(&alloc).unwrap();
    assert_eq!(msg.key_source, KeySource::Ntru(expected_id));

    // A different secret key never matches the declared id.
    let mut rx = RecvMsgContext::new(&alloc).unwrap().with_ntru_sk(&stranger);
    assert_eq!(
        rx.decode(encoded.as_slice()).unwrap_err(),
        MamError::KeyNotFound { candidates: 1 }
    );
}

#[test]
fn rotation_announces_and_certifies_the_successor() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"rotation seed");
    let mut current =
        Channel::create(&alloc, &prng, 2, Trits::from_slice(&[1]).unwrap()).unwrap();
    let next =
        Channel::create(&alloc, &prng, 2, Trits::from_slice(&[-1]).unwrap()).unwrap();

    let nonce = fresh_nonce(&prng, 1);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut current, nonce, key)
        .unwrap()
        .rotate_to(&next)
        .key_plain();
    let encoded = tx.encode(bytes_to_trits(b"moving").as_slice()).unwrap();

    let mut rx = RecvMsgContext::new(&alloc).unwrap();
    let msg = rx.decode(encoded.as_slice()).unwrap();
    assert_eq!(msg.new_channel_id.as_ref().map(Trits::as_slice), Some(next.id()));
}

#[test]
fn endpoint_signs_and_channel_binds_it() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"endpoint seed");
    let ch_name = Trits::from_slice(&[1, 0, -1]).unwrap();
    let mut channel = Channel::create(&alloc, &prng, 1, ch_name.clone()).unwrap();
    let mut endpoint =
        Endpoint::create(&alloc, &prng, 1, ch_name, Trits::from_slice(&[1]).unwrap())
            .unwrap();
    let endpoint_id = Trits::from_slice(endpoint.id()).unwrap();

    let nonce = fresh_nonce(&prng, 0);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .with_endpoint(&mut endpoint, true)
        .key_plain();
    let encoded = tx.encode(bytes_to_trits(b"signed at the edge").as_slice()).unwrap();

    let mut rx = RecvMsgContext::new(&alloc).unwrap();
    let msg = rx.decode(encoded.as_slice()).unwrap();
    assert_eq!(msg.endpoint_id, Some(endpoint_id.clone()));
    assert_eq!(msg.signer_id, endpoint_id);
}

#[test]
fn binding_does_not_transfer_to_another_channel() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"binding seed");
    let ch_name = Trits::from_slice(&[-1, 1]).unwrap();
    let mut channel = Channel::create(&alloc, &prng, 1, ch_name.clone()).unwrap();
    let other = Channel::create(&alloc, &prng, 1, Trits::from_slice(&[0]).unwrap())
        .unwrap();
    let mut endpoint =
        Endpoint::create(&alloc, &prng, 1, ch_name, Trits::from_slice(&[1]).unwrap())
            .unwrap();

    let nonce = fresh_nonce(&prng, 2);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .with_endpoint(&mut endpoint, true)
        .key_plain();
    let encoded = tx.encode(bytes_to_trits(b"bound").as_slice()).unwrap();

    // Splice in a different channel id; the binding signature must not
    // verify against it.
    let mut forged: Vec<i8> = encoded.into();
    forged[..other.id().len()].copy_from_slice(other.id());
    let mut rx = RecvMsgContext::new(&alloc).unwrap();
    assert_eq!(
        rx.decode(&forged).unwrap_err(),
        MamError::SignatureInvalid { context: "endpoint binding" }
    );
}

#[test]
fn header_tampering_is_always_rejected() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"tamper seed");
    let ch_name = Trits::from_slice(&[0, 1]).unwrap();
    let mut channel = Channel::create(&alloc, &prng, 1, ch_name.clone()).unwrap();
    let next = Channel::create(&alloc, &prng, 1, Trits::default()).unwrap();
    let mut endpoint =
        Endpoint::create(&alloc, &prng, 1, ch_name, Trits::from_slice(&[-1]).unwrap())
            .unwrap();

    let nonce = fresh_nonce(&prng, 1);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let payload = bytes_to_trits(b"do not touch");
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .rotate_to(&next)
        .with_endpoint(&mut endpoint, true)
        .key_plain();
    let encoded = tx.encode(payload.as_slice()).unwrap();

    // The payload section sits after the message signature; everything
    // before it is signature-covered and must reject any single-trit flip.
    let signed_region = encoded.len() - TRINT18_SIZE - payload.len();
    for pos in (0..signed_region).step_by(13) {
        let mut corrupt: Vec<i8> = encoded.as_slice().to_vec();
        corrupt[pos] = if corrupt[pos] == 1 { -1 } else { corrupt[pos] + 1 };

        let mut rx = RecvMsgContext::new(&alloc).unwrap();
        assert!(
            rx.decode(&corrupt).is_err(),
            "flip at trit {pos} was not rejected"
        );
    }
}

#[test]
fn encode_into_respects_the_size_contract() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"buffer seed");
    let mut channel = Channel::create(&alloc, &prng, 1, Trits::default()).unwrap();

    let nonce = fresh_nonce(&prng, 1);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let payload = bytes_to_trits(b"sized");
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .key_plain();

    let needed = tx.size(payload.len());
    let mut small = vec![0i8; needed - 1];
    assert_eq!(
        tx.encode_into(payload.as_slice(), &mut small).unwrap_err(),
        MamError::BufferTooSmall { needed, available: needed - 1 }
    );

    let mut exact = vec![0i8; needed];
    let written = tx.encode_into(payload.as_slice(), &mut exact).unwrap();
    assert_eq!(written, needed);

    let mut rx = RecvMsgContext::new(&alloc).unwrap();
    assert_eq!(rx.decode(&exact).unwrap().payload, payload);
}

#[test]
fn channel_capacity_exhausts_after_two_signatures() {
    let alloc = HostAllocator;
    let prng = TritPrng::from_seed(b"exhaustion seed");
    let mut channel = Channel::create(&alloc, &prng, 1, Trits::default()).unwrap();

    for tag in [1i8, -1] {
        let nonce = fresh_nonce(&prng, tag);
        let key = SessionKey::generate(&prng, nonce.as_slice());
        let mut tx =
            SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
                .unwrap()
                .key_plain();
        tx.encode(bytes_to_trits(b"leaf").as_slice()).unwrap();
    }

    let nonce = fresh_nonce(&prng, 0);
    let key = SessionKey::generate(&prng, nonce.as_slice());
    let mut tx = SendMsgContext::new(&alloc, &prng, &prng, &mut channel, nonce, key)
        .unwrap()
        .key_plain();
    assert_eq!(
        tx.encode(bytes_to_trits(b"leaf").as_slice()).unwrap_err(),
        MamError::Crypto(CryptoError::MssExhausted { capacity: 2 })
    );
}
