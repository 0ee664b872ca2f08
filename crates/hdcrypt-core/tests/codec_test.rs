//! MessageCodec conversation tests
//!
//! Two sessions built from crossed key pairs talk to each other. Covers path
//! layout, replay and expiry rejection, HMAC tampering, and the ordering of
//! index consumption relative to authentication.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use hdcrypt_core::{
    CodecConfig, CodecError, CurveContext, Envelope, Environment, KeyPath, KeyRole, MessageCodec,
    UsedIndex,
};

const XPRV1: &str = "xprv9s21ZrQH143K4PKh3KrNbTu896eT6j2cE6Uaj2T3728vca21EdDitGcytYpPL8jWWA7WoKTtTzaPAoXmFqcsiWdJutsxyuc421y9dzHaN48";
const XPUB1: &str = "xpub661MyMwAqRbcGsQA9MPNxbqrh8UwWBkTbKQBXQrefMfuVNM9nAXyS4wTjsRcVc6bGtrXPTP7qFLkvFXMcJdiDhZcp55WBscuyXA32JdYsrL";
const XPRV2: &str = "xprv9s21ZrQH143K3KFb122nLqnzgTLRsejV2GP84HrPWmvaPMzdMwXZ8VGTY3GAWrND2fYg9neHeYvANN58XjiJoAJ2UhxosTzBqzz4nmMchR1";
const XPUB2: &str = "xpub661MyMwAqRbcFoL473ZnhyjjEVAvH7TLPVJirgG157TZGAKmuUqogHawPJUcg5KZMTKK2hpB8vMYUL9rFuLy5ZSAgndyNUde9723wRZ1Lq8";

const START_MS: u64 = 1_524_005_762_685;

// Test environment with a hand-driven clock and fixed randomness
#[derive(Clone)]
struct TestEnv {
    now_ms: Arc<AtomicU64>,
    random_byte: u8,
}

impl TestEnv {
    fn new(random_byte: u8) -> Self {
        Self { now_ms: Arc::new(AtomicU64::new(START_MS)), random_byte }
    }

    fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Environment for TestEnv {
    fn now_millis(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(self.random_byte);
    }
}

// Alice holds xprv1 and talks to xpub2; Bob the reverse
fn pair(
    alice_config: CodecConfig,
    bob_config: CodecConfig,
) -> (MessageCodec<TestEnv>, MessageCodec<TestEnv>, TestEnv) {
    let curve = Arc::new(CurveContext::new());
    let env = TestEnv::new(0x11);

    let alice = MessageCodec::from_extended_keys(
        env.clone(),
        Arc::clone(&curve),
        XPRV1,
        XPUB2,
        alice_config,
    )
    .unwrap();
    let bob =
        MessageCodec::from_extended_keys(env.clone(), curve, XPRV2, XPUB1, bob_config).unwrap();

    (alice, bob, env)
}

fn plain_pair() -> (MessageCodec<TestEnv>, MessageCodec<TestEnv>, TestEnv) {
    pair(CodecConfig::default(), CodecConfig::default())
}

#[test]
fn crypt_path_includes_base_and_random_offset() {
    let config = CodecConfig::default().with_base_path("m/0/1/2/3/".parse().unwrap());
    let (mut alice, _bob, _env) = pair(config, CodecConfig::default());

    let offset = alice.random_offset().unwrap();
    let envelope = alice.encrypt(b"hello").unwrap();

    assert_eq!(offset, 0x0011_1111);
    assert_eq!(envelope.crypt_path, format!("m/0/1/2/3/{offset}/0/0"));
    assert_eq!(envelope.hmac_path, format!("m/0/1/2/3/{offset}/1/0"));
    assert_eq!(envelope.iv_path, format!("m/0/1/2/3/{offset}/2/0"));
}

#[test]
fn sequential_indices() {
    let config = CodecConfig::default().with_random_path(false);
    let (mut alice, _bob, _env) = pair(config, CodecConfig::default());

    for i in 0..4u32 {
        assert_eq!(alice.next_sequence(), i);
        let envelope = alice.encrypt(b"tick").unwrap();

        assert_eq!(envelope.crypt_path, format!("m/0/{i}"));
        assert_eq!(envelope.hmac_path, format!("m/1/{i}"));
        assert_eq!(envelope.iv_path, format!("m/2/{i}"));
    }
}

#[test]
fn roundtrip_lengths() {
    let (mut alice, mut bob, _env) = plain_pair();

    for len in [0usize, 1, 15, 16, 17, 100, 4096] {
        let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let envelope = alice.encrypt(&plaintext).unwrap();

        assert_eq!(envelope.cipher_text.len(), len * 2);
        assert_eq!(envelope.hmac.len(), 64);
        assert_eq!(bob.decrypt(&envelope).unwrap(), plaintext);
    }
}

#[test]
fn two_way_conversation_with_different_base_paths() {
    let (mut alice, mut bob, _env) = pair(
        CodecConfig::default().with_base_path("m/0/1/2/3/".parse().unwrap()),
        CodecConfig::default().with_base_path("m/1/2/3/4".parse().unwrap()),
    );

    for round in 0..3 {
        let to_bob = format!("alice says {round}");
        let envelope = alice.encrypt(to_bob.as_bytes()).unwrap();
        assert_eq!(bob.decrypt(&envelope).unwrap(), to_bob.as_bytes());

        let to_alice = format!("bob answers {round}");
        let envelope = bob.encrypt(to_alice.as_bytes()).unwrap();
        assert_eq!(alice.decrypt(&envelope).unwrap(), to_alice.as_bytes());
    }

    assert_eq!(alice.ledger().used_count(KeyRole::Hmac), 3);
    assert_eq!(bob.ledger().used_count(KeyRole::Crypt), 3);
}

#[test]
fn envelope_survives_json() {
    let (mut alice, mut bob, _env) = plain_pair();

    let json = alice.encrypt(b"over the wire").unwrap().to_json();
    let envelope = Envelope::from_json(&json).unwrap();

    assert_eq!(bob.decrypt(&envelope).unwrap(), b"over the wire");
}

#[test]
fn flipped_hmac_bits_fail_authentication() {
    let (mut alice, _bob, _env) = plain_pair();
    let envelope = alice.encrypt(b"integrity").unwrap();
    let mac = hex::decode(&envelope.hmac).unwrap();

    for bit in 0..mac.len() * 8 {
        let mut tampered = envelope.clone();
        let mut bad = mac.clone();
        bad[bit / 8] ^= 1 << (bit % 8);
        tampered.hmac = hex::encode(bad);

        // Fresh receiver so the index is not already consumed
        let (_, mut bob, _env) = plain_pair();
        let result = bob.decrypt(&tampered);

        assert!(
            matches!(result, Err(CodecError::Authentication { .. })),
            "bit {bit}: {result:?}"
        );
    }
}

#[test]
fn tampered_fields_fail_authentication() {
    let (mut alice, _bob, _env) = plain_pair();
    let envelope = alice.encrypt(b"integrity").unwrap();

    let mut bytes = hex::decode(&envelope.cipher_text).unwrap();
    bytes[0] ^= 0x01;
    let mut cipher = envelope.clone();
    cipher.cipher_text = hex::encode(bytes);

    let (_, mut bob, _env) = plain_pair();
    assert!(matches!(bob.decrypt(&cipher), Err(CodecError::Authentication { .. })));
}

#[test]
fn respelled_iv_path_still_decrypts() {
    let (mut alice, _bob, _env) = plain_pair();
    let envelope = alice.encrypt(b"same path").unwrap();

    // The IV path is not authenticated; only the path it names matters
    let mut respelled = envelope.clone();
    respelled.iv_path = format!(" {}/", envelope.iv_path);
    assert_ne!(respelled, envelope);
    assert_eq!(respelled.layout().unwrap(), envelope.layout().unwrap());

    let (_, mut bob, _env) = plain_pair();
    assert_eq!(bob.decrypt(&respelled).unwrap(), b"same path");
}

#[test]
fn padded_iv_path_is_malformed() {
    let (mut alice, _bob, _env) = plain_pair();
    let envelope = alice.encrypt(b"padded").unwrap();

    let cut = envelope.iv_path.rfind('/').unwrap();
    let mut padded = envelope.clone();
    padded.iv_path = format!("{}/0{}", &envelope.iv_path[..cut], &envelope.iv_path[cut + 1..]);

    let (_, mut bob, _env) = plain_pair();
    assert!(matches!(bob.decrypt(&padded), Err(CodecError::MalformedEnvelope { .. })));
}

#[test]
fn replay_is_rejected() {
    let (mut alice, mut bob, _env) = plain_pair();
    let envelope = alice.encrypt(b"once").unwrap();

    assert_eq!(bob.decrypt(&envelope).unwrap(), b"once");
    assert_eq!(
        bob.decrypt(&envelope),
        Err(CodecError::Replay { role: KeyRole::Hmac, sequence: 0 })
    );
}

#[test]
fn forged_envelope_consumes_its_index() {
    let (mut alice, mut bob, _env) = plain_pair();
    let genuine = alice.encrypt(b"real").unwrap();

    let mut forged = genuine.clone();
    forged.hmac = "00".repeat(32);

    assert!(matches!(bob.decrypt(&forged), Err(CodecError::Authentication { .. })));

    let index = UsedIndex { root: alice.root_path().clone(), sequence: 0 };
    assert!(bob.ledger().is_used(KeyRole::Hmac, &index));
    assert!(bob.ledger().is_used(KeyRole::Crypt, &index));

    // The genuine envelope arriving late is now a replay
    assert!(matches!(bob.decrypt(&genuine), Err(CodecError::Replay { .. })));
}

#[test]
fn new_sender_session_is_not_a_replay() {
    let curve = Arc::new(CurveContext::new());
    let receiver_env = TestEnv::new(0x22);
    let mut bob = MessageCodec::from_extended_keys(
        receiver_env,
        Arc::clone(&curve),
        XPRV2,
        XPUB1,
        CodecConfig::default(),
    )
    .unwrap();

    for random_byte in [0x01, 0x02] {
        let mut alice = MessageCodec::from_extended_keys(
            TestEnv::new(random_byte),
            Arc::clone(&curve),
            XPRV1,
            XPUB2,
            CodecConfig::default(),
        )
        .unwrap();

        let envelope = alice.encrypt(b"restarted").unwrap();
        assert!(envelope.crypt_path.ends_with("/0/0"));
        assert_eq!(bob.decrypt(&envelope).unwrap(), b"restarted");
    }
}

#[test]
fn expiry_window_edge() {
    let timed = CodecConfig::default().with_time_base(true).with_expiry_ms(1000);
    let (mut alice, mut bob, env) = pair(timed.clone(), timed);

    let on_time = alice.encrypt(b"on time").unwrap();
    let late = alice.encrypt(b"late").unwrap();

    env.advance(1000);
    assert_eq!(bob.decrypt(&on_time).unwrap(), b"on time");

    env.advance(1);
    assert_eq!(bob.decrypt(&late), Err(CodecError::Expired { age_ms: 1001, expiry_ms: 1000 }));
}

#[test]
fn expired_envelope_does_not_consume_index() {
    let timed = CodecConfig::default().with_time_base(true).with_expiry_ms(10);
    let (mut alice, mut bob, env) = pair(timed.clone(), timed);

    let envelope = alice.encrypt(b"slow").unwrap();
    env.advance(11);

    assert!(bob.decrypt(&envelope).unwrap_err().is_expired());
    assert_eq!(bob.ledger().used_count(KeyRole::Hmac), 0);
}

#[test]
fn expiry_requires_timestamp() {
    let (mut alice, mut bob, _env) =
        pair(CodecConfig::default(), CodecConfig::default().with_expiry_ms(1000));

    let envelope = alice.encrypt(b"undated").unwrap();

    assert_eq!(bob.decrypt(&envelope), Err(CodecError::MissingTimestamp { expiry_ms: 1000 }));
}

#[test]
fn timestamp_without_expiry_is_accepted() {
    let (mut alice, mut bob, env) =
        pair(CodecConfig::default().with_time_base(true), CodecConfig::default());

    let envelope = alice.encrypt(b"dated").unwrap();
    env.advance(365 * 24 * 60 * 60 * 1000);

    assert_eq!(bob.decrypt(&envelope).unwrap(), b"dated");
}

#[test]
fn malformed_envelopes() {
    let (mut alice, mut bob, _env) = plain_pair();
    let envelope = alice.encrypt(b"shape").unwrap();

    let mut swapped = envelope.clone();
    std::mem::swap(&mut swapped.crypt_path, &mut swapped.hmac_path);
    assert!(matches!(bob.decrypt(&swapped), Err(CodecError::MalformedEnvelope { .. })));

    let mut hardened = envelope.clone();
    hardened.iv_path.push('\'');
    assert!(matches!(bob.decrypt(&hardened), Err(CodecError::MalformedEnvelope { .. })));

    // Nothing above reached the ledger
    assert_eq!(bob.ledger().used_count(KeyRole::Hmac), 0);
}

#[test]
fn wrong_peer_cannot_decrypt() {
    let curve = Arc::new(CurveContext::new());
    let (mut alice, _bob, env) = plain_pair();
    // Listens with the right private key but believes it talks to itself
    let mut mallory =
        MessageCodec::from_extended_keys(env, curve, XPRV2, XPUB2, CodecConfig::default()).unwrap();

    let envelope = alice.encrypt(b"secret").unwrap();

    assert!(matches!(mallory.decrypt(&envelope), Err(CodecError::Authentication { .. })));
}

#[test]
fn session_shared_across_threads() {
    let (alice, mut bob, _env) = plain_pair();
    let alice = Arc::new(Mutex::new(alice));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let alice = Arc::clone(&alice);
            std::thread::spawn(move || {
                (0..5)
                    .map(|i| {
                        let message = format!("thread {t} message {i}");
                        let envelope = alice.lock().unwrap().encrypt(message.as_bytes()).unwrap();
                        (message, envelope)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut sequences = Vec::new();
    for handle in handles {
        for (message, envelope) in handle.join().unwrap() {
            sequences.push(envelope.layout().unwrap().sequence);
            assert_eq!(bob.decrypt(&envelope).unwrap(), message.as_bytes());
        }
    }

    sequences.sort_unstable();
    assert_eq!(sequences, (0..20).collect::<Vec<u32>>());
    assert_eq!(alice.lock().unwrap().next_sequence(), 20);
}

#[test]
fn random_offset_stays_below_2_pow_24() {
    let curve = Arc::new(CurveContext::new());
    let codec = MessageCodec::from_extended_keys(
        TestEnv::new(0xFF),
        curve,
        XPRV1,
        XPUB2,
        CodecConfig::default().with_base_path(KeyPath::master()),
    )
    .unwrap();

    assert_eq!(codec.random_offset(), Some(0x00FF_FFFF));
    assert_eq!(codec.root_path().segments(), &[0x00FF_FFFF]);
}
