//! Fuzz target for MessageCodec::decrypt
//!
//! Builds envelopes from attacker-controlled fields, optionally starting
//! from a genuine envelope and mutating one field.
//!
//! # Invariants
//!
//! - decrypt never panics on any envelope
//! - An envelope whose authenticated fields or parsed paths changed never
//!   decrypts
//! - A genuine envelope, or one whose `ivPath` was only respelled, decrypts
//!   exactly once

#![no_main]

use std::sync::{Arc, OnceLock};

use arbitrary::Arbitrary;
use hdcrypt_core::{CodecConfig, CurveContext, Envelope, Environment, MessageCodec};
use libfuzzer_sys::fuzz_target;

const XPRV1: &str = "xprv9s21ZrQH143K4PKh3KrNbTu896eT6j2cE6Uaj2T3728vca21EdDitGcytYpPL8jWWA7WoKTtTzaPAoXmFqcsiWdJutsxyuc421y9dzHaN48";
const XPUB1: &str = "xpub661MyMwAqRbcGsQA9MPNxbqrh8UwWBkTbKQBXQrefMfuVNM9nAXyS4wTjsRcVc6bGtrXPTP7qFLkvFXMcJdiDhZcp55WBscuyXA32JdYsrL";
const XPRV2: &str = "xprv9s21ZrQH143K3KFb122nLqnzgTLRsejV2GP84HrPWmvaPMzdMwXZ8VGTY3GAWrND2fYg9neHeYvANN58XjiJoAJ2UhxosTzBqzz4nmMchR1";
const XPUB2: &str = "xpub661MyMwAqRbcFoL473ZnhyjjEVAvH7TLPVJirgG157TZGAKmuUqogHawPJUcg5KZMTKK2hpB8vMYUL9rFuLy5ZSAgndyNUde9723wRZ1Lq8";

#[derive(Clone)]
struct FuzzEnv {
    now_ms: u64,
    random_byte: u8,
}

impl Environment for FuzzEnv {
    fn now_millis(&self) -> u64 {
        self.now_ms
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        buffer.fill(self.random_byte);
    }
}

#[derive(Debug, Arbitrary)]
enum Mutation {
    CipherText(String),
    Hmac(String),
    CryptPath(String),
    HmacPath(String),
    IvPath(String),
    FlipCipherByte(u8),
}

#[derive(Debug, Arbitrary)]
enum Scenario {
    /// Entirely attacker-built envelope
    Raw {
        cipher_text: String,
        hmac: String,
        crypt_path: String,
        hmac_path: String,
        iv_path: String,
    },
    /// Genuine envelope, optionally mutated
    Genuine { plaintext: Vec<u8>, time_base: bool, mutation: Option<Mutation> },
}

fn curve() -> Arc<CurveContext> {
    static CURVE: OnceLock<Arc<CurveContext>> = OnceLock::new();
    Arc::clone(CURVE.get_or_init(|| Arc::new(CurveContext::new())))
}

// `ivPath` is outside the HMAC, so only its parsed form counts as a change
fn changes_meaning(before: &Envelope, after: &Envelope) -> bool {
    before.cipher_text != after.cipher_text
        || before.hmac != after.hmac
        || before.crypt_path != after.crypt_path
        || before.hmac_path != after.hmac_path
        || before.layout().ok() != after.layout().ok()
}

fn apply(envelope: &mut Envelope, mutation: Mutation) -> bool {
    let before = envelope.clone();
    match mutation {
        Mutation::CipherText(text) => envelope.cipher_text = text,
        Mutation::Hmac(text) => envelope.hmac = text,
        Mutation::CryptPath(text) => envelope.crypt_path = text,
        Mutation::HmacPath(text) => envelope.hmac_path = text,
        Mutation::IvPath(text) => envelope.iv_path = text,
        Mutation::FlipCipherByte(position) => {
            if let Ok(mut bytes) = hex::decode(&envelope.cipher_text) {
                if !bytes.is_empty() {
                    let index = usize::from(position) % bytes.len();
                    bytes[index] ^= 0x80;
                    envelope.cipher_text = hex::encode(bytes);
                }
            }
        },
    }
    changes_meaning(&before, envelope)
}

fuzz_target!(|scenario: Scenario| {
    let env = FuzzEnv { now_ms: 1_524_005_762_685, random_byte: 0x5A };
    let config = CodecConfig::default();
    let mut bob =
        MessageCodec::from_extended_keys(env.clone(), curve(), XPRV2, XPUB1, config).unwrap();

    match scenario {
        Scenario::Raw { cipher_text, hmac, crypt_path, hmac_path, iv_path } => {
            let envelope = Envelope { cipher_text, hmac, crypt_path, hmac_path, iv_path };
            assert!(bob.decrypt(&envelope).is_err());
        },
        Scenario::Genuine { plaintext, time_base, mutation } => {
            let config = CodecConfig::default().with_time_base(time_base);
            let mut alice =
                MessageCodec::from_extended_keys(env, curve(), XPRV1, XPUB2, config).unwrap();
            let mut envelope = alice.encrypt(&plaintext).unwrap();

            let mutated = mutation.is_some_and(|m| apply(&mut envelope, m));
            let result = bob.decrypt(&envelope);

            if mutated {
                assert!(result.is_err());
            } else {
                assert_eq!(result.unwrap(), plaintext);
                assert!(bob.decrypt(&envelope).is_err());
            }
        },
    }
});
