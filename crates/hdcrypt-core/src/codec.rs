//! Per-message encryption session.
//!
//! A [`MessageCodec`] owns the sending counter and the replay ledger for one
//! conversation with one peer. Every message is encrypted under keys derived
//! fresh from a new sequence index, so no key, IV or HMAC key is ever reused.
//!
//! # Decrypt Ordering
//!
//! ```text
//! layout ──► ledger(hmac) ──► ledger(crypt) ──► HMAC verify ──► AES-CTR
//!              │                 │                  │
//!              ▼                 ▼                  ▼
//!         Replay/Expired    Replay/Expired    Authentication
//! ```
//!
//! Indices are consumed by the ledger before the HMAC is checked, so a forged
//! envelope burns the index it names.

use std::sync::Arc;

use hdcrypt_crypto::{
    CurveContext, ExtendedKeys, HARDENED_OFFSET, KeyPath, decrypt_ctr, encrypt_ctr, hmac_hex,
    verify_hmac_hex,
};
use zeroize::Zeroizing;

use crate::{
    config::{CodecConfig, RANDOM_PATH_MASK},
    env::Environment,
    envelope::{Envelope, KeyRole},
    error::CodecError,
    ledger::{ReplayLedger, UsedIndex},
};

/// Encrypting and decrypting end of one conversation.
///
/// Methods take `&mut self`; wrap in a `Mutex` to share across threads.
/// Sessions may share one [`CurveContext`].
#[derive(Debug)]
pub struct MessageCodec<E: Environment> {
    env: E,
    curve: Arc<CurveContext>,
    keys: ExtendedKeys,
    config: CodecConfig,
    root_path: KeyPath,
    random_offset: Option<u32>,
    next_sequence: u32,
    ledger: ReplayLedger,
}

impl<E: Environment> MessageCodec<E> {
    /// Start a session.
    ///
    /// Draws the random path offset from `env` when `use_random_path` is set.
    ///
    /// # Errors
    ///
    /// - `Derivation`: the base path cannot take another segment
    pub fn new(
        env: E,
        curve: Arc<CurveContext>,
        keys: ExtendedKeys,
        config: CodecConfig,
    ) -> Result<Self, CodecError> {
        let random_offset = config.use_random_path.then(|| env.random_u32() & RANDOM_PATH_MASK);
        let root_path = match random_offset {
            Some(offset) => config.base_path.child(offset)?,
            None => config.base_path.clone(),
        };

        tracing::debug!(
            root_path = %root_path,
            random_offset = ?random_offset,
            time_base = config.use_time_base,
            expiry_ms = ?config.expiry_ms,
            "Created message codec"
        );

        Ok(Self {
            env,
            curve,
            keys,
            config,
            root_path,
            random_offset,
            next_sequence: 0,
            ledger: ReplayLedger::new(),
        })
    }

    /// Start a session from BIP32 key text.
    ///
    /// # Errors
    ///
    /// - `Derivation`: either key fails to parse
    pub fn from_extended_keys(
        env: E,
        curve: Arc<CurveContext>,
        local: &str,
        remote: &str,
        config: CodecConfig,
    ) -> Result<Self, CodecError> {
        let keys = ExtendedKeys::parse(&curve, local, remote)?;
        Self::new(env, curve, keys, config)
    }

    /// Encrypt `plaintext` under keys for the next sequence index.
    ///
    /// The index is consumed even if derivation fails.
    ///
    /// # Errors
    ///
    /// - `Derivation`: the sequence space is exhausted or a path fails to
    ///   derive
    /// - `Curve`: a derived key is invalid
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Envelope, CodecError> {
        let sequence = self.next_sequence;
        if sequence >= HARDENED_OFFSET {
            return Err(CodecError::Derivation { reason: "sequence space exhausted".to_string() });
        }
        self.next_sequence = sequence + 1;

        let timestamp_ms = self.config.use_time_base.then(|| self.env.now_millis());
        let crypt_path = self.message_path(KeyRole::Crypt, sequence, timestamp_ms)?;
        let hmac_path = self.message_path(KeyRole::Hmac, sequence, timestamp_ms)?;
        let iv_path = self.message_path(KeyRole::Iv, sequence, timestamp_ms)?;

        let crypt_secret = self.curve.shared_secret(&self.keys, &crypt_path)?;
        let iv_secret = self.curve.shared_secret(&self.keys, &iv_path)?;
        let hmac_secret = self.curve.shared_secret(&self.keys, &hmac_path)?;

        let iv = Zeroizing::new(iv_secret.iv());
        let cipher_text = hex::encode(encrypt_ctr(crypt_secret.as_bytes(), &iv, plaintext));

        let crypt_path = crypt_path.to_string();
        let hmac_path = hmac_path.to_string();
        let hmac_key = Zeroizing::new(hmac_secret.to_hex());
        let hmac = hmac_hex(
            hmac_key.as_bytes(),
            &[cipher_text.as_bytes(), crypt_path.as_bytes(), hmac_path.as_bytes()],
        );

        tracing::debug!(
            sequence,
            crypt_path = %crypt_path,
            plaintext_len = plaintext.len(),
            "Encrypted message"
        );

        Ok(Envelope { cipher_text, hmac, crypt_path, hmac_path, iv_path: iv_path.to_string() })
    }

    /// Authenticate and decrypt an envelope from the peer.
    ///
    /// Fails closed: no plaintext is returned unless every check passes.
    ///
    /// # Errors
    ///
    /// - `MalformedEnvelope`: paths are not role siblings, or the ciphertext
    ///   is not hex
    /// - `Replay`: the sender index was already admitted
    /// - `Expired`, `MissingTimestamp`: expiry is configured and the envelope
    ///   is too old or undated
    /// - `Authentication`: HMAC mismatch
    /// - `Derivation`, `Curve`: key derivation failed
    pub fn decrypt(&mut self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        let result = self.open(envelope);

        if let Err(err) = &result
            && err.is_rejection()
        {
            tracing::warn!(
                error = %err,
                crypt_path = %envelope.crypt_path,
                "Rejected envelope"
            );
        }

        result
    }

    fn open(&mut self, envelope: &Envelope) -> Result<Vec<u8>, CodecError> {
        let layout = envelope.layout()?;
        let index = UsedIndex { root: layout.root.clone(), sequence: layout.sequence };
        let expiry = self.config.expiry_ms.map(|expiry_ms| (self.env.now_millis(), expiry_ms));

        self.ledger.admit(KeyRole::Hmac, &index, layout.timestamp_ms, expiry)?;
        self.ledger.admit(KeyRole::Crypt, &index, layout.timestamp_ms, expiry)?;

        let hmac_secret = self.curve.shared_secret(&self.keys, &layout.hmac)?;
        let hmac_key = Zeroizing::new(hmac_secret.to_hex());
        let authentic = verify_hmac_hex(
            hmac_key.as_bytes(),
            &[
                envelope.cipher_text.as_bytes(),
                envelope.crypt_path.as_bytes(),
                envelope.hmac_path.as_bytes(),
            ],
            &envelope.hmac,
        );
        if !authentic {
            return Err(CodecError::Authentication { reason: "hmac mismatch".to_string() });
        }

        let ciphertext = hex::decode(&envelope.cipher_text).map_err(|err| {
            CodecError::MalformedEnvelope { reason: format!("cipher text: {err}") }
        })?;

        let crypt_secret = self.curve.shared_secret(&self.keys, &layout.crypt)?;
        let iv_secret = self.curve.shared_secret(&self.keys, &layout.iv)?;
        let iv = Zeroizing::new(iv_secret.iv());
        let plaintext = decrypt_ctr(crypt_secret.as_bytes(), &iv, &ciphertext);

        tracing::debug!(
            root_path = %layout.root,
            sequence = layout.sequence,
            plaintext_len = plaintext.len(),
            "Decrypted message"
        );

        Ok(plaintext)
    }

    fn message_path(
        &self,
        role: KeyRole,
        sequence: u32,
        timestamp_ms: Option<u64>,
    ) -> Result<KeyPath, CodecError> {
        let path = self.root_path.child(role.segment())?.child(sequence)?;
        Ok(match timestamp_ms {
            Some(ms) => path.with_int_suffix(ms),
            None => path,
        })
    }

    /// Session root: base path plus the random offset, if any.
    pub fn root_path(&self) -> &KeyPath {
        &self.root_path
    }

    /// Random offset drawn at session start.
    pub fn random_offset(&self) -> Option<u32> {
        self.random_offset
    }

    /// Sequence index the next [`encrypt`](Self::encrypt) will use.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Session configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Indices admitted so far.
    pub fn ledger(&self) -> &ReplayLedger {
        &self.ledger
    }

    /// Peer's extended public key.
    pub fn remote_public_key(&self) -> String {
        self.keys.remote_public_key()
    }
}
