//! AES-256-CTR encryption and HMAC-SHA256 authentication
//!
//! CTR mode is length-preserving and provides confidentiality only. Callers
//! must authenticate the ciphertext themselves (see [`hmac_hex`]).

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::shared_key::{IV_SIZE, SHARED_SECRET_SIZE};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = SHARED_SECRET_SIZE;

/// Size of an HMAC-SHA256 digest in bytes.
pub const HMAC_SIZE: usize = 32;

/// Encrypt with AES-256 in CTR mode (128-bit big-endian counter).
///
/// The output has the same length as the input.
pub fn encrypt_ctr(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    let mut buffer = plaintext.to_vec();
    let mut cipher = Aes256Ctr::new(key.into(), iv.into());
    cipher.apply_keystream(&mut buffer);
    buffer
}

/// Inverse of [`encrypt_ctr`].
pub fn decrypt_ctr(key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Vec<u8> {
    // CTR decryption is the same keystream XOR
    encrypt_ctr(key, iv, ciphertext)
}

fn keyed_mac(key: &[u8], parts: &[&[u8]]) -> HmacSha256 {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    for part in parts {
        mac.update(part);
    }
    mac
}

/// HMAC-SHA256 over the ordered concatenation of `parts`, as lowercase hex.
///
/// Part order is part of the wire contract.
pub fn hmac_hex(key: &[u8], parts: &[&[u8]]) -> String {
    hex::encode(keyed_mac(key, parts).finalize().into_bytes())
}

/// Constant-time check of a hex digest produced by [`hmac_hex`].
///
/// Returns false for non-hex or wrong-length input. Only the lowercase form
/// [`hmac_hex`] emits is accepted, so a digest has exactly one valid encoding.
pub fn verify_hmac_hex(key: &[u8], parts: &[&[u8]], expected_hex: &str) -> bool {
    if expected_hex.bytes().any(|byte| byte.is_ascii_uppercase()) {
        return false;
    }
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    if expected.len() != HMAC_SIZE {
        return false;
    }
    keyed_mac(key, parts).verify_slice(&expected).is_ok()
}
