//! Self-describing encrypted message envelope.
//!
//! The three derivation paths double as replay and expiry metadata. They are
//! siblings that differ in exactly one segment, the role discriminator:
//!
//! ```text
//! cryptPath  m/<base>/<offset>/0/<sequence>[/<t0>/<t1>...]
//! hmacPath   m/<base>/<offset>/1/<sequence>[/<t0>/<t1>...]
//! ivPath     m/<base>/<offset>/2/<sequence>[/<t0>/<t1>...]
//! ```
//!
//! Everything before the role is the sender's session root. The segment after
//! it is the sequence index, and any remaining segments are the send time in
//! milliseconds as base-2^27 digits (least significant first).

use std::{fmt, str::FromStr};

use hdcrypt_crypto::{KeyPath, segments_to_int};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Which of the three per-message keys a path derives.
///
/// The discriminator values `0`, `1`, `2` separate the key uses and are part
/// of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// AES-256-CTR key
    Crypt,
    /// HMAC-SHA256 key
    Hmac,
    /// CTR initial counter block
    Iv,
}

impl KeyRole {
    /// Path segment identifying this role.
    pub const fn segment(self) -> u32 {
        match self {
            Self::Crypt => 0,
            Self::Hmac => 1,
            Self::Iv => 2,
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Crypt => "crypt",
            Self::Hmac => "hmac",
            Self::Iv => "iv",
        })
    }
}

/// Encrypted message plus everything the peer needs to re-derive its keys.
///
/// Serializes with the field names `cipherText`, `hmac`, `cryptPath`,
/// `hmacPath` and `ivPath`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// AES-256-CTR ciphertext, lowercase hex
    pub cipher_text: String,
    /// HMAC-SHA256 over `cipher_text`, `crypt_path`, `hmac_path`; 64 hex chars
    pub hmac: String,
    /// Derivation path of the encryption key
    pub crypt_path: String,
    /// Derivation path of the HMAC key
    pub hmac_path: String,
    /// Derivation path of the IV
    pub iv_path: String,
}

impl Envelope {
    /// Path text for `role`.
    pub fn path(&self, role: KeyRole) -> &str {
        match role {
            KeyRole::Crypt => &self.crypt_path,
            KeyRole::Hmac => &self.hmac_path,
            KeyRole::Iv => &self.iv_path,
        }
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> String {
        let Ok(json) = serde_json::to_string(self) else {
            unreachable!("an envelope of plain strings always serializes");
        };
        json
    }

    /// Parse the JSON encoding.
    ///
    /// # Errors
    ///
    /// - `MalformedEnvelope`: not JSON, or a field is missing
    pub fn from_json(json: &str) -> Result<Self, CodecError> {
        serde_json::from_str(json)
            .map_err(|err| CodecError::MalformedEnvelope { reason: err.to_string() })
    }

    /// Decode the path structure shared by the three paths.
    ///
    /// # Errors
    ///
    /// - `MalformedEnvelope`: a path does not parse, or the three paths are
    ///   not role siblings carrying a sequence index
    pub fn layout(&self) -> Result<EnvelopeLayout, CodecError> {
        let crypt = parse_path(KeyRole::Crypt, &self.crypt_path)?;
        let hmac = parse_path(KeyRole::Hmac, &self.hmac_path)?;
        let iv = parse_path(KeyRole::Iv, &self.iv_path)?;

        if crypt.len() != hmac.len() || crypt.len() != iv.len() {
            return Err(malformed("paths have different lengths"));
        }

        let (c, h, i) = (crypt.segments(), hmac.segments(), iv.segments());
        let mut differing = (0..c.len()).filter(|&n| c[n] != h[n] || c[n] != i[n]);
        let role_position = differing.next().ok_or_else(|| malformed("paths are identical"))?;
        if differing.next().is_some() {
            return Err(malformed("paths differ in more than the role segment"));
        }

        if c[role_position] != KeyRole::Crypt.segment()
            || h[role_position] != KeyRole::Hmac.segment()
            || i[role_position] != KeyRole::Iv.segment()
        {
            return Err(malformed("role segments are not 0, 1, 2"));
        }

        let suffix = &c[role_position + 1..];
        let (&sequence, time_digits) =
            suffix.split_first().ok_or_else(|| malformed("missing sequence index"))?;

        let timestamp_ms = if time_digits.is_empty() {
            None
        } else {
            Some(segments_to_int(time_digits).ok_or_else(|| malformed("invalid time segment"))?)
        };

        let root = KeyPath::from_segments(c[..role_position].to_vec())?;

        Ok(EnvelopeLayout { root, sequence, timestamp_ms, crypt, hmac, iv })
    }
}

fn malformed(reason: &str) -> CodecError {
    CodecError::MalformedEnvelope { reason: reason.to_string() }
}

fn parse_path(role: KeyRole, text: &str) -> Result<KeyPath, CodecError> {
    KeyPath::from_str(text)
        .map_err(|err| CodecError::MalformedEnvelope { reason: format!("{role} path: {err}") })
}

/// Decoded structure of an envelope's paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeLayout {
    /// Sender's session root (base path plus random offset)
    pub root: KeyPath,
    /// Sender's sequence index
    pub sequence: u32,
    /// Send time in milliseconds, if the sender embeds one
    pub timestamp_ms: Option<u64>,
    /// Parsed crypt path
    pub crypt: KeyPath,
    /// Parsed HMAC path
    pub hmac: KeyPath,
    /// Parsed IV path
    pub iv: KeyPath,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(crypt: &str, hmac: &str, iv: &str) -> Envelope {
        Envelope {
            cipher_text: "00".to_string(),
            hmac: "00".repeat(32),
            crypt_path: crypt.to_string(),
            hmac_path: hmac.to_string(),
            iv_path: iv.to_string(),
        }
    }

    #[test]
    fn json_uses_wire_field_names() {
        let env = envelope("m/5/0/1", "m/5/1/1", "m/5/2/1");
        let json = env.to_json();

        for field in ["cipherText", "hmac", "cryptPath", "hmacPath", "ivPath"] {
            assert!(json.contains(&format!("\"{field}\"")), "missing {field} in {json}");
        }
        assert_eq!(Envelope::from_json(&json).unwrap(), env);
    }

    #[test]
    fn from_json_rejects_missing_fields() {
        let result = Envelope::from_json(r#"{"cipherText":"00","hmac":"00"}"#);
        assert!(matches!(result, Err(CodecError::MalformedEnvelope { .. })));
    }

    #[test]
    fn layout_without_timestamp() {
        let layout = envelope("m/0/1/2/3/77/0/4", "m/0/1/2/3/77/1/4", "m/0/1/2/3/77/2/4")
            .layout()
            .unwrap();

        assert_eq!(layout.root.to_string(), "m/0/1/2/3/77");
        assert_eq!(layout.sequence, 4);
        assert_eq!(layout.timestamp_ms, None);
    }

    #[test]
    fn layout_with_timestamp() {
        let layout = envelope("m/9/0/2/100/2", "m/9/1/2/100/2", "m/9/2/2/100/2").layout().unwrap();

        assert_eq!(layout.root.to_string(), "m/9");
        assert_eq!(layout.sequence, 2);
        assert_eq!(layout.timestamp_ms, Some(0x800_0000 * 2 + 100));
    }

    #[test]
    fn layout_when_root_is_master() {
        let layout = envelope("m/0/0", "m/1/0", "m/2/0").layout().unwrap();
        assert!(layout.root.is_empty());
        assert_eq!(layout.sequence, 0);
    }

    #[test]
    fn layout_rejects_non_sibling_paths() {
        let cases = [
            ("m/5/0/1", "m/5/1/1", "m/5/2"),
            ("m/5/0/1", "m/5/0/1", "m/5/0/1"),
            ("m/5/0/1", "m/6/1/1", "m/5/2/1"),
            ("m/5/1/1", "m/5/0/1", "m/5/2/1"),
            ("m/5/0", "m/5/1", "m/5/2"),
            ("m/5/0/1/134217728", "m/5/1/1/134217728", "m/5/2/1/134217728"),
            ("x/5/0/1", "m/5/1/1", "m/5/2/1"),
        ];

        for (crypt, hmac, iv) in cases {
            assert!(
                matches!(
                    envelope(crypt, hmac, iv).layout(),
                    Err(CodecError::MalformedEnvelope { .. })
                ),
                "{crypt} {hmac} {iv} must be rejected"
            );
        }
    }

    #[test]
    fn role_segments_are_fixed() {
        assert_eq!(KeyRole::Crypt.segment(), 0);
        assert_eq!(KeyRole::Hmac.segment(), 1);
        assert_eq!(KeyRole::Iv.segment(), 2);
    }
}
