//! Session configuration.

use std::str::FromStr;

use hdcrypt_crypto::KeyPath;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Number of random bits in the per-session path offset.
pub const RANDOM_PATH_BITS: u32 = 24;

/// Mask applied to a random `u32` to get the session path offset.
pub const RANDOM_PATH_MASK: u32 = (1 << RANDOM_PATH_BITS) - 1;

/// Configuration for a [`MessageCodec`](crate::MessageCodec) session.
///
/// Both parties need compatible settings only for expiry: a receiver that
/// enforces `expiry_ms` rejects envelopes from a sender without
/// `use_time_base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodecConfig {
    /// Path all session roots hang off (default `m`)
    #[serde(serialize_with = "serialize_path", deserialize_with = "deserialize_path")]
    pub base_path: KeyPath,

    /// Append a random 24-bit segment to the base path for each session
    pub use_random_path: bool,

    /// Append the send time (ms, base-2^27 digits) to every derivation path
    pub use_time_base: bool,

    /// Reject envelopes older than this many milliseconds
    pub expiry_ms: Option<u64>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            base_path: KeyPath::master(),
            use_random_path: true,
            use_time_base: false,
            expiry_ms: None,
        }
    }
}

impl CodecConfig {
    /// Set the base path.
    #[must_use]
    pub fn with_base_path(mut self, base_path: KeyPath) -> Self {
        self.base_path = base_path;
        self
    }

    /// Enable or disable the random session offset.
    #[must_use]
    pub fn with_random_path(mut self, enabled: bool) -> Self {
        self.use_random_path = enabled;
        self
    }

    /// Enable or disable time segments in derivation paths.
    #[must_use]
    pub fn with_time_base(mut self, enabled: bool) -> Self {
        self.use_time_base = enabled;
        self
    }

    /// Enforce a maximum envelope age on decrypt.
    #[must_use]
    pub fn with_expiry_ms(mut self, expiry_ms: u64) -> Self {
        self.expiry_ms = Some(expiry_ms);
        self
    }

    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn serialize_path<S: Serializer>(path: &KeyPath, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(path)
}

fn deserialize_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<KeyPath, D::Error> {
    let text = String::deserialize(deserializer)?;
    KeyPath::from_str(&text).map_err(de::Error::custom)
}
