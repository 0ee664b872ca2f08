//! Error types for the HD-Crypt session layer.
//!
//! Every error is terminal for the operation that raised it. Nothing is
//! retried internally and no partial envelope or plaintext is ever returned.

use hdcrypt_crypto::CryptoError;
use thiserror::Error;

use crate::envelope::KeyRole;

/// Errors from [`MessageCodec`](crate::MessageCodec) operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A key or path could not be derived (malformed path or key text,
    /// out-of-range index)
    #[error("derivation error: {reason}")]
    Derivation {
        /// What went wrong
        reason: String,
    },

    /// BIP32 derivation produced a zero or otherwise invalid key for a path
    #[error("curve error at {path}: {reason}")]
    Curve {
        /// Path whose derived key is invalid
        path: String,
        /// Underlying curve failure
        reason: String,
    },

    /// The sequence index was already accepted by this session for this role
    #[error("replayed {role} index {sequence}")]
    Replay {
        /// Which path was replayed
        role: KeyRole,
        /// The reused sequence index
        sequence: u32,
    },

    /// The envelope is older than the configured expiry window
    #[error("envelope expired: age {age_ms}ms exceeds {expiry_ms}ms")]
    Expired {
        /// Receiver's clock minus the embedded timestamp
        age_ms: u64,
        /// Configured maximum age
        expiry_ms: u64,
    },

    /// Expiry is configured but the envelope carries no timestamp
    #[error("envelope has no timestamp but expiry of {expiry_ms}ms is enforced")]
    MissingTimestamp {
        /// Configured maximum age
        expiry_ms: u64,
    },

    /// HMAC does not match the ciphertext and paths
    #[error("authentication failed: {reason}")]
    Authentication {
        /// Why the envelope was rejected
        reason: String,
    },

    /// Envelope paths or fields cannot be interpreted
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// What is wrong with the envelope
        reason: String,
    },
}

impl CodecError {
    /// Returns true if the error is a rejection of a peer-supplied envelope.
    ///
    /// Rejections are expected under attack or clock skew and say nothing
    /// about local state. Everything else points at local keys or
    /// configuration.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Replay { .. }
            | Self::Expired { .. }
            | Self::MissingTimestamp { .. }
            | Self::Authentication { .. }
            | Self::MalformedEnvelope { .. } => true,

            Self::Derivation { .. } | Self::Curve { .. } => false,
        }
    }

    /// Returns true for both flavors of expiry failure.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. } | Self::MissingTimestamp { .. })
    }
}

impl From<CryptoError> for CodecError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Curve { path, reason } => Self::Curve { path, reason },
            other @ (CryptoError::InvalidPath { .. }
            | CryptoError::InvalidExtendedKey { .. }
            | CryptoError::Derivation { .. }) => Self::Derivation { reason: other.to_string() },
        }
    }
}
