//! Error types for the HD-Crypt primitives

use thiserror::Error;

/// Errors from path encoding, key derivation and ECDH.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Path text could not be parsed or is not canonical
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path text
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// Extended key text is not a valid BIP32 key of the expected kind
    #[error("invalid extended key: {reason}")]
    InvalidExtendedKey {
        /// Why the key was rejected
        reason: String,
    },

    /// BIP32 child derivation failed (bad index, hardened on public key)
    #[error("derivation failed at {path}: {reason}")]
    Derivation {
        /// Path being derived
        path: String,
        /// Underlying derivation failure
        reason: String,
    },

    /// Derived scalar or point is invalid for secp256k1
    ///
    /// Fatal for that path. Callers must not retry with a substitute index.
    #[error("curve error at {path}: {reason}")]
    Curve {
        /// Path being derived
        path: String,
        /// Underlying curve failure
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if the failure comes from the caller's input text
    /// (path or key encoding) rather than from the derivation itself.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidPath { .. } | Self::InvalidExtendedKey { .. })
    }
}
