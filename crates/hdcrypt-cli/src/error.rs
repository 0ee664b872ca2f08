//! CLI error type.

use hdcrypt_core::CodecError;
use hdcrypt_crypto::CryptoError;
use thiserror::Error;

/// Errors surfaced to the `hdcrypt` user.
#[derive(Error, Debug)]
pub enum CliError {
    /// Session operation failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Key or path handling failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Configuration file could not be loaded
    #[error("config {path}: {reason}")]
    Config {
        /// File that failed to load
        path: String,
        /// Why it failed
        reason: String,
    },

    /// Reading input or writing output failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
