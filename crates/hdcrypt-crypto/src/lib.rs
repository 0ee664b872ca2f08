//! HD-Crypt Cryptographic Primitives
//!
//! Building blocks for per-message encryption between two holders of BIP32
//! extended keys. Pure functions with deterministic outputs; nothing here
//! touches the clock or an RNG.
//!
//! # Key Lifecycle
//!
//! Every message gets three independent secrets, one per role, derived from
//! sibling paths below a session root:
//!
//! ```text
//! xprv (ours) + xpub (peer's)
//!        │
//!        ▼ BIP32 derive(root/{role}/{sequence}[/{time digits}])
//! child scalar + child point
//!        │
//!        ▼ ECDH, x-coordinate
//! SharedSecret (32 bytes)
//!        │
//!        ├── role 0 → AES-256-CTR key
//!        ├── role 1 → HMAC-SHA256 key
//!        └── role 2 → CTR IV (first 16 bytes)
//! ```
//!
//! The peer derives the same secrets from its own xprv and our xpub.
//!
//! # Path Encoding
//!
//! Integers too large for one child index (timestamps in milliseconds) are
//! spread across several segments in base 2^27 by [`path_codec`].
//!
//! # Security
//!
//! Confidentiality:
//! - AES-256-CTR, key and IV unique per (session root, sequence, role)
//!
//! Authenticity:
//! - CTR has no integrity of its own
//! - HMAC-SHA256 over ciphertext and derivation paths, verified in constant
//!   time
//!
//! Hygiene:
//! - Shared secrets are zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod path;
pub mod path_codec;
pub mod shared_key;
pub mod symmetric;

pub use error::CryptoError;
pub use path::{HARDENED_OFFSET, KeyPath};
pub use path_codec::{
    PATH_DIGIT_BASE, int_to_segments, path_from_int, path_to_int, segments_to_int,
};
pub use shared_key::{
    CurveContext, ExtendedKeys, HdKeyPair, IV_SIZE, SHARED_SECRET_SIZE, SharedSecret,
    gen_shared_key,
};
pub use symmetric::{HMAC_SIZE, KEY_SIZE, decrypt_ctr, encrypt_ctr, hmac_hex, verify_hmac_hex};
