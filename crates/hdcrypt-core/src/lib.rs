//! HD-Crypt Session Layer
//!
//! Stateful per-message encryption between two parties holding BIP32
//! extended keys. A [`MessageCodec`] turns plaintexts into self-describing
//! [`Envelope`]s and back, tracking sequence indices for replay protection
//! and optionally enforcing a maximum message age.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ MessageCodec<E: Environment>               │
//! │  counter ─► paths ─► secrets ─► CTR + HMAC │
//! │  ReplayLedger (hmac, crypt)                │
//! └─────────────┬──────────────────────────────┘
//!               │ Arc<CurveContext>
//!               ▼
//!         hdcrypt-crypto
//! ```
//!
//! The [`Environment`] trait supplies the wall clock and randomness so tests
//! can pin the session offset and drive expiry by hand.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod config;
pub mod env;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod system_env;

pub use codec::MessageCodec;
pub use config::{CodecConfig, RANDOM_PATH_BITS, RANDOM_PATH_MASK};
pub use env::Environment;
pub use envelope::{Envelope, EnvelopeLayout, KeyRole};
pub use error::CodecError;
pub use hdcrypt_crypto::{CurveContext, ExtendedKeys, HdKeyPair, KeyPath};
pub use ledger::{ReplayLedger, UsedIndex};
pub use system_env::SystemEnv;
