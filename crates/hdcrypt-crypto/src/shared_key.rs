//! ECDH shared secrets over BIP32-derived child keys
//!
//! Both parties derive the same child path: the local party from its
//! extended private key, the remote party's public half from its extended
//! public key. Multiplying the local child scalar with the remote child point
//! gives a point whose x-coordinate is the shared secret:
//!
//! ```text
//! xprv_A ── derive(path) ──> a      xpub_B ── derive(path) ──> bG
//!                             \                                /
//!                              └──────── x(a · bG) ───────────┘
//!                                          ==
//!                              ┌──────── x(b · aG) ───────────┐
//!                             /                                \
//! xprv_B ── derive(path) ──> b      xpub_A ── derive(path) ──> aG
//! ```
//!
//! No secret ever leaves either party, and every distinct path yields an
//! independent secret.

use std::{fmt, str::FromStr};

use bitcoin::{
    bip32::{self, Xpriv, Xpub},
    secp256k1::{All, Secp256k1, ecdh},
};
use zeroize::Zeroize;

use crate::{error::CryptoError, path::KeyPath};

/// Size of a shared secret in bytes.
pub const SHARED_SECRET_SIZE: usize = 32;

/// Size of the IV taken from the front of a shared secret.
pub const IV_SIZE: usize = 16;

/// secp256k1 context shared by every derivation.
///
/// Construct once and pass by reference. Building a context precomputes
/// tables, so it is too expensive to create per call.
pub struct CurveContext {
    secp: Secp256k1<All>,
}

impl CurveContext {
    /// Create a signing + verification context.
    pub fn new() -> Self {
        Self { secp: Secp256k1::new() }
    }

    /// Compute the shared secret for `path`.
    ///
    /// # Errors
    ///
    /// - `Derivation`: the path cannot be derived from one of the keys
    /// - `Curve`: derivation produced an invalid scalar or point
    pub fn shared_secret(
        &self,
        keys: &ExtendedKeys,
        path: &KeyPath,
    ) -> Result<SharedSecret, CryptoError> {
        let derivation = path.to_derivation_path();

        let local_child = keys
            .local
            .derive_priv(&self.secp, &derivation)
            .map_err(|err| derivation_error(path, err))?;
        let remote_child = keys
            .remote
            .derive_pub(&self.secp, &derivation)
            .map_err(|err| derivation_error(path, err))?;

        let mut point = ecdh::shared_secret_point(&remote_child.public_key, &local_child.private_key);

        // x-coordinate only, big-endian, already fixed width
        let mut bytes = [0u8; SHARED_SECRET_SIZE];
        bytes.copy_from_slice(&point[..SHARED_SECRET_SIZE]);
        point.zeroize();

        Ok(SharedSecret { bytes })
    }
}

impl Default for CurveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CurveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurveContext").finish_non_exhaustive()
    }
}

fn derivation_error(path: &KeyPath, err: bip32::Error) -> CryptoError {
    match err {
        bip32::Error::Secp256k1(curve) => {
            CryptoError::Curve { path: path.to_string(), reason: curve.to_string() }
        },
        other => CryptoError::Derivation { path: path.to_string(), reason: other.to_string() },
    }
}

/// A party's own extended key pair.
#[derive(Clone)]
pub struct HdKeyPair {
    xprv: Xpriv,
    xpub: Xpub,
}

impl HdKeyPair {
    /// Parse an extended private key and compute its public half.
    ///
    /// # Errors
    ///
    /// - `InvalidExtendedKey`: `xprv` is not a BIP32 extended private key
    pub fn from_xprv(curve: &CurveContext, xprv: &str) -> Result<Self, CryptoError> {
        let xprv = parse_xprv(xprv)?;
        let xpub = Xpub::from_priv(&curve.secp, &xprv);
        Ok(Self { xprv, xpub })
    }

    /// Extended private key in BIP32 text form.
    pub fn extended_private_key(&self) -> String {
        self.xprv.to_string()
    }

    /// Extended public key in BIP32 text form.
    pub fn extended_public_key(&self) -> String {
        self.xpub.to_string()
    }
}

impl fmt::Debug for HdKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HdKeyPair").field("xpub", &self.xpub.to_string()).finish_non_exhaustive()
    }
}

/// The keys one party uses to talk to one peer.
///
/// `local` is our extended private key, `remote` is the peer's extended
/// public key. Parsed once and reused for every derivation in a session.
#[derive(Clone)]
pub struct ExtendedKeys {
    local: Xpriv,
    remote: Xpub,
}

impl ExtendedKeys {
    /// Parse both keys.
    ///
    /// The remote key may also be given as an extended private key, in which
    /// case only its public half is kept.
    ///
    /// # Errors
    ///
    /// - `InvalidExtendedKey`: either key fails to parse
    pub fn parse(curve: &CurveContext, local: &str, remote: &str) -> Result<Self, CryptoError> {
        Ok(Self { local: parse_xprv(local)?, remote: parse_remote(curve, remote)? })
    }

    /// Pair our own key pair with a peer's key.
    ///
    /// # Errors
    ///
    /// - `InvalidExtendedKey`: `remote` fails to parse
    pub fn from_pair(
        curve: &CurveContext,
        local: &HdKeyPair,
        remote: &str,
    ) -> Result<Self, CryptoError> {
        Ok(Self { local: local.xprv, remote: parse_remote(curve, remote)? })
    }

    /// Peer's extended public key in BIP32 text form.
    pub fn remote_public_key(&self) -> String {
        self.remote.to_string()
    }
}

impl fmt::Debug for ExtendedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedKeys")
            .field("remote", &self.remote.to_string())
            .finish_non_exhaustive()
    }
}

fn parse_xprv(text: &str) -> Result<Xpriv, CryptoError> {
    Xpriv::from_str(text.trim())
        .map_err(|err| CryptoError::InvalidExtendedKey { reason: format!("local key: {err}") })
}

fn parse_remote(curve: &CurveContext, text: &str) -> Result<Xpub, CryptoError> {
    let text = text.trim();
    match Xpub::from_str(text) {
        Ok(xpub) => Ok(xpub),
        Err(pub_err) => Xpriv::from_str(text)
            .map(|xprv| Xpub::from_priv(&curve.secp, &xprv))
            .map_err(|_| CryptoError::InvalidExtendedKey {
                reason: format!("remote key: {pub_err}"),
            }),
    }
}

/// A 256-bit ECDH shared secret.
///
/// Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret {
    bytes: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Raw secret bytes (big-endian x-coordinate).
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.bytes
    }

    /// Lowercase, zero-padded, 64-character hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// First 16 bytes, used as a CTR initial counter block.
    pub fn iv(&self) -> [u8; IV_SIZE] {
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&self.bytes[..IV_SIZE]);
        iv
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// Text-in, text-out shared secret for one path.
///
/// Parses both extended keys on every call. Sessions should parse an
/// [`ExtendedKeys`] once and use [`CurveContext::shared_secret`] instead.
///
/// # Errors
///
/// - `InvalidExtendedKey`, `InvalidPath`: malformed input text
/// - `Derivation`, `Curve`: see [`CurveContext::shared_secret`]
pub fn gen_shared_key(
    curve: &CurveContext,
    local: &str,
    remote: &str,
    path: &str,
) -> Result<String, CryptoError> {
    let keys = ExtendedKeys::parse(curve, local, remote)?;
    let path = KeyPath::from_str(path)?;
    Ok(curve.shared_secret(&keys, &path)?.to_hex())
}
