//! Non-hardened BIP32 derivation paths

use std::{fmt, str::FromStr};

use bitcoin::bip32::{ChildNumber, DerivationPath};

use crate::{
    error::CryptoError,
    path_codec::{int_to_segments, parse_segment},
};

/// First hardened child index. Every segment of a [`KeyPath`] is below it.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// A derivation path such as `m/0/1/2`.
///
/// Only non-hardened segments are allowed: both parties must be able to
/// derive the same child, and the remote party only holds a public key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath {
    segments: Vec<u32>,
}

impl KeyPath {
    /// The master path `m`.
    pub fn master() -> Self {
        Self::default()
    }

    /// Build a path from raw segments.
    ///
    /// # Errors
    ///
    /// - `InvalidPath`: a segment is at or above the hardened boundary
    pub fn from_segments(segments: Vec<u32>) -> Result<Self, CryptoError> {
        if let Some(bad) = segments.iter().find(|&&s| s >= HARDENED_OFFSET) {
            return Err(CryptoError::InvalidPath {
                path: render(&segments),
                reason: format!("segment {bad} is not a normal child index"),
            });
        }
        Ok(Self { segments })
    }

    /// Segments below `m`.
    pub fn segments(&self) -> &[u32] {
        &self.segments
    }

    /// Number of segments below `m`.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the master path `m`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// New path with `index` appended.
    ///
    /// # Errors
    ///
    /// - `InvalidPath`: `index` is at or above the hardened boundary
    pub fn child(&self, index: u32) -> Result<Self, CryptoError> {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(index);
        Self::from_segments(segments)
    }

    /// New path with the base-2^27 digits of `value` appended.
    ///
    /// Digits are always below 2^27, so this cannot leave the normal range.
    pub fn with_int_suffix(&self, value: u64) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(int_to_segments(value));
        Self { segments }
    }

    /// Convert to the `bitcoin` crate's path type for child derivation.
    pub(crate) fn to_derivation_path(&self) -> DerivationPath {
        self.segments
            .iter()
            .map(|&index| ChildNumber::Normal { index })
            .collect::<Vec<_>>()
            .into()
    }
}

fn render(segments: &[u32]) -> String {
    let mut text = String::from("m");
    for segment in segments {
        text.push('/');
        text.push_str(&segment.to_string());
    }
    text
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for KeyPath {
    type Err = CryptoError;

    /// Parse `m`, `m/0/1` or `m/0/1/`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| CryptoError::InvalidPath { path: text.to_string(), reason };

        let rest = text
            .trim()
            .strip_prefix('m')
            .ok_or_else(|| invalid("path must start with 'm'".to_string()))?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.is_empty() {
            return Ok(Self::master());
        }

        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| invalid("expected '/' after 'm'".to_string()))?;

        let mut segments = Vec::new();
        for segment in rest.split('/') {
            if segment.ends_with('\'') || segment.ends_with('h') {
                return Err(invalid(format!("hardened segment {segment:?} is not allowed")));
            }
            let index = parse_segment(segment)
                .ok_or_else(|| invalid(format!("segment {segment:?} is not a number")))?;
            segments.push(index);
        }

        Self::from_segments(segments).map_err(|err| match err {
            CryptoError::InvalidPath { reason, .. } => invalid(reason),
            other => other,
        })
    }
}
