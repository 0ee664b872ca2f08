//! Replay and expiry bookkeeping for received envelopes.
//!
//! Indices are tracked per sender root, so a peer that starts a new session
//! (new random offset, sequence restarting at 0) is not mistaken for a
//! replay. Only the HMAC and crypt paths are tracked; the IV path is bound to
//! them through the HMAC.

use std::collections::HashSet;

use hdcrypt_crypto::KeyPath;

use crate::{envelope::KeyRole, error::CodecError};

/// A sequence index under a specific sender root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsedIndex {
    /// Sender's session root
    pub root: KeyPath,
    /// Sequence index within that session
    pub sequence: u32,
}

/// Sets of indices this session has already admitted.
///
/// Entries are never released. An index is consumed as soon as it passes the
/// replay and expiry checks, even if the envelope later fails
/// authentication.
#[derive(Debug, Clone, Default)]
pub struct ReplayLedger {
    used_hmac: HashSet<UsedIndex>,
    used_crypt: HashSet<UsedIndex>,
}

impl ReplayLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `index` for `role`, checking replay first and expiry second.
    ///
    /// `expiry` is `(now_ms, expiry_ms)` when the session enforces a maximum
    /// envelope age.
    ///
    /// # Errors
    ///
    /// - `Replay`: `index` was already admitted for `role`
    /// - `Expired`: `now_ms - timestamp_ms > expiry_ms`
    /// - `MissingTimestamp`: expiry is enforced and `timestamp_ms` is `None`
    ///
    /// `KeyRole::Iv` is accepted without being tracked.
    pub fn admit(
        &mut self,
        role: KeyRole,
        index: &UsedIndex,
        timestamp_ms: Option<u64>,
        expiry: Option<(u64, u64)>,
    ) -> Result<(), CodecError> {
        let Some(used) = self.set_mut(role) else {
            return Ok(());
        };

        if used.contains(index) {
            return Err(CodecError::Replay { role, sequence: index.sequence });
        }

        if let Some((now_ms, expiry_ms)) = expiry {
            let Some(sent_ms) = timestamp_ms else {
                return Err(CodecError::MissingTimestamp { expiry_ms });
            };
            let age_ms = now_ms.saturating_sub(sent_ms);
            if age_ms > expiry_ms {
                return Err(CodecError::Expired { age_ms, expiry_ms });
            }
        }

        used.insert(index.clone());
        Ok(())
    }

    /// Whether `index` has been admitted for `role`.
    pub fn is_used(&self, role: KeyRole, index: &UsedIndex) -> bool {
        match role {
            KeyRole::Hmac => self.used_hmac.contains(index),
            KeyRole::Crypt => self.used_crypt.contains(index),
            KeyRole::Iv => false,
        }
    }

    /// Number of indices admitted for `role`.
    pub fn used_count(&self, role: KeyRole) -> usize {
        match role {
            KeyRole::Hmac => self.used_hmac.len(),
            KeyRole::Crypt => self.used_crypt.len(),
            KeyRole::Iv => 0,
        }
    }

    fn set_mut(&mut self, role: KeyRole) -> Option<&mut HashSet<UsedIndex>> {
        match role {
            KeyRole::Hmac => Some(&mut self.used_hmac),
            KeyRole::Crypt => Some(&mut self.used_crypt),
            KeyRole::Iv => None,
        }
    }
}
