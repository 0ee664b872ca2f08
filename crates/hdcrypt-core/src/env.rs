//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (wall clock, randomness).
//! Tests drive the clock by hand and fix the random session offset; production
//! uses [`SystemEnv`](crate::SystemEnv).

/// Abstract environment providing wall-clock time and randomness.
///
/// # Contract
///
/// Implementations must provide:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - `now_millis()` is Unix time in milliseconds, comparable across the two
///   parties of a conversation (expiry checks compare the sender's clock with
///   the receiver's)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Unlike a monotonic clock this may jump; expiry is a data-level check,
    /// not a deadline.
    fn now_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// Production implementations draw from a cryptographically secure RNG.
    /// Test implementations may return fixed bytes to pin the session offset.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u32`.
    ///
    /// Used for the per-session path offset.
    fn random_u32(&self) -> u32 {
        let mut bytes = [0u8; 4];
        self.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }
}
