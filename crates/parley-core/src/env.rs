//! Time and randomness as an injected dependency.
//!
//! The connection and the client never read the system clock or an RNG
//! directly. The binary passes a wall-clock environment; the simulation
//! harness passes a virtual clock and a seeded RNG, so reconnect jitter and
//! message keys replay identically.

use std::time::Duration;

/// Source of time and randomness.
///
/// # Invariants
///
/// - `now()` is monotonic
/// - The same simulation seed yields the same `random_bytes` sequence
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type: `std::time::Instant` in production, a virtual instant in
    /// simulation.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current instant.
    fn now(&self) -> Self::Instant;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64` for reconnect jitter and idempotency keys.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
