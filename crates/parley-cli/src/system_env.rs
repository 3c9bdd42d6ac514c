//! Wall-clock environment for the binary.

use parley_client::Environment;

/// Monotonic system clock and OS randomness.
///
/// # Panics
///
/// `random_bytes` panics if the OS random source fails. Idempotency keys
/// drawn from a broken source could collide, so the client does not run
/// without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// System environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS random source available");
    }
}
