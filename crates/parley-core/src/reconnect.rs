//! Reconnect delay policy.

use std::time::Duration;

/// Delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_millis(5000);

/// Upper bound of the exponential part of the delay.
pub const DEFAULT_RECONNECT_MAX: Duration = Duration::from_secs(60);

/// Fraction of the delay added as random jitter.
pub const DEFAULT_JITTER_RATIO: f64 = 0.2;

/// Capped exponential backoff with additive jitter.
///
/// The delay for attempt `n` (zero-based) is
/// `min(max, base × 2ⁿ) + uniform[0, that × jitter_ratio)`. Retries never
/// stop on their own; only an explicit shutdown ends the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt.
    pub base: Duration,
    /// Cap for the exponential part.
    pub max: Duration,
    /// Jitter as a fraction of the capped delay, clamped to `[0, 1]`.
    pub jitter_ratio: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_RECONNECT_BASE,
            max: DEFAULT_RECONNECT_MAX,
            jitter_ratio: DEFAULT_JITTER_RATIO,
        }
    }
}

impl ReconnectPolicy {
    /// Constant delay without jitter.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self { base: delay, max: delay, jitter_ratio: 0.0 }
    }

    /// Delay before attempt number `attempt`, using `random` as the jitter
    /// source.
    #[must_use]
    pub fn delay(&self, attempt: u32, random: u64) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let capped = self.base.saturating_mul(factor).min(self.max);

        let span = capped.mul_f64(self.jitter_ratio.clamp(0.0, 1.0)).as_nanos();
        if span == 0 {
            return capped;
        }

        let jitter = (u128::from(random) % span) as u64;
        capped + Duration::from_nanos(jitter)
    }
}
