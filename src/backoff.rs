//! Delay policies for retries and reconnects
//!
//! Request retries back off exponentially (`base * 2^(n-1)`, capped), while
//! connection reconnects back off linearly (`base * n`, capped). Both are
//! expressed as a [`Backoff`] so the two components share one policy type.

use std::time::Duration;

/// Growth curve for successive attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growth {
    /// `base * 2^(attempt - 1)`
    Exponential,
    /// `base * attempt`
    Linear,
}

/// Backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry
    pub base: Duration,
    /// Upper bound for any single delay
    pub max: Duration,
    /// Growth curve
    pub growth: Growth,
}

impl Backoff {
    /// Exponential backoff with the given base and cap
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            growth: Growth::Exponential,
        }
    }

    /// Linear backoff with the given base and cap
    pub fn linear(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            growth: Growth::Linear,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    ///
    /// Attempt 0 has no delay.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay = match self.growth {
            Growth::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base.saturating_mul(factor)
            }
            Growth::Linear => self.base.saturating_mul(attempt),
        };

        delay.min(self.max)
    }
}
