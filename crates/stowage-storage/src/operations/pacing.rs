//! Randomized delay between the conflict check and the transfer.

use std::time::Duration;

use rand::Rng;

use crate::ConfigError;

/// Uniformly random delay applied before every upload transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    /// No delay.
    pub const fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Delay drawn uniformly from `[min, max]`.
    pub fn uniform(min: Duration, max: Duration) -> Result<Self, ConfigError> {
        if min > max {
            return Err(ConfigError::InvalidPacing {
                min_ms: saturating_millis(min),
                max_ms: saturating_millis(max),
            });
        }
        Ok(Self { min, max })
    }

    /// Lower bound of the delay.
    pub fn min(&self) -> Duration {
        self.min
    }

    /// Upper bound of the delay.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw one delay.
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let nanos = |d: Duration| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        let drawn = rand::rng().random_range(nanos(self.min)..=nanos(self.max));
        Duration::from_nanos(drawn)
    }

    pub(crate) async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Whole milliseconds in `duration`, clamped to `u64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_millis(200),
        }
    }
}
