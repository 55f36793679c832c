//! Reconnect backoff for the master socket.
//!
//! Connecting fails routinely while the master agent is still starting,
//! so the connector retries with a delay that can grow exponentially.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Reconnect configuration.
///
/// # Examples
///
/// ```rust
/// use async_agentx::transport::Reconnect;
/// use std::time::Duration;
///
/// // Connect once, fail immediately
/// let reconnect = Reconnect::none();
///
/// // Fixed delay between attempts
/// let reconnect = Reconnect::fixed(3, Duration::from_millis(200));
///
/// // Exponential backoff with jitter (250ms, 500ms, 1s, 2s, 2s)
/// let reconnect = Reconnect::exponential(5)
///     .initial_delay(Duration::from_millis(250))
///     .max_delay(Duration::from_secs(2))
///     .jitter(0.25)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct Reconnect {
    /// Maximum number of retries after the first attempt (0 = connect once)
    pub max_attempts: u32,
    /// Backoff strategy between attempts
    pub backoff: Backoff,
}

/// Backoff strategy between connection attempts.
#[derive(Clone, Debug, Default)]
pub enum Backoff {
    /// Retry immediately.
    #[default]
    None,

    /// Fixed delay between each attempt.
    Fixed {
        /// Delay before each retry
        delay: Duration,
    },

    /// Exponential backoff: delay doubles after each attempt.
    Exponential {
        /// Initial delay before first retry
        initial: Duration,
        /// Maximum delay cap
        max: Duration,
        /// Jitter factor (0.0-1.0). E.g., 0.25 means ±25% randomization.
        jitter: f64,
    },
}

impl Default for Reconnect {
    /// Default: 5 retries, exponential from 100ms up to 5s.
    fn default() -> Self {
        Self::exponential(5).build()
    }
}

impl Reconnect {
    /// No retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    /// Fixed delay between retries.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Start building an exponential backoff configuration.
    pub fn exponential(attempts: u32) -> ReconnectBuilder {
        ReconnectBuilder {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Compute the delay before retry number `attempt` (0-based).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                max,
                jitter,
            } => {
                let shift = attempt.min(31);
                let multiplier = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
                let base = initial.saturating_mul(multiplier);
                let capped = base.min(*max);

                let factor = jitter_factor(*jitter);
                Duration::from_secs_f64(capped.as_secs_f64() * factor)
            }
        }
    }
}

/// Builder for exponential backoff.
pub struct ReconnectBuilder {
    max_attempts: u32,
    initial: Duration,
    max: Duration,
    jitter: f64,
}

impl Default for ReconnectBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl ReconnectBuilder {
    /// Set the initial delay before the first retry (default: 100ms).
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial = delay;
        self
    }

    /// Set the maximum delay cap (default: 5 seconds).
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max = delay;
        self
    }

    /// Set the jitter factor (default: 0.25). Clamped to [0.0, 1.0].
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> Reconnect {
        Reconnect {
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                initial: self.initial,
                max: self.max,
                jitter: self.jitter,
            },
        }
    }
}

impl From<ReconnectBuilder> for Reconnect {
    fn from(builder: ReconnectBuilder) -> Self {
        builder.build()
    }
}

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Compute a jitter factor in the range [1-jitter, 1+jitter].
///
/// A multiplicative hash of a counter is enough to desynchronise
/// subagents restarting together.
fn jitter_factor(jitter: f64) -> f64 {
    if jitter <= 0.0 {
        return 1.0;
    }
    let counter = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let hash = counter.wrapping_mul(0x5851f42d4c957f2d);
    let random = (hash >> 11) as f64 / ((1u64 << 53) as f64);
    1.0 + (random - 0.5) * 2.0 * jitter
}
