//! Runner configuration
//!
//! Every setting has a typed default and may be overridden through an
//! environment variable. Unparsable values fall back to the default.

use std::time::Duration;

use rand::Rng;

/// Configuration for the completion poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between status queries
    pub poll_interval: Duration,
    /// Minimum spacing between progress/diagnostic notifications
    pub progress_interval: Duration,
    /// Wait budget when the caller gives no timeout
    pub default_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            progress_interval: Duration::from_secs(5),
            default_timeout: Duration::from_secs(600),
        }
    }
}

impl PollerConfig {
    /// Build from `TESTRUN_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: env_millis("TESTRUN_POLL_INTERVAL_MS", defaults.poll_interval),
            progress_interval: env_millis(
                "TESTRUN_PROGRESS_INTERVAL_MS",
                defaults.progress_interval,
            ),
            default_timeout: env_secs("TESTRUN_DEFAULT_TIMEOUT_SECS", defaults.default_timeout),
        }
    }
}

/// Retry policy for the HTTP transport
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff for the first retry; doubles on each further retry
    pub base_delay: Duration,
    /// Upper bound for a single backoff
    pub max_delay: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Build from `TESTRUN_*` environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: parse_u64(std::env::var("TESTRUN_MAX_RETRIES").ok().as_deref())
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_retries),
            base_delay: env_millis("TESTRUN_RETRY_BASE_MS", defaults.base_delay),
            max_delay: defaults.max_delay,
            request_timeout: env_secs("TESTRUN_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
        }
    }

    /// Delay before retry number `attempt` (zero-based), with jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = (self.base_delay.as_millis() / 2) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

fn parse_u64(raw: Option<&str>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok()
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    parse_u64(raw).filter(|v| *v > 0)
}

fn env_millis(name: &str, default: Duration) -> Duration {
    parse_positive(std::env::var(name).ok().as_deref())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn env_secs(name: &str, default: Duration) -> Duration {
    parse_positive(std::env::var(name).ok().as_deref())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
