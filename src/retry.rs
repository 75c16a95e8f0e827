//! Bounded retry policy for outbound translation requests.
//!
//! - Exponential backoff from `initial_delay`, capped at `max_delay`
//! - Down-jitter of up to 25%
//! - Retry on connection errors and HTTP 408, 429, 5xx
//! - A valid `Retry-After` header on the failed response replaces the backoff
//!
//! Adapted from the provider retry module in forge (`providers/src/retry.rs`).

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::config::TranslationConfig;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            jitter_factor: 0.25,
        }
    }
}

impl From<&TranslationConfig> for RetryConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            ..Default::default()
        }
    }
}

pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500..=599)
}

/// `Retry-After` in whole seconds, kept only when `0 < delay < 60s`.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    (secs > 0 && secs < 60).then_some(Duration::from_secs(secs))
}

/// Delay before retry number `backoff_step + 1`.
pub fn retry_delay(backoff_step: u32, config: &RetryConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step as i32);
    let capped = base.min(config.max_delay.as_secs_f64());
    let jitter = 1.0 - rand::random::<f64>() * config.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}
