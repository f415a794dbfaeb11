//! Bounded exponential backoff for safe (read-only) calls.

use crate::response::TransportError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy (Temporal-style fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial attempt (1 => no retries).
    pub maximum_attempts: u32,
    /// Initial backoff interval in milliseconds (before the first retry).
    pub initial_interval_ms: u64,
    /// Backoff multiplier (typically >= 1.0).
    pub backoff_coefficient: f64,
    /// Optional maximum interval between retries in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_interval_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            initial_interval_ms: 200,
            backoff_coefficient: 2.0,
            maximum_interval_ms: Some(5_000),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.maximum_attempts.max(1)
    }

    /// Delay to wait after the failed `attempt` (1-based) before trying again.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(0);
        }
        let exp = attempt.saturating_sub(1).min(30);
        let coeff = self.backoff_coefficient;
        if !coeff.is_finite() || coeff <= 0.0 {
            return Duration::from_millis(0);
        }
        let mult = coeff.powi(i32::try_from(exp).unwrap_or(30));
        if !mult.is_finite() || mult <= 0.0 {
            return Duration::from_millis(0);
        }

        let mut d = Duration::from_millis(self.initial_interval_ms).mul_f64(mult);
        if let Some(max_ms) = self.maximum_interval_ms {
            d = d.min(Duration::from_millis(max_ms));
        }
        d
    }
}

/// Whether a failed attempt may be repeated.
///
/// Only failures that say nothing about the request itself qualify: 5xx responses and
/// connection-level errors. A 4xx will fail the same way again.
#[must_use]
pub fn is_retryable(e: &TransportError) -> bool {
    matches!(
        e,
        TransportError::ServerError { .. } | TransportError::Transport { .. }
    )
}
