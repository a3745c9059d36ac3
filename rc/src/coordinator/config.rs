//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::error::CoordinatorError;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Admission closes when this many requests are in flight
    #[serde(rename = "max-in-flight", default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Admission reopens once in-flight drops to this (defaults to max)
    #[serde(rename = "min-in-flight", default, skip_serializing_if = "Option::is_none")]
    pub min_in_flight: Option<usize>,

    /// Per-request time budget in milliseconds
    #[serde(rename = "time-budget-ms", default = "default_time_budget_ms")]
    pub time_budget_ms: u64,

    /// How long one poll cycle waits for replies, in milliseconds
    #[serde(rename = "poll-wait-ms", default = "default_poll_wait_ms")]
    pub poll_wait_ms: u64,
}

fn default_max_in_flight() -> usize {
    debug!("default_max_in_flight: called");
    30
}

fn default_time_budget_ms() -> u64 {
    debug!("default_time_budget_ms: called");
    1000
}

fn default_poll_wait_ms() -> u64 {
    debug!("default_poll_wait_ms: called");
    1000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            max_in_flight: 30,
            min_in_flight: None,
            time_budget_ms: 1000,
            poll_wait_ms: 1000,
        }
    }
}

impl CoordinatorConfig {
    /// Resolve and check the admission window
    ///
    /// Returns `(min, max)` with `min` defaulted to `max`.
    pub fn window(&self) -> Result<(usize, usize), CoordinatorError> {
        validate_window(self.max_in_flight, self.min_in_flight)
    }

    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_millis(self.poll_wait_ms)
    }
}

/// Check `0 <= min <= max` and `max > 0`, defaulting `min` to `max`
pub(crate) fn validate_window(
    max_in_flight: usize,
    min_in_flight: Option<usize>,
) -> Result<(usize, usize), CoordinatorError> {
    let min = min_in_flight.unwrap_or(max_in_flight);
    if max_in_flight == 0 {
        return Err(CoordinatorError::Configuration {
            min_in_flight: min,
            max_in_flight,
            reason: "max-in-flight must be at least 1".to_string(),
        });
    }
    if min > max_in_flight {
        return Err(CoordinatorError::Configuration {
            min_in_flight: min,
            max_in_flight,
            reason: "min-in-flight exceeds max-in-flight".to_string(),
        });
    }
    Ok((min, max_in_flight))
}
