//! Coordinator error types

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that cross the coordinator boundary
///
/// Construction problems and caller misuse. Transport timing problems never
/// show up here; they are absorbed into the retry mechanism.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Invalid in-flight window (min={min_in_flight}, max={max_in_flight}): {reason}")]
    Configuration {
        min_in_flight: usize,
        max_in_flight: usize,
        reason: String,
    },

    #[error("Can't have more than {max_in_flight} requests in flight; check can_request() before submit()")]
    CapacityExceeded { max_in_flight: usize },

    #[error("Failed to create reply address: {0}")]
    ReplyAddress(#[source] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_exceeded_message() {
        let err = CoordinatorError::CapacityExceeded { max_in_flight: 30 };
        let msg = err.to_string();
        assert!(msg.contains("30"));
        assert!(msg.contains("can_request"));
    }

    #[test]
    fn test_configuration_message() {
        let err = CoordinatorError::Configuration {
            min_in_flight: 5,
            max_in_flight: 2,
            reason: "min-in-flight exceeds max-in-flight".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("min=5"));
        assert!(msg.contains("max=2"));
    }
}
