//! Transport error types

use std::time::Duration;
use thiserror::Error;

/// Errors reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timed out after {0:?} waiting for a message")]
    Timeout(Duration),

    #[error("Transport closed")]
    Closed,

    #[error("No subscriber bound to routing key '{routing_key}'")]
    Unroutable { routing_key: String },

    #[error("Routing key '{routing_key}' is already bound")]
    AlreadyBound { routing_key: String },
}

impl TransportError {
    /// Check if this is a receive timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}
