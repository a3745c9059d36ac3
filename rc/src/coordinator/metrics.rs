//! Counters describing a coordinator's traffic

use serde::{Deserialize, Serialize};

/// Snapshot of coordinator activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    /// Requests accepted by `submit`
    pub submitted: u64,
    /// Replies matched to a pending request
    pub replies_matched: u64,
    /// Replies with no pending request (stale or duplicate)
    pub replies_unmatched: u64,
    /// Replies whose status reported a remote failure
    pub replies_failed: u64,
    /// Requests reissued after their deadline elapsed
    pub retries: u64,
    /// Publish attempts the transport rejected
    pub publish_failures: u64,
    /// Current pending table size
    pub in_flight: usize,
    /// Largest pending table size observed
    pub peak_in_flight: usize,
}

impl CoordinatorMetrics {
    pub(crate) fn record_in_flight(&mut self, in_flight: usize) {
        self.in_flight = in_flight;
        self.peak_in_flight = self.peak_in_flight.max(in_flight);
    }
}
