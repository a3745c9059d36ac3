//! Request coordinator: admission window, correlation and retry

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::{CoordinatorConfig, validate_window};
use super::error::CoordinatorError;
use super::metrics::CoordinatorMetrics;
use super::pending::{PendingRequest, PendingTable};
use crate::envelope::{CorrelationId, Envelope, ReplyAddress, ReplyStatus};
use crate::transport::Transport;

/// Admission state of the in-flight window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Open,
    Closed,
}

/// Gives callers request/reply semantics over a publish/subscribe transport
///
/// The caller drives it cooperatively: submit while [`can_request`] holds,
/// then [`poll_ready`] to collect replies and reissue timed-out requests.
/// All state lives in this instance and is only touched through `&mut self`.
///
/// [`can_request`]: RequestCoordinator::can_request
/// [`poll_ready`]: RequestCoordinator::poll_ready
pub struct RequestCoordinator<T: Transport, M> {
    transport: T,
    reply_to: ReplyAddress,
    pending: PendingTable<T::Payload, M>,
    min_in_flight: usize,
    max_in_flight: usize,
    admission: Admission,
    metrics: CoordinatorMetrics,
}

impl<T, M> RequestCoordinator<T, M>
where
    T: Transport,
    T::Payload: Clone,
{
    /// Create a coordinator owning `transport`
    ///
    /// `min_in_flight` defaults to `max_in_flight`. One reply address is
    /// created here and shared by every request this coordinator issues.
    pub fn new(mut transport: T, max_in_flight: usize, min_in_flight: Option<usize>) -> Result<Self, CoordinatorError> {
        debug!(max_in_flight, ?min_in_flight, "RequestCoordinator::new: called");
        let (min_in_flight, max_in_flight) = validate_window(max_in_flight, min_in_flight)?;
        let reply_to = transport
            .create_reply_address()
            .map_err(CoordinatorError::ReplyAddress)?;

        info!(%reply_to, min_in_flight, max_in_flight, "Request coordinator ready");
        Ok(Self {
            transport,
            reply_to,
            pending: PendingTable::new(),
            min_in_flight,
            max_in_flight,
            admission: Admission::Open,
            metrics: CoordinatorMetrics::default(),
        })
    }

    /// Create a coordinator from its configuration section
    pub fn from_config(transport: T, config: &CoordinatorConfig) -> Result<Self, CoordinatorError> {
        Self::new(transport, config.max_in_flight, config.min_in_flight)
    }

    /// Whether `submit` may be called
    pub fn can_request(&self) -> bool {
        self.admission == Admission::Open
    }

    /// Whether every submitted request has been answered
    pub fn all_received(&self) -> bool {
        self.pending.is_empty()
    }

    /// Publish a request and start tracking it
    ///
    /// Fails with [`CoordinatorError::CapacityExceeded`] when admission is
    /// closed. A publish the transport rejects is still tracked, so it is
    /// reissued once its deadline passes.
    pub async fn submit(
        &mut self,
        payload: T::Payload,
        routing_key: impl Into<String>,
        time_budget: Duration,
        metadata: M,
    ) -> Result<CorrelationId, CoordinatorError> {
        let routing_key = routing_key.into();
        debug!(%routing_key, ?time_budget, in_flight = self.pending.len(), "RequestCoordinator::submit: called");

        if !self.can_request() {
            return Err(CoordinatorError::CapacityExceeded {
                max_in_flight: self.max_in_flight,
            });
        }

        let correlation_id = self.dispatch(routing_key, payload, time_budget, metadata).await;
        self.metrics.submitted += 1;

        if self.pending.len() >= self.max_in_flight {
            debug!(in_flight = self.pending.len(), "RequestCoordinator::submit: window full, closing admission");
            self.admission = Admission::Closed;
        }

        Ok(correlation_id)
    }

    /// Wait up to `wait_budget` for replies, then reissue expired requests
    ///
    /// Returns the matched `(reply, metadata)` pairs in arrival order.
    /// Replies with no pending request are dropped. Reopens admission if the
    /// window has drained to `min_in_flight`.
    pub async fn poll_ready(&mut self, wait_budget: Duration) -> Vec<(Envelope<T::Payload>, M)> {
        debug!(?wait_budget, in_flight = self.pending.len(), "RequestCoordinator::poll_ready: called");
        let started = Instant::now();
        let mut ready = Vec::new();

        loop {
            let remaining = wait_budget.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                break;
            }

            match self.transport.receive(remaining).await {
                Ok(envelope) => {
                    if let Some(pair) = self.accept(envelope) {
                        ready.push(pair);
                    }
                }
                Err(e) if e.is_timeout() => break,
                Err(e) => {
                    warn!(error = %e, "Transport receive failed, ending poll cycle");
                    break;
                }
            }
        }

        self.retry_expired().await;

        if self.admission == Admission::Closed && self.pending.len() <= self.min_in_flight {
            debug!(in_flight = self.pending.len(), "RequestCoordinator::poll_ready: reopening admission");
            self.admission = Admission::Open;
        }

        debug!(matched = ready.len(), in_flight = self.pending.len(), "RequestCoordinator::poll_ready: done");
        ready
    }

    /// Match an inbound envelope against the pending table
    fn accept(&mut self, envelope: Envelope<T::Payload>) -> Option<(Envelope<T::Payload>, M)> {
        let correlation_id = envelope.correlation_id;

        if !self.pending.contains(&correlation_id) {
            debug!(%correlation_id, "Discarding reply with no pending request");
            self.metrics.replies_unmatched += 1;
            return None;
        }

        if let ReplyStatus::Failed { reason } = &envelope.status {
            warn!(%correlation_id, %reason, "Remote reported failure, request stays pending");
            self.metrics.replies_failed += 1;
            return None;
        }

        let request = self.pending.remove(&correlation_id)?;
        self.metrics.replies_matched += 1;
        self.metrics.record_in_flight(self.pending.len());
        Some((envelope, request.metadata))
    }

    /// Reissue every request whose deadline has elapsed under a new id
    async fn retry_expired(&mut self) {
        let expired = self.pending.take_expired(Instant::now());
        for (old_id, request) in expired {
            let PendingRequest {
                routing_key,
                payload,
                time_budget,
                metadata,
                ..
            } = request;
            debug!(%old_id, %routing_key, "Request deadline elapsed, retrying");
            let new_id = self.dispatch(routing_key, payload, time_budget, metadata).await;
            self.metrics.retries += 1;
            debug!(%old_id, %new_id, "Request reissued");
        }
    }

    async fn dispatch(&mut self, routing_key: String, payload: T::Payload, time_budget: Duration, metadata: M) -> CorrelationId {
        let envelope = Envelope::request(payload.clone(), routing_key.clone(), self.reply_to.clone(), time_budget);
        let correlation_id = envelope.correlation_id;

        if let Err(e) = self.transport.publish(envelope).await {
            warn!(%correlation_id, %routing_key, error = %e, "Publish failed, request will be retried at its deadline");
            self.metrics.publish_failures += 1;
        }

        let request = PendingRequest::new(routing_key, payload, time_budget, metadata, Instant::now());
        self.pending.insert(correlation_id, request);
        self.metrics.record_in_flight(self.pending.len());
        correlation_id
    }
}

impl<T: Transport, M> RequestCoordinator<T, M> {
    /// Current admission state
    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Number of requests awaiting a reply
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// `(min_in_flight, max_in_flight)`
    pub fn window(&self) -> (usize, usize) {
        (self.min_in_flight, self.max_in_flight)
    }

    /// Address replies to this coordinator are published to
    pub fn reply_address(&self) -> &ReplyAddress {
        &self.reply_to
    }

    /// Correlation ids currently awaiting a reply
    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        self.pending.ids().copied().collect()
    }

    /// Look up a pending request by correlation id
    pub fn pending_request(&self, id: &CorrelationId) -> Option<&PendingRequest<T::Payload, M>> {
        self.pending.get(id)
    }

    /// Snapshot of traffic counters
    pub fn metrics(&self) -> CoordinatorMetrics {
        self.metrics.clone()
    }
}
