//! Service provider: the remote side of a request
//!
//! Subscribes topics on a transport, hands each request to the handler
//! delegated for its topic, and publishes the reply back to the request's
//! reply address under the same correlation id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::envelope::{Envelope, ReplyStatus};
use crate::transport::{Transport, TransportError};

/// Computes the reply for one request
#[async_trait]
pub trait Handler<P>: Send + Sync {
    async fn handle(&self, request: P) -> Result<P>;
}

/// What happened to one inbound envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A reply was published (successful or failed status)
    Replied,
    /// The request was dropped (no handler, no reply address, or expired)
    Dropped,
    /// Nothing arrived before the timeout
    Idle,
}

/// Serves delegated topics over a transport
pub struct ServiceProvider<T: Transport> {
    transport: T,
    handlers: HashMap<String, Arc<dyn Handler<T::Payload>>>,
    idle_poll: Duration,
    replied: u64,
}

impl<T> ServiceProvider<T>
where
    T: Transport,
    T::Payload: Default,
{
    pub fn new(transport: T) -> Self {
        debug!("ServiceProvider::new: called");
        Self {
            transport,
            handlers: HashMap::new(),
            idle_poll: Duration::from_millis(100),
            replied: 0,
        }
    }

    /// How long `run` waits for a request before checking for shutdown
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Subscribe `topic` and route its requests to `handler`
    pub fn delegate(&mut self, topic: &str, handler: impl Handler<T::Payload> + 'static) -> Result<(), TransportError> {
        debug!(%topic, "ServiceProvider::delegate: called");
        self.transport.subscribe(topic)?;
        self.handlers.insert(topic.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Number of replies published so far
    pub fn replied(&self) -> u64 {
        self.replied
    }

    /// Serve at most one request, waiting up to `timeout` for it
    pub async fn serve_next(&mut self, timeout: Duration) -> Result<ServeOutcome, TransportError> {
        let mut request = match self.transport.receive(timeout).await {
            Ok(request) => request,
            Err(e) if e.is_timeout() => return Ok(ServeOutcome::Idle),
            Err(e) => return Err(e),
        };
        let correlation_id = request.correlation_id;
        debug!(%correlation_id, topic = %request.routing_key, "ServiceProvider::serve_next: request received");

        let Some(handler) = self.handlers.get(&request.routing_key).cloned() else {
            warn!(topic = %request.routing_key, "No handler delegated for topic, dropping request");
            return Ok(ServeOutcome::Dropped);
        };
        if request.reply_to.is_none() {
            warn!(%correlation_id, "Request has no reply address, dropping");
            return Ok(ServeOutcome::Dropped);
        }
        if request.deadline_exceeded() {
            // the requester has already reissued this under a new id
            debug!(%correlation_id, "Request deadline exceeded, dropping");
            return Ok(ServeOutcome::Dropped);
        }

        let payload = std::mem::take(&mut request.payload);
        let (payload, status) = match handler.handle(payload).await {
            Ok(payload) => (payload, ReplyStatus::Ok),
            Err(e) => {
                warn!(%correlation_id, error = %e, "Handler failed");
                (T::Payload::default(), ReplyStatus::Failed { reason: e.to_string() })
            }
        };

        let Some(reply) = Envelope::reply_to(&request, payload, status) else {
            return Ok(ServeOutcome::Dropped);
        };
        if let Err(e) = self.transport.publish(reply).await {
            // the requester may have gone away; it will retry if it still cares
            warn!(%correlation_id, error = %e, "Failed to publish reply");
            return Ok(ServeOutcome::Dropped);
        }

        self.replied += 1;
        Ok(ServeOutcome::Replied)
    }

    /// Serve until `shutdown` fires or its sender is dropped
    ///
    /// Returns the number of replies published.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Result<u64> {
        info!(topics = self.handlers.len(), "Service provider started");
        let idle_poll = self.idle_poll;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.serve_next(idle_poll) => {
                    outcome?;
                }
            }
        }
        info!(replied = self.replied, "Service provider stopped");
        Ok(self.replied)
    }
}
