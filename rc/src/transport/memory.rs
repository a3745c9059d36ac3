//! In-process publish/subscribe broker
//!
//! Routing keys (service topics and reply addresses alike) map to the inbox
//! of exactly one channel. Publishing to an unbound key fails with
//! [`TransportError::Unroutable`]. Dropping a channel releases everything it
//! bound, including reply addresses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use super::{Transport, TransportError};
use crate::envelope::{Envelope, ReplyAddress};

type Inbox<P> = mpsc::UnboundedSender<Envelope<P>>;

/// Shared handle to an in-process broker
///
/// Cheap to clone; all clones route through the same table.
pub struct MemoryBroker<P> {
    routes: Arc<Mutex<HashMap<String, Inbox<P>>>>,
}

impl<P> Clone for MemoryBroker<P> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
        }
    }
}

impl<P> Default for MemoryBroker<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> MemoryBroker<P> {
    /// Create an empty broker
    pub fn new() -> Self {
        debug!("MemoryBroker::new: called");
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Open a new channel with its own inbox
    pub fn channel(&self) -> MemoryChannel<P> {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!("MemoryBroker::channel: opened channel");
        MemoryChannel {
            broker: self.clone(),
            tx,
            rx,
            bindings: Vec::new(),
        }
    }

    /// Number of routing keys currently bound
    pub fn route_count(&self) -> usize {
        self.routes().len()
    }

    /// Check whether a routing key is bound
    pub fn is_bound(&self, routing_key: &str) -> bool {
        self.routes().contains_key(routing_key)
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, Inbox<P>>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bind(&self, routing_key: &str, inbox: &Inbox<P>) -> Result<(), TransportError> {
        let mut routes = self.routes();
        if let Some(existing) = routes.get(routing_key)
            && !existing.is_closed()
        {
            return Err(TransportError::AlreadyBound {
                routing_key: routing_key.to_string(),
            });
        }
        routes.insert(routing_key.to_string(), inbox.clone());
        debug!(%routing_key, "MemoryBroker::bind: bound");
        Ok(())
    }

    fn unbind(&self, routing_key: &str, inbox: &Inbox<P>) {
        let mut routes = self.routes();
        if routes.get(routing_key).is_some_and(|bound| bound.same_channel(inbox)) {
            routes.remove(routing_key);
            debug!(%routing_key, "MemoryBroker::unbind: released");
        }
    }

    fn deliver(&self, envelope: Envelope<P>) -> Result<(), TransportError> {
        let routes = self.routes();
        let inbox = routes.get(&envelope.routing_key).ok_or_else(|| TransportError::Unroutable {
            routing_key: envelope.routing_key.clone(),
        })?;
        trace!(routing_key = %envelope.routing_key, correlation_id = %envelope.correlation_id, "MemoryBroker::deliver");
        inbox.send(envelope).map_err(|_| TransportError::Closed)
    }
}

/// One connection to a [`MemoryBroker`]
///
/// Everything bound through a channel (topics and reply addresses) delivers
/// into the same inbox, which [`Transport::receive`] drains.
pub struct MemoryChannel<P> {
    broker: MemoryBroker<P>,
    tx: Inbox<P>,
    rx: mpsc::UnboundedReceiver<Envelope<P>>,
    bindings: Vec<String>,
}

impl<P> MemoryChannel<P> {
    /// Routing keys bound by this channel
    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }
}

impl<P> Drop for MemoryChannel<P> {
    fn drop(&mut self) {
        for key in &self.bindings {
            self.broker.unbind(key, &self.tx);
        }
    }
}

#[async_trait]
impl<P: Send> Transport for MemoryChannel<P> {
    type Payload = P;

    fn create_reply_address(&mut self) -> Result<ReplyAddress, TransportError> {
        let address = ReplyAddress::new(format!("reply.{}", Uuid::now_v7()));
        self.broker.bind(address.as_str(), &self.tx)?;
        self.bindings.push(address.as_str().to_string());
        debug!(%address, "MemoryChannel::create_reply_address: created");
        Ok(address)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        debug!(%topic, "MemoryChannel::subscribe: called");
        self.broker.bind(topic, &self.tx)?;
        self.bindings.push(topic.to_string());
        Ok(())
    }

    async fn publish(&mut self, envelope: Envelope<P>) -> Result<(), TransportError> {
        self.broker.deliver(envelope)
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Envelope<P>, TransportError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(envelope)) => Ok(envelope),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}
