//! Transport abstraction the coordinator sits on
//!
//! A transport is the publish/subscribe collaborator: it creates reply
//! addresses, publishes envelopes, and hands back inbound envelopes with a
//! bounded wait. Connection setup and broker delivery guarantees belong to
//! the implementation.

mod error;
mod memory;

pub use error::TransportError;
pub use memory::{MemoryBroker, MemoryChannel};

use std::time::Duration;

use async_trait::async_trait;

use crate::envelope::{Envelope, ReplyAddress};

/// Publish/subscribe transport consumed by the coordinator and services
#[async_trait]
pub trait Transport: Send {
    /// Payload type carried by this transport's envelopes
    type Payload: Send;

    /// Create a destination that delivers into this transport's inbox
    fn create_reply_address(&mut self) -> Result<ReplyAddress, TransportError>;

    /// Deliver envelopes published to `topic` into this transport's inbox
    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Publish an envelope to its routing key
    async fn publish(&mut self, envelope: Envelope<Self::Payload>) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next inbound envelope
    ///
    /// Returns [`TransportError::Timeout`] when nothing arrives in time.
    async fn receive(&mut self, timeout: Duration) -> Result<Envelope<Self::Payload>, TransportError>;
}
