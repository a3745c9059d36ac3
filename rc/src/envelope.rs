//! Envelope types carried by a transport
//!
//! An envelope is one unit on the wire: an opaque payload plus the routing
//! data a broker and the coordinator need to deliver it and match replies.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Identifier used to match a reply to the request that caused it
///
/// Every request envelope gets a fresh one, so two envelopes for the same
/// logical request never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new, time-ordered correlation id
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination a remote service publishes its reply to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplyAddress(String);

impl ReplyAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReplyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome reported by the remote side of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyStatus {
    #[default]
    Ok,
    Failed { reason: String },
}

impl ReplyStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyStatus::Ok)
    }
}

/// One outbound or inbound unit of data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<P> {
    pub payload: P,
    #[serde(rename = "routing-key")]
    pub routing_key: String,
    #[serde(rename = "reply-to")]
    pub reply_to: Option<ReplyAddress>,
    #[serde(rename = "correlation-id")]
    pub correlation_id: CorrelationId,
    #[serde(rename = "time-budget")]
    pub time_budget: Option<Duration>,
    #[serde(default)]
    pub status: ReplyStatus,
    #[serde(rename = "created-at")]
    pub created_at: SystemTime,
}

impl<P> Envelope<P> {
    /// Build a request envelope with a freshly assigned correlation id
    pub fn request(payload: P, routing_key: impl Into<String>, reply_to: ReplyAddress, time_budget: Duration) -> Self {
        let routing_key = routing_key.into();
        let correlation_id = CorrelationId::generate();
        debug!(%routing_key, %correlation_id, ?time_budget, "Envelope::request: called");
        Self {
            payload,
            routing_key,
            reply_to: Some(reply_to),
            correlation_id,
            time_budget: Some(time_budget),
            status: ReplyStatus::Ok,
            created_at: SystemTime::now(),
        }
    }

    /// Whether the sender's time budget ran out since this was created
    ///
    /// Envelopes without a budget never expire.
    pub fn deadline_exceeded(&self) -> bool {
        match (self.time_budget, self.created_at.elapsed()) {
            (Some(budget), Ok(age)) => age > budget,
            _ => false,
        }
    }

    /// Build the reply to `request`, or `None` if it has no reply address
    ///
    /// The reply is routed to the request's reply address and carries the
    /// request's correlation id.
    pub fn reply_to<Q>(request: &Envelope<Q>, payload: P, status: ReplyStatus) -> Option<Self> {
        let address = request.reply_to.as_ref()?;
        Some(Self {
            payload,
            routing_key: address.as_str().to_string(),
            reply_to: None,
            correlation_id: request.correlation_id,
            time_budget: None,
            status,
            created_at: SystemTime::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelopes_get_distinct_ids() {
        let addr = ReplyAddress::new("reply.test");
        let a = Envelope::request(1u32, "GetPosition", addr.clone(), Duration::from_millis(100));
        let b = Envelope::request(1u32, "GetPosition", addr, Duration::from_millis(100));
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_eq!(a.routing_key, b.routing_key);
    }

    #[test]
    fn test_reply_carries_request_id() {
        let request = Envelope::request("ping", "Echo", ReplyAddress::new("reply.abc"), Duration::from_secs(1));
        let reply = Envelope::reply_to(&request, "pong", ReplyStatus::Ok).unwrap();

        assert_eq!(reply.correlation_id, request.correlation_id);
        assert_eq!(reply.routing_key, "reply.abc");
        assert!(reply.reply_to.is_none());
        assert!(reply.time_budget.is_none());
    }

    #[test]
    fn test_reply_without_address() {
        let mut request = Envelope::request((), "Echo", ReplyAddress::new("reply.x"), Duration::from_secs(1));
        request.reply_to = None;
        assert!(Envelope::reply_to(&request, (), ReplyStatus::Ok).is_none());
    }

    #[test]
    fn test_deadline_exceeded() {
        let mut request = Envelope::request((), "Echo", ReplyAddress::new("reply.x"), Duration::from_millis(50));
        assert!(!request.deadline_exceeded());

        request.created_at = SystemTime::now() - Duration::from_secs(1);
        assert!(request.deadline_exceeded());

        request.time_budget = None;
        assert!(!request.deadline_exceeded());
    }

    #[test]
    fn test_reply_status() {
        assert!(ReplyStatus::Ok.is_ok());
        assert!(
            !ReplyStatus::Failed {
                reason: "boom".to_string()
            }
            .is_ok()
        );
        assert_eq!(ReplyStatus::default(), ReplyStatus::Ok);
    }
}
