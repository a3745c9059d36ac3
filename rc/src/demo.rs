//! In-process demo: a position service and a client driving it
//!
//! The client sends poses, the service answers each with the pose's
//! position after a simulated service time. With enough requests in flight
//! the service falls behind the time budget and the coordinator's retries
//! become visible.

use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::Config;
use crate::coordinator::{CoordinatorMetrics, RequestCoordinator};
use crate::driver::{DriveOptions, DriveReport, drive};
use crate::service::{Handler, ServiceProvider};
use crate::transport::MemoryBroker;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position,
    pub heading: f64,
}

/// Payload kinds exchanged by the demo
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DemoMessage {
    #[default]
    Empty,
    Pose(Pose),
    Position(Position),
}

/// Answers a pose with its position after a random service time
pub struct PositionService {
    service_time_ms: RangeInclusive<u64>,
}

impl PositionService {
    pub fn new(mean_ms: u64, jitter_ms: u64) -> Self {
        Self {
            service_time_ms: mean_ms.saturating_sub(jitter_ms)..=mean_ms.saturating_add(jitter_ms),
        }
    }
}

#[async_trait]
impl Handler<DemoMessage> for PositionService {
    async fn handle(&self, request: DemoMessage) -> Result<DemoMessage> {
        let DemoMessage::Pose(pose) = &request else {
            return Err(eyre!("Expected a pose, got {:?}", request));
        };
        let delay = rand::rng().random_range(self.service_time_ms.clone());
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(DemoMessage::Position(pose.position))
    }
}

/// One answered request
#[derive(Debug, Clone, Serialize)]
pub struct DemoReply {
    pub id: u32,
    pub position: Option<Position>,
}

/// Everything the demo observed
#[derive(Debug, Clone, Serialize)]
pub struct DemoSummary {
    pub report: DriveReport,
    pub metrics: CoordinatorMetrics,
    pub replies: Vec<DemoReply>,
}

/// Run the client and the service against one in-process broker
pub async fn run_demo(config: &Config) -> Result<DemoSummary> {
    debug!(requests = config.demo.requests, "run_demo: called");
    config.validate()?;

    let broker = MemoryBroker::<DemoMessage>::new();
    let mut provider = ServiceProvider::new(broker.channel());
    provider
        .delegate(
            &config.demo.routing_key,
            PositionService::new(config.demo.service_time_ms, config.demo.service_jitter_ms),
        )
        .context("Failed to start demo service")?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service_task = tokio::spawn(provider.run(shutdown_rx));

    let mut coordinator = RequestCoordinator::from_config(broker.channel(), &config.coordinator)?;
    let mut options = DriveOptions::from_config(config.demo.routing_key.as_str(), &config.coordinator);
    if let Some(ms) = config.demo.give_up_after_ms {
        options = options.with_give_up_after(Duration::from_millis(ms));
    }

    let backlog = (0..config.demo.requests).map(|i| {
        let pose = Pose {
            position: Position {
                x: f64::from(i),
                y: 2.0 * f64::from(i),
            },
            heading: 0.0,
        };
        (DemoMessage::Pose(pose), i)
    });

    let mut replies = Vec::new();
    let report = drive(&mut coordinator, backlog, &options, |reply, id| {
        let position = match reply.payload {
            DemoMessage::Position(position) => Some(position),
            _ => None,
        };
        debug!(id, ?position, "Reply received");
        replies.push(DemoReply { id, position });
    })
    .await?;

    let _ = shutdown_tx.send(());
    let served = service_task.await.context("Demo service task panicked")??;
    info!(served, "Demo service finished");

    Ok(DemoSummary {
        report,
        metrics: coordinator.metrics(),
        replies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_position_service_answers_pose() {
        let service = PositionService::new(1, 1);
        let pose = Pose {
            position: Position { x: 3.0, y: 6.0 },
            heading: 1.5,
        };
        let reply = service.handle(DemoMessage::Pose(pose)).await.unwrap();
        assert_eq!(reply, DemoMessage::Position(Position { x: 3.0, y: 6.0 }));
    }

    #[tokio::test]
    async fn test_position_service_rejects_other_payloads() {
        let service = PositionService::new(0, 0);
        assert!(service.handle(DemoMessage::Empty).await.is_err());
    }

    #[test]
    fn test_service_time_range_saturates() {
        let service = PositionService::new(10, 20);
        assert_eq!(service.service_time_ms, 0..=30);

        let service = PositionService::new(u64::MAX - 1, 20);
        assert_eq!(service.service_time_ms, (u64::MAX - 21)..=u64::MAX);
    }
}
