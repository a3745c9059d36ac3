//! Batch driver: the submit/poll loop every caller ends up writing
//!
//! Feeds a backlog through a [`RequestCoordinator`] while admission is open,
//! polls for replies, and finishes once the backlog is drained and nothing
//! is left in flight.

use std::time::Duration;

use eyre::{Context, Result, eyre};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::coordinator::{CoordinatorConfig, RequestCoordinator};
use crate::envelope::Envelope;
use crate::transport::Transport;

/// How the driver submits and polls
#[derive(Debug, Clone)]
pub struct DriveOptions {
    /// Routing key every request in the backlog is sent to
    pub routing_key: String,
    pub time_budget: Duration,
    pub poll_wait: Duration,
    /// Fail instead of retrying forever once this much time has passed
    pub give_up_after: Option<Duration>,
}

impl DriveOptions {
    pub fn from_config(routing_key: impl Into<String>, config: &CoordinatorConfig) -> Self {
        Self {
            routing_key: routing_key.into(),
            time_budget: config.time_budget(),
            poll_wait: config.poll_wait(),
            give_up_after: None,
        }
    }

    pub fn with_give_up_after(mut self, limit: Duration) -> Self {
        self.give_up_after = Some(limit);
        self
    }
}

/// Summary of one driven batch
#[derive(Debug, Clone, Serialize)]
pub struct DriveReport {
    pub submitted: usize,
    pub received: usize,
    pub retries: u64,
    #[serde(rename = "elapsed-ms")]
    pub elapsed_ms: u128,
}

/// Run `backlog` through `coordinator`, handing each reply to `on_reply`
///
/// Replies arrive in completion order, not backlog order; the metadata
/// paired with each reply identifies which item it answers.
pub async fn drive<T, M, I, F>(
    coordinator: &mut RequestCoordinator<T, M>,
    backlog: I,
    options: &DriveOptions,
    mut on_reply: F,
) -> Result<DriveReport>
where
    T: Transport,
    T::Payload: Clone,
    I: IntoIterator<Item = (T::Payload, M)>,
    F: FnMut(Envelope<T::Payload>, M),
{
    debug!(routing_key = %options.routing_key, time_budget = ?options.time_budget, poll_wait = ?options.poll_wait, "drive: called");
    let started = Instant::now();
    let retries_before = coordinator.metrics().retries;
    let mut backlog = backlog.into_iter().peekable();
    let mut submitted = 0;
    let mut received = 0;

    loop {
        while coordinator.can_request() {
            let Some((payload, metadata)) = backlog.next() else {
                break;
            };
            coordinator
                .submit(payload, options.routing_key.as_str(), options.time_budget, metadata)
                .await
                .context("Failed to submit request")?;
            submitted += 1;
        }

        for (reply, metadata) in coordinator.poll_ready(options.poll_wait).await {
            on_reply(reply, metadata);
            received += 1;
        }

        if coordinator.all_received() && backlog.peek().is_none() {
            break;
        }

        if let Some(limit) = options.give_up_after
            && started.elapsed() >= limit
        {
            warn!(in_flight = coordinator.in_flight(), ?limit, "Giving up on outstanding requests");
            return Err(eyre!(
                "Gave up after {:?} with {} requests still in flight",
                limit,
                coordinator.in_flight()
            ));
        }
    }

    let report = DriveReport {
        submitted,
        received,
        retries: coordinator.metrics().retries - retries_before,
        elapsed_ms: started.elapsed().as_millis(),
    };
    info!(
        submitted = report.submitted,
        received = report.received,
        retries = report.retries,
        elapsed_ms = report.elapsed_ms,
        "Batch complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryBroker;

    fn options(routing_key: &str) -> DriveOptions {
        DriveOptions {
            routing_key: routing_key.to_string(),
            time_budget: Duration::from_millis(20),
            poll_wait: Duration::from_millis(10),
            give_up_after: None,
        }
    }

    #[tokio::test]
    async fn test_empty_backlog_finishes_immediately() {
        let broker: MemoryBroker<u32> = MemoryBroker::new();
        let mut coordinator: RequestCoordinator<_, u32> = RequestCoordinator::new(broker.channel(), 4, None).unwrap();

        let report = drive(&mut coordinator, Vec::new(), &options("Echo"), |_, _| {})
            .await
            .unwrap();
        assert_eq!(report.submitted, 0);
        assert_eq!(report.received, 0);
    }

    #[tokio::test]
    async fn test_gives_up_on_stalled_remote() {
        let broker: MemoryBroker<u32> = MemoryBroker::new();
        let mut silent = broker.channel();
        silent.subscribe("Echo").unwrap();
        let mut coordinator = RequestCoordinator::new(broker.channel(), 2, None).unwrap();

        let backlog = (0..3u32).map(|i| (i, i));
        let opts = options("Echo").with_give_up_after(Duration::from_millis(60));
        let err = drive(&mut coordinator, backlog, &opts, |_, _| {}).await.unwrap_err();

        assert!(err.to_string().contains("still in flight"));
        assert_eq!(coordinator.in_flight(), 2);
        assert!(coordinator.metrics().retries > 0);
    }

    #[test]
    fn test_options_from_config() {
        let config = CoordinatorConfig {
            time_budget_ms: 250,
            poll_wait_ms: 50,
            ..Default::default()
        };
        let opts = DriveOptions::from_config("GetPosition", &config);
        assert_eq!(opts.routing_key, "GetPosition");
        assert_eq!(opts.time_budget, Duration::from_millis(250));
        assert_eq!(opts.poll_wait, Duration::from_millis(50));
        assert!(opts.give_up_after.is_none());
    }
}
