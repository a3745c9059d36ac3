//! Request coordinator
//!
//! Turns a publish/subscribe transport into request/reply with:
//! - **Correlation:** replies are matched to requests by correlation id
//! - **Admission window:** at most `max` requests in flight, reopening at `min`
//! - **Retry:** requests past their deadline are reissued under a new id

mod config;
mod core;
mod error;
mod metrics;
mod pending;

pub use config::CoordinatorConfig;
pub use core::{Admission, RequestCoordinator};
pub use error::CoordinatorError;
pub use metrics::CoordinatorMetrics;
pub use pending::{PendingRequest, PendingTable};
