//! reqcoord - Flow-controlled request/reply over publish/subscribe
//!
//! A [`RequestCoordinator`] gives callers RPC-like semantics on top of a
//! publish/subscribe [`Transport`]: submit a request, eventually get exactly
//! one matching reply back, with retry on timeout and a bounded number of
//! requests in flight.
//!
//! # Core Concepts
//!
//! - **Correlation**: every request envelope gets a fresh id; replies carry it back
//! - **Admission window**: submission stops at `max` in flight and resumes at `min`
//! - **Retry on timeout**: a request past its deadline is reissued under a new id
//! - **Caller-driven**: no background tasks; the caller alternates submit and poll
//!
//! # Modules
//!
//! - [`coordinator`] - Request coordinator, pending table, configuration
//! - [`envelope`] - Envelope, correlation id and reply address types
//! - [`transport`] - Transport trait and in-process broker
//! - [`service`] - Service provider for the remote side
//! - [`driver`] - Batch submit/poll loop
//! - [`demo`] - In-process position service demo
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//!
//! [`RequestCoordinator`]: coordinator::RequestCoordinator
//! [`Transport`]: transport::Transport

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod demo;
pub mod driver;
pub mod envelope;
pub mod service;
pub mod transport;
