//! VIRTA - Resilient Trigger-to-Request Pipeline
//!
//! Converts discrete trigger events into strictly sequential asynchronous
//! requests. Each request's failure is contained at the request boundary and
//! surfaced as data, so one bad request never disables the pipeline.
//!
//! # Architecture
//!
//! ```text
//! TriggerSender ──► queue ──► PipelineRunner ──► Fetcher ──► OutcomeSink
//!                              (one request in flight at a time)
//! ```
//!
//! The key-derivation step, the fetcher, and the sink are all pluggable via
//! traits.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod config;
pub mod error;
pub mod failure_log;
pub mod fetch;
pub mod key;
pub mod metrics;
pub mod metrics_server;
pub mod outcome;
pub mod pipeline;
pub mod sink;
pub mod trigger;

pub use config::Config;
pub use error::{FetchError, Result, SinkError, VirtaError};
pub use failure_log::{FailedFetch, FailureLog};
pub use fetch::{Fetcher, HttpFetcher};
pub use key::{KeyDerive, KeyFn, PayloadKey, RequestKey, TryKeyFn};
pub use outcome::{Completion, FetchFailure, FetchSuccess, PipelineState, RequestOutcome};
pub use pipeline::{FailurePolicy, Pipeline, PipelineRunner, Subscription, TriggerSender};
pub use sink::{ChannelSink, OutcomeSink, StdoutSink};
pub use trigger::Trigger;
