//! Sink system for VIRTA
//!
//! A sink is the downstream observer. It receives exactly one outcome per
//! trigger - failures arrive as data on the same channel as successes - and
//! a completion notification only on explicit teardown (or the documented
//! false-completion marker under the mask policy).
//!
//! A sink delivery error is logged by the runner and the pipeline keeps
//! going; the observer cannot terminate the pipeline either.

pub mod channel;
pub mod stdout;

use crate::error::SinkError;
use crate::outcome::{Completion, RequestOutcome};
use async_trait::async_trait;

pub use channel::ChannelSink;
pub use stdout::StdoutSink;

/// Sink trait - receives outcomes and completion notifications
///
/// # Example
///
/// ```ignore
/// struct AlertingSink {
///     client: PagerClient,
/// }
///
/// #[async_trait]
/// impl OutcomeSink for AlertingSink {
///     fn name(&self) -> &'static str { "alerting" }
///
///     async fn deliver(&self, outcome: &RequestOutcome) -> Result<(), SinkError> {
///         if let RequestOutcome::Failure(f) = outcome {
///             self.client.page(&f.error.to_string()).await?;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Sink name for identification and logging
    fn name(&self) -> &'static str;

    /// Deliver one outcome
    ///
    /// Invoked exactly once per trigger, in trigger arrival order, after the
    /// corresponding request settles.
    async fn deliver(&self, outcome: &RequestOutcome) -> Result<(), SinkError>;

    /// Completion notification
    ///
    /// `Completion::Teardown` arrives exactly once, on explicit teardown.
    /// `Completion::MaskedFailure` arrives per masked failure when the
    /// pipeline runs under `FailurePolicy::MaskAsCompletion` - the pipeline
    /// is still Active in that case.
    async fn completed(&self, _completion: &Completion) -> Result<(), SinkError> {
        Ok(())
    }

    /// Graceful shutdown
    ///
    /// Called after the teardown completion to flush buffers, close
    /// connections, etc.
    async fn shutdown(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
