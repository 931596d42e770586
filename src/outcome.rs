//! Outcome types for VIRTA
//!
//! Every trigger produces exactly one `RequestOutcome` after its request
//! settles. Failures flow through the same channel as successes, tagged, so
//! the observer can react to them without the pipeline ever terminating.

use crate::error::FetchError;
use crate::key::RequestKey;
use bytes::Bytes;
use std::time::Duration;

/// Tagged result of one request attempt
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// The request settled successfully
    Success(FetchSuccess),
    /// The request failed; contained at the request boundary
    Failure(FetchFailure),
}

impl RequestOutcome {
    /// The id of the trigger this outcome answers
    pub fn trigger_id(&self) -> &str {
        match self {
            RequestOutcome::Success(s) => &s.trigger_id,
            RequestOutcome::Failure(f) => &f.trigger_id,
        }
    }

    /// The request key, if one was derived before the failure
    pub fn key(&self) -> Option<&RequestKey> {
        match self {
            RequestOutcome::Success(s) => Some(&s.key),
            RequestOutcome::Failure(f) => f.key.as_ref(),
        }
    }

    /// True for `Success`
    pub fn is_success(&self) -> bool {
        matches!(self, RequestOutcome::Success(_))
    }

    /// True for `Failure`
    pub fn is_failure(&self) -> bool {
        matches!(self, RequestOutcome::Failure(_))
    }
}

/// A settled, successful request
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    /// Trigger that initiated the request
    pub trigger_id: String,
    /// Key the request was issued for
    pub key: RequestKey,
    /// Response body
    pub body: Bytes,
    /// Time from issue to settlement
    pub elapsed: Duration,
}

/// A settled, failed request
#[derive(Debug, Clone)]
pub struct FetchFailure {
    /// Trigger that initiated the request
    pub trigger_id: String,
    /// Key the request was issued for; `None` if derivation itself failed
    pub key: Option<RequestKey>,
    /// What went wrong
    pub error: FetchError,
}

/// Pipeline lifecycle state
///
/// Starts `Active`. Becomes `Terminated` only through explicit teardown
/// (unsubscribing, or dropping every sender) - never because a request
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Accepting and processing triggers
    Active,
    /// Torn down; no further outcomes will be delivered
    Terminated,
}

/// Completion marker delivered to the sink's completion channel
#[derive(Debug, Clone)]
pub enum Completion {
    /// Real completion: the caller tore the pipeline down
    Teardown,
    /// False completion: a failure was masked under
    /// `FailurePolicy::MaskAsCompletion`. The pipeline is still Active;
    /// observers must not treat this as termination.
    MaskedFailure {
        /// Trigger whose request failed
        trigger_id: String,
    },
}

impl Completion {
    /// True only for the real, caller-initiated completion
    pub fn is_teardown(&self) -> bool {
        matches!(self, Completion::Teardown)
    }
}
