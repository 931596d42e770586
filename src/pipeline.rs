//! Pipeline - the resilient trigger-to-request loop
//!
//! The Pipeline provides a builder pattern for wiring a trigger source to a
//! fetcher and a sink. Triggers are processed strictly one at a time, in
//! arrival order: derive key, issue request, await settlement, deliver the
//! outcome. A failed request becomes a `Failure` outcome (or a masked
//! completion marker) and the loop moves on - it never terminates the
//! pipeline. Only `Subscription::unsubscribe`, or dropping every sender,
//! tears it down.
//!
//! # Example
//!
//! ```ignore
//! use virta::{HttpFetcher, Pipeline, StdoutSink, Trigger};
//!
//! let fetcher = HttpFetcher::new("https://random-data-api.com/api/{key}/random_{key}")?;
//! let (sender, subscription) = Pipeline::new()
//!     .fetcher(fetcher)
//!     .sink(StdoutSink::pretty())
//!     .start()?;
//!
//! sender.send(Trigger::new("demo", Bytes::from("food"))).await?;
//! // ... later
//! subscription.unsubscribe().await?;
//! ```

use crate::error::{FetchError, Result, VirtaError};
use crate::failure_log::{FailedFetch, FailureLog};
use crate::fetch::Fetcher;
use crate::key::{KeyDerive, PayloadKey, RequestKey};
use crate::metrics;
use crate::outcome::{Completion, FetchFailure, FetchSuccess, PipelineState, RequestOutcome};
use crate::sink::OutcomeSink;
use crate::trigger::Trigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What to do with a request failure
///
/// Neither variant lets the failure reach the pipeline's own termination
/// path; they differ only in what the sink observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Convert the failure into a `RequestOutcome::Failure` delivered on the
    /// same channel as successes. The sink sees a tagged union and no
    /// completion signal of any kind. This is the default.
    #[default]
    EmitOutcome,

    /// Swallow the failure and deliver a `Completion::MaskedFailure` marker
    /// instead of an outcome. The marker is a *false* completion: the
    /// pipeline stays Active and keeps consuming triggers. Observers that
    /// treat it as termination will wrongly conclude the pipeline is dead -
    /// prefer `EmitOutcome` unless the observer genuinely wants failures
    /// hidden from the outcome channel.
    MaskAsCompletion,
}

/// Shared lifecycle flag between the runner and the subscription
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicBool);

impl StateCell {
    fn terminate(&self) {
        self.0.store(true, Ordering::Release);
    }

    fn get(&self) -> PipelineState {
        if self.0.load(Ordering::Acquire) {
            PipelineState::Terminated
        } else {
            PipelineState::Active
        }
    }
}

/// Builder for the trigger-to-request pipeline
pub struct Pipeline {
    /// Pending-trigger queue capacity
    queue_capacity: usize,
    /// Failure containment strategy
    policy: FailurePolicy,
    /// Key derivation seam
    key_derive: Box<dyn KeyDerive>,
    /// Request-issuing seam
    fetcher: Option<Arc<dyn Fetcher>>,
    /// Downstream observer seam
    sink: Option<Arc<dyn OutcomeSink>>,
    /// Optional ring of recent failures for inspection
    failure_log: Option<Arc<FailureLog>>,
}

impl Pipeline {
    /// Create a new Pipeline with default settings
    ///
    /// Defaults: queue capacity 1024, `FailurePolicy::EmitOutcome`, and
    /// `PayloadKey` derivation (UTF-8 payload is the key).
    pub fn new() -> Self {
        Self {
            queue_capacity: 1024,
            policy: FailurePolicy::default(),
            key_derive: Box::new(PayloadKey),
            fetcher: None,
            sink: None,
            failure_log: None,
        }
    }

    /// Set the pending-trigger queue capacity
    ///
    /// Triggers beyond this wait at the sender (`send` suspends,
    /// `try_send` fails) - back-pressure, not loss.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the failure containment policy
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the key derivation
    pub fn key_derive<K: KeyDerive + 'static>(mut self, derive: K) -> Self {
        self.key_derive = Box::new(derive);
        self
    }

    /// Set the fetcher (required)
    pub fn fetcher<F: Fetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Set the fetcher (Arc version)
    pub fn fetcher_arc(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the sink (required)
    pub fn sink<S: OutcomeSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Set the sink (Arc version)
    pub fn sink_arc(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach a failure log capturing recent failed requests
    pub fn failure_log(mut self, log: Arc<FailureLog>) -> Self {
        self.failure_log = Some(log);
        self
    }

    /// Build the sender and runner without spawning
    ///
    /// The runner processes triggers until every sender is dropped and the
    /// queue drains. Use `start` to also get a `Subscription` handle with
    /// explicit unsubscribe.
    ///
    /// # Errors
    /// `VirtaError::Config` if the fetcher or sink is missing.
    pub fn build(self) -> Result<(TriggerSender, PipelineRunner)> {
        let fetcher = self
            .fetcher
            .ok_or_else(|| VirtaError::Config("a fetcher is required".to_string()))?;
        let sink = self
            .sink
            .ok_or_else(|| VirtaError::Config("a sink is required".to_string()))?;

        let (tx, rx) = mpsc::channel(self.queue_capacity);

        let sender = TriggerSender {
            tx,
            capacity: self.queue_capacity,
        };

        let runner = PipelineRunner {
            rx,
            key_derive: self.key_derive,
            fetcher,
            sink,
            policy: self.policy,
            failure_log: self.failure_log,
            state: Arc::new(StateCell::default()),
            stop_rx: None,
        };

        Ok((sender, runner))
    }

    /// Build and spawn the pipeline, returning the sender and a subscription
    ///
    /// # Errors
    /// `VirtaError::Config` if the fetcher or sink is missing.
    pub fn start(self) -> Result<(TriggerSender, Subscription)> {
        let (sender, mut runner) = self.build()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        runner.stop_rx = Some(stop_rx);
        let state = Arc::clone(&runner.state);

        let handle = tokio::spawn(runner.run());

        Ok((
            sender,
            Subscription {
                stop_tx,
                state,
                handle,
            },
        ))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Trigger sender for pushing events into the pipeline
///
/// Cloneable; any event emitter (UI handler, timer task, message consumer)
/// pushes triggers through it. The bounded channel behind it is the ordered
/// pending-trigger queue.
#[derive(Clone, Debug)]
pub struct TriggerSender {
    tx: mpsc::Sender<Trigger>,
    capacity: usize,
}

impl TriggerSender {
    /// Send a trigger into the pipeline, waiting for queue space
    ///
    /// # Errors
    /// `VirtaError::Terminated` if the pipeline has been torn down.
    pub async fn send(&self, trigger: Trigger) -> Result<()> {
        self.tx
            .send(trigger)
            .await
            .map_err(|_| VirtaError::Terminated)
    }

    /// Try to send a trigger without blocking
    ///
    /// # Errors
    /// `VirtaError::QueueFull` if the queue is at capacity,
    /// `VirtaError::Terminated` if the pipeline has been torn down.
    pub fn try_send(&self, trigger: Trigger) -> Result<()> {
        self.tx.try_send(trigger).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => VirtaError::QueueFull {
                capacity: self.capacity,
            },
            mpsc::error::TrySendError::Closed(_) => VirtaError::Terminated,
        })
    }
}

/// Handle to a started pipeline
///
/// Holds the only path to termination. Dropping the subscription without
/// calling `unsubscribe` also tears the pipeline down: the runner observes
/// the closed stop channel.
pub struct Subscription {
    stop_tx: watch::Sender<bool>,
    state: Arc<StateCell>,
    handle: JoinHandle<Result<()>>,
}

impl Subscription {
    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    /// True while the pipeline is accepting and processing triggers
    pub fn is_active(&self) -> bool {
        self.state.get() == PipelineState::Active
    }

    /// Tear the pipeline down
    ///
    /// Any request in flight is abandoned; no further outcomes are
    /// delivered. The sink receives `Completion::Teardown` exactly once.
    pub async fn unsubscribe(self) -> Result<()> {
        let _ = self.stop_tx.send(true);
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(VirtaError::Runtime(e.to_string())),
        }
    }
}

/// Pipeline runner - processes triggers until teardown
pub struct PipelineRunner {
    rx: mpsc::Receiver<Trigger>,
    key_derive: Box<dyn KeyDerive>,
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn OutcomeSink>,
    policy: FailurePolicy,
    failure_log: Option<Arc<FailureLog>>,
    state: Arc<StateCell>,
    stop_rx: Option<watch::Receiver<bool>>,
}

impl std::fmt::Debug for PipelineRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRunner")
            .field("policy", &self.policy)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PipelineRunner {
    /// Run the pipeline, processing triggers until teardown
    ///
    /// For each trigger, in arrival order:
    /// 1. Derive the request key
    /// 2. Issue the request and await settlement
    /// 3. Deliver the outcome (failures contained per policy)
    ///
    /// The loop ends when the stop channel fires (unsubscribe or dropped
    /// subscription) or when every sender is dropped and the queue drains.
    /// Request failures never end it.
    pub async fn run(mut self) -> Result<()> {
        info!(
            fetcher = self.fetcher.name(),
            sink = self.sink.name(),
            key_derive = self.key_derive.name(),
            policy = ?self.policy,
            "Pipeline started"
        );
        metrics::try_set_active(true);

        let mut stop_rx = self.stop_rx.take();

        loop {
            let trigger = match &mut stop_rx {
                Some(stop) => {
                    tokio::select! {
                        biased;
                        _ = stop.changed() => {
                            debug!("Unsubscribe requested");
                            break;
                        }
                        maybe = self.rx.recv() => match maybe {
                            Some(trigger) => trigger,
                            None => break,
                        },
                    }
                }
                None => match self.rx.recv().await {
                    Some(trigger) => trigger,
                    None => break,
                },
            };

            if !self.process(trigger, stop_rx.as_mut()).await {
                break;
            }
        }

        self.state.terminate();
        metrics::try_set_active(false);

        if let Err(e) = self.sink.completed(&Completion::Teardown).await {
            error!(sink = self.sink.name(), error = %e, "Failed to deliver teardown completion");
        }
        if let Err(e) = self.fetcher.shutdown().await {
            warn!(fetcher = self.fetcher.name(), error = %e, "Fetcher shutdown error");
        }
        if let Err(e) = self.sink.shutdown().await {
            warn!(sink = self.sink.name(), error = %e, "Sink shutdown error");
        }

        info!("Pipeline shutdown");
        Ok(())
    }

    /// Process one trigger to settlement
    ///
    /// Returns `false` only when an unsubscribe arrived with the request in
    /// flight; the request is abandoned and no outcome is delivered.
    async fn process(
        &self,
        trigger: Trigger,
        stop: Option<&mut watch::Receiver<bool>>,
    ) -> bool {
        metrics::try_record_trigger(&trigger.source);
        debug!(id = %trigger.id, source = %trigger.source, "Trigger received");

        let key = match self.key_derive.derive(&trigger) {
            Ok(key) => key,
            Err(error) => {
                self.contain_failure(&trigger.id, None, error).await;
                return true;
            }
        };

        let started = Instant::now();
        let result = match stop {
            Some(stop) => {
                tokio::select! {
                    biased;
                    _ = stop.changed() => {
                        debug!(id = %trigger.id, key = %key, "Unsubscribed with request in flight, abandoning");
                        return false;
                    }
                    result = self.fetcher.fetch(&key) => result,
                }
            }
            None => self.fetcher.fetch(&key).await,
        };
        let elapsed = started.elapsed();
        metrics::try_record_latency(self.fetcher.name(), elapsed.as_secs_f64());

        match result {
            Ok(body) => {
                debug!(id = %trigger.id, key = %key, bytes = body.len(), "Request settled");
                metrics::try_record_outcome("success");
                self.deliver(RequestOutcome::Success(FetchSuccess {
                    trigger_id: trigger.id,
                    key,
                    body,
                    elapsed,
                }))
                .await;
            }
            Err(error) => {
                self.contain_failure(&trigger.id, Some(key), error).await;
            }
        }

        true
    }

    /// Contain one request failure per the configured policy
    ///
    /// This is the per-request boundary: the error turns into data (an
    /// outcome or a marker) and never reaches the runner's return path.
    async fn contain_failure(
        &self,
        trigger_id: &str,
        key: Option<RequestKey>,
        error: FetchError,
    ) {
        warn!(
            trigger = %trigger_id,
            key = ?key.as_ref().map(RequestKey::as_str),
            error = %error,
            "Request failed, pipeline stays active"
        );

        if let Some(log) = &self.failure_log {
            log.record(FailedFetch {
                trigger_id: trigger_id.to_string(),
                key: key.clone(),
                error: error.to_string(),
                failed_at: Instant::now(),
            });
        }

        match self.policy {
            FailurePolicy::EmitOutcome => {
                metrics::try_record_outcome("failure");
                self.deliver(RequestOutcome::Failure(FetchFailure {
                    trigger_id: trigger_id.to_string(),
                    key,
                    error,
                }))
                .await;
            }
            FailurePolicy::MaskAsCompletion => {
                metrics::try_record_outcome("masked");
                let marker = Completion::MaskedFailure {
                    trigger_id: trigger_id.to_string(),
                };
                if let Err(e) = self.sink.completed(&marker).await {
                    error!(sink = self.sink.name(), error = %e, "Failed to deliver completion marker");
                    metrics::try_record_sink_error(self.sink.name());
                }
            }
        }
    }

    /// Deliver one outcome; sink errors are logged, never fatal
    async fn deliver(&self, outcome: RequestOutcome) {
        if let Err(e) = self.sink.deliver(&outcome).await {
            error!(
                sink = self.sink.name(),
                trigger = %outcome.trigger_id(),
                error = %e,
                "Failed to deliver outcome"
            );
            metrics::try_record_sink_error(self.sink.name());
        } else {
            debug!(
                sink = self.sink.name(),
                trigger = %outcome.trigger_id(),
                "Outcome delivered"
            );
        }
    }
}
