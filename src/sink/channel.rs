//! Channel sink
//!
//! Forwards outcomes and completion markers into tokio mpsc channels so
//! library consumers can await them as a stream. This is the sink the
//! integration tests drive scenarios through.

use crate::error::SinkError;
use crate::outcome::{Completion, RequestOutcome};
use crate::sink::OutcomeSink;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sink that forwards outcomes and completions into channels
///
/// # Example
///
/// ```ignore
/// let (sink, mut outcomes, mut completions) = ChannelSink::new(64);
/// let (sender, subscription) = Pipeline::new()
///     .fetcher(fetcher)
///     .sink(sink)
///     .start()?;
///
/// while let Some(outcome) = outcomes.recv().await {
///     // react to Success / Failure
/// }
/// ```
pub struct ChannelSink {
    outcomes: mpsc::Sender<RequestOutcome>,
    completions: mpsc::Sender<Completion>,
}

impl ChannelSink {
    /// Create a channel sink along with its receivers
    pub fn new(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<RequestOutcome>,
        mpsc::Receiver<Completion>,
    ) {
        let (outcome_tx, outcome_rx) = mpsc::channel(capacity);
        let (completion_tx, completion_rx) = mpsc::channel(capacity);

        (
            Self {
                outcomes: outcome_tx,
                completions: completion_tx,
            },
            outcome_rx,
            completion_rx,
        )
    }
}

#[async_trait]
impl OutcomeSink for ChannelSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn deliver(&self, outcome: &RequestOutcome) -> Result<(), SinkError> {
        self.outcomes
            .send(outcome.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }

    async fn completed(&self, completion: &Completion) -> Result<(), SinkError> {
        self.completions
            .send(completion.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }
}
