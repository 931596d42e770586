//! Integration tests for the trigger-to-request pipeline
//!
//! These tests drive whole scenarios end-to-end: triggers in, outcomes out,
//! with scripted fetchers and sinks verifying failure containment, strict
//! sequencing, and teardown semantics.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use virta::{
    ChannelSink, Completion, FailurePolicy, FetchError, Fetcher, OutcomeSink, Pipeline,
    PipelineState, RequestKey, RequestOutcome, SinkError, Trigger, TryKeyFn, VirtaError,
};

// ============================================================================
// Test Fetchers
// ============================================================================

/// Fetcher that succeeds for "food" and fails every other key with a 404
struct ScriptedFetcher {
    fetch_count: AtomicU64,
}

impl ScriptedFetcher {
    fn new() -> Self {
        Self {
            fetch_count: AtomicU64::new(0),
        }
    }

    fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch(&self, key: &RequestKey) -> Result<Bytes, FetchError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if key.as_str() == "food" {
            Ok(Bytes::from(r#"{"dish":"ramen"}"#))
        } else {
            Err(FetchError::Status {
                status: 404,
                body: format!("no such endpoint: {key}"),
            })
        }
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Fetcher that records how many requests are in flight at once
struct OverlapFetcher {
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
}

impl OverlapFetcher {
    fn new() -> Self {
        Self {
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
        }
    }

    fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for OverlapFetcher {
    fn name(&self) -> &'static str {
        "overlap"
    }

    async fn fetch(&self, key: &RequestKey) -> Result<Bytes, FetchError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        // Hold the request open long enough for overlap to show up
        tokio::time::sleep(Duration::from_millis(10)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if key.as_str().starts_with("bad") {
            Err(FetchError::Connection("scripted failure".into()))
        } else {
            Ok(Bytes::from("ok"))
        }
    }

    async fn health(&self) -> bool {
        true
    }
}

/// Fetcher that takes long enough to back the queue up
struct SlowFetcher;

#[async_trait]
impl Fetcher for SlowFetcher {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn fetch(&self, _key: &RequestKey) -> Result<Bytes, FetchError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(Bytes::from("ok"))
    }

    async fn health(&self) -> bool {
        true
    }
}

// ============================================================================
// Test Sinks
// ============================================================================

/// Sink whose every delivery fails
struct FailingSink {
    attempts: AtomicU64,
}

impl FailingSink {
    fn new() -> Self {
        Self {
            attempts: AtomicU64::new(0),
        }
    }

    fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutcomeSink for FailingSink {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn deliver(&self, _outcome: &RequestOutcome) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Deliver("scripted sink failure".into()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn recv_outcome(rx: &mut mpsc::Receiver<RequestOutcome>) -> RequestOutcome {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for outcome")
        .expect("outcome channel closed")
}

async fn recv_completion(rx: &mut mpsc::Receiver<Completion>) -> Completion {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for completion")
        .expect("completion channel closed")
}

fn trigger(key: &str) -> Trigger {
    Trigger::new("test", Bytes::from(key.to_string()))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn scenario_all_success() {
    let (sink, mut outcomes, _completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    let t1 = trigger("food");
    let t2 = trigger("food");
    let (id1, id2) = (t1.id.clone(), t2.id.clone());
    sender.send(t1).await.expect("send");
    sender.send(t2).await.expect("send");

    let first = recv_outcome(&mut outcomes).await;
    let second = recv_outcome(&mut outcomes).await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(first.trigger_id(), id1);
    assert_eq!(second.trigger_id(), id2);
    assert!(subscription.is_active());

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn scenario_failure_then_success() {
    let (sink, mut outcomes, _completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    sender.send(trigger("bogus")).await.expect("send");
    sender.send(trigger("food")).await.expect("send");

    let first = recv_outcome(&mut outcomes).await;
    let second = recv_outcome(&mut outcomes).await;

    assert!(first.is_failure());
    assert!(second.is_success());
    assert_eq!(second.key().map(RequestKey::as_str), Some("food"));

    // The failure did not take the pipeline down
    assert!(subscription.is_active());

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn scenario_repeated_failures_never_terminate() {
    let (sink, mut outcomes, _completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    for key in ["bogus", "bogus", "food"] {
        sender.send(trigger(key)).await.expect("send");
    }

    let first = recv_outcome(&mut outcomes).await;
    let second = recv_outcome(&mut outcomes).await;
    let third = recv_outcome(&mut outcomes).await;

    assert!(first.is_failure());
    assert!(second.is_failure());
    assert!(third.is_success());
    assert!(subscription.is_active());

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn outcomes_arrive_in_trigger_order_one_at_a_time() {
    let fetcher = Arc::new(OverlapFetcher::new());
    let (sink, mut outcomes, _completions) = ChannelSink::new(32);
    let (sender, subscription) = Pipeline::new()
        .fetcher_arc(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .sink(sink)
        .start()
        .expect("pipeline should start");

    let mut expected_ids = Vec::new();
    for i in 0..10 {
        let key = if i % 3 == 0 { "bad" } else { "good" };
        let t = trigger(key);
        expected_ids.push(t.id.clone());
        sender.send(t).await.expect("send");
    }

    for expected in &expected_ids {
        let outcome = recv_outcome(&mut outcomes).await;
        assert_eq!(outcome.trigger_id(), expected);
    }

    // Strict sequencing: never more than one request in flight
    assert_eq!(fetcher.max_in_flight(), 1);

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn failure_does_not_drop_the_next_trigger() {
    let (sink, mut outcomes, _completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    sender.send(trigger("bogus")).await.expect("send");
    let failure = recv_outcome(&mut outcomes).await;
    assert!(failure.is_failure());

    // One more trigger after the failure must still produce an outcome
    sender.send(trigger("food")).await.expect("send");
    let success = recv_outcome(&mut outcomes).await;
    assert!(success.is_success());

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn unsubscribe_stops_delivery_and_reports_teardown() {
    let (sink, mut outcomes, mut completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    sender.send(trigger("bogus")).await.expect("send");
    sender.send(trigger("food")).await.expect("send");
    assert!(recv_outcome(&mut outcomes).await.is_failure());
    assert!(recv_outcome(&mut outcomes).await.is_success());

    subscription.unsubscribe().await.expect("unsubscribe");

    // Exactly one real completion, and it is the teardown
    let completion = recv_completion(&mut completions).await;
    assert!(completion.is_teardown());

    // Triggers after teardown are rejected at the sender
    let err = sender.send(trigger("food")).await.unwrap_err();
    assert!(matches!(err, VirtaError::Terminated));

    // No further outcomes: the runner is gone and the channel is closed
    assert!(outcomes.recv().await.is_none());
}

#[tokio::test]
async fn mask_policy_emits_false_completion_markers() {
    let (sink, mut outcomes, mut completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .policy(FailurePolicy::MaskAsCompletion)
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    for key in ["bogus", "bogus", "food"] {
        sender.send(trigger(key)).await.expect("send");
    }

    // Masked failures surface on the completion channel, not as outcomes
    let first = recv_completion(&mut completions).await;
    let second = recv_completion(&mut completions).await;
    assert!(matches!(first, Completion::MaskedFailure { .. }));
    assert!(matches!(second, Completion::MaskedFailure { .. }));

    // The only outcome is the success; the markers were false completions
    let outcome = recv_outcome(&mut outcomes).await;
    assert!(outcome.is_success());
    assert!(subscription.is_active());

    subscription.unsubscribe().await.expect("unsubscribe");
    let teardown = recv_completion(&mut completions).await;
    assert!(teardown.is_teardown());
}

#[tokio::test]
async fn failing_sink_does_not_terminate_the_pipeline() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let sink = Arc::new(FailingSink::new());
    let (sender, subscription) = Pipeline::new()
        .fetcher_arc(Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        .sink_arc(Arc::clone(&sink) as Arc<dyn OutcomeSink>)
        .start()
        .expect("pipeline should start");

    sender.send(trigger("food")).await.expect("send");
    sender.send(trigger("food")).await.expect("send");

    // Wait until both triggers were fetched and both deliveries attempted
    for _ in 0..50 {
        if sink.attempts() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(fetcher.fetch_count(), 2);
    assert_eq!(sink.attempts(), 2);
    assert!(subscription.is_active());

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn derive_error_becomes_failure_outcome() {
    let (sink, mut outcomes, _completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .key_derive(TryKeyFn::new(|t: &Trigger| {
            match t.payload_str().map(str::trim) {
                Some(text) if !text.is_empty() => Ok(RequestKey::new(text)),
                _ => Err(FetchError::Derive("no endpoint in payload".into())),
            }
        }))
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    sender.send(trigger("")).await.expect("send");
    sender.send(trigger("food")).await.expect("send");

    let failure = recv_outcome(&mut outcomes).await;
    assert!(failure.is_failure());
    // Derivation failed before any key existed
    assert!(failure.key().is_none());

    let success = recv_outcome(&mut outcomes).await;
    assert!(success.is_success());

    subscription.unsubscribe().await.expect("unsubscribe");
}

#[tokio::test]
async fn dropping_all_senders_drains_then_tears_down() {
    let (sink, mut outcomes, mut completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .fetcher(ScriptedFetcher::new())
        .sink(sink)
        .start()
        .expect("pipeline should start");

    sender.send(trigger("food")).await.expect("send");
    sender.send(trigger("bogus")).await.expect("send");
    drop(sender);

    // Queued triggers are still processed before teardown
    assert!(recv_outcome(&mut outcomes).await.is_success());
    assert!(recv_outcome(&mut outcomes).await.is_failure());

    let completion = recv_completion(&mut completions).await;
    assert!(completion.is_teardown());
    assert_eq!(subscription.state(), PipelineState::Terminated);
}

#[tokio::test]
async fn try_send_reports_queue_full() {
    let (sink, _outcomes, _completions) = ChannelSink::new(16);
    let (sender, subscription) = Pipeline::new()
        .queue_capacity(1)
        .fetcher(SlowFetcher)
        .sink(sink)
        .start()
        .expect("pipeline should start");

    // First trigger gets dequeued into the in-flight slot
    sender.send(trigger("a")).await.expect("send");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second fills the single queue slot
    sender.send(trigger("b")).await.expect("send");

    // Third has nowhere to go without blocking
    let err = sender.try_send(trigger("c")).unwrap_err();
    assert!(matches!(err, VirtaError::QueueFull { capacity: 1 }));

    subscription.unsubscribe().await.expect("unsubscribe");
}
