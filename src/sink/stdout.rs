//! Stdout sink for debugging
//!
//! Prints outcomes to stdout in a human-readable format, or as JSON lines
//! (response bodies base64-encoded). Useful for development and the demo
//! binary.

use crate::error::SinkError;
use crate::outcome::{Completion, RequestOutcome};
use crate::sink::OutcomeSink;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome serialized as a JSON line
#[derive(Serialize)]
struct OutcomeJson<'a> {
    trigger_id: &'a str,
    key: Option<&'a str>,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_base64_bytes")]
    body: Option<&'a [u8]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
}

/// Base64 encoding for binary response bodies
mod opt_base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::Serializer;

    pub fn serialize<S>(bytes: &Option<&[u8]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_str(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }
}

impl<'a> From<&'a RequestOutcome> for OutcomeJson<'a> {
    fn from(outcome: &'a RequestOutcome) -> Self {
        match outcome {
            RequestOutcome::Success(s) => Self {
                trigger_id: &s.trigger_id,
                key: Some(s.key.as_str()),
                status: "success",
                body: Some(s.body.as_ref()),
                error: None,
                elapsed_ms: Some(s.elapsed.as_millis()),
            },
            RequestOutcome::Failure(f) => Self {
                trigger_id: &f.trigger_id,
                key: f.key.as_ref().map(|k| k.as_str()),
                status: "failure",
                body: None,
                error: Some(f.error.to_string()),
                elapsed_ms: None,
            },
        }
    }
}

/// Stdout sink - prints outcomes for debugging
pub struct StdoutSink {
    /// Pretty print instead of JSON lines
    pretty: bool,
    /// Count of outcomes delivered
    delivered_count: AtomicU64,
}

impl StdoutSink {
    /// Create a new StdoutSink emitting JSON lines
    pub fn new() -> Self {
        Self {
            pretty: false,
            delivered_count: AtomicU64::new(0),
        }
    }

    /// Create a new StdoutSink with pretty printing
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            delivered_count: AtomicU64::new(0),
        }
    }

    /// Get total outcomes delivered
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutcomeSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    async fn deliver(&self, outcome: &RequestOutcome) -> Result<(), SinkError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();

        if self.pretty {
            match outcome {
                RequestOutcome::Success(s) => {
                    writeln!(
                        stdout,
                        "┌─ Outcome ───────────────────────────────────────────"
                    )
                    .ok();
                    writeln!(stdout, "│ Trigger:  {}", s.trigger_id).ok();
                    writeln!(stdout, "│ Key:      {}", s.key).ok();
                    writeln!(stdout, "│ Status:   success ({:?})", s.elapsed).ok();
                    match std::str::from_utf8(&s.body) {
                        Ok(text) => writeln!(stdout, "│ Body:     {text}").ok(),
                        Err(_) => writeln!(stdout, "│ Body:     {} bytes", s.body.len()).ok(),
                    };
                    writeln!(
                        stdout,
                        "└─────────────────────────────────────────────────────"
                    )
                    .ok();
                }
                RequestOutcome::Failure(f) => {
                    writeln!(
                        stdout,
                        "┌─ Outcome ───────────────────────────────────────────"
                    )
                    .ok();
                    writeln!(stdout, "│ Trigger:  {}", f.trigger_id).ok();
                    if let Some(key) = &f.key {
                        writeln!(stdout, "│ Key:      {key}").ok();
                    }
                    writeln!(stdout, "│ Status:   failure").ok();
                    writeln!(stdout, "│ Error:    {}", f.error).ok();
                    writeln!(
                        stdout,
                        "└─────────────────────────────────────────────────────"
                    )
                    .ok();
                }
            }
        } else {
            let json = OutcomeJson::from(outcome);
            match serde_json::to_string(&json) {
                Ok(line) => {
                    writeln!(stdout, "{line}").ok();
                }
                Err(e) => return Err(SinkError::Deliver(format!("JSON encoding: {e}"))),
            }
        }

        self.delivered_count.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    async fn completed(&self, completion: &Completion) -> Result<(), SinkError> {
        use std::io::Write;

        let mut stdout = std::io::stdout().lock();
        match completion {
            Completion::Teardown => {
                writeln!(stdout, "pipeline completed (teardown)").ok();
            }
            Completion::MaskedFailure { trigger_id } => {
                writeln!(
                    stdout,
                    "pipeline completion marker (masked failure for trigger {trigger_id}) - still active"
                )
                .ok();
            }
        }
        Ok(())
    }
}
