//! Trigger type for VIRTA
//!
//! A Trigger is the discrete event that initiates one unit of work. The
//! pipeline only cares that it happened; the key-derivation seam projects a
//! request key out of it (usually from the payload).
//!
//! Payloads use `Bytes`, so cloning a trigger is a refcount bump, not a copy.

use bytes::Bytes;
use std::collections::HashMap;

/// A discrete event that initiates one request
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use virta::trigger::Trigger;
///
/// let trigger = Trigger::new("fetch-button", Bytes::from("food"));
/// assert_eq!(trigger.source, "fetch-button");
/// assert_eq!(trigger.payload_str(), Some("food"));
/// ```
#[derive(Debug, Clone)]
pub struct Trigger {
    /// Unique identifier (ULID by default)
    pub id: String,

    /// Unix timestamp in nanoseconds
    pub timestamp: i64,

    /// Origin identifier (e.g., "stdin", "fetch-button", "timer")
    pub source: String,

    /// Headers and context carried alongside the event
    pub metadata: HashMap<String, String>,

    /// Opaque payload - the key-derivation seam decides what to make of it
    pub payload: Bytes,
}

impl Trigger {
    /// Create a new Trigger with auto-generated ID and current timestamp
    pub fn new(source: impl Into<String>, payload: Bytes) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            timestamp: chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            source: source.into(),
            metadata: HashMap::new(),
            payload,
        }
    }

    /// Create a Trigger with all fields specified
    pub fn with_id(
        id: impl Into<String>,
        timestamp: i64,
        source: impl Into<String>,
        payload: Bytes,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            source: source.into(),
            metadata: HashMap::new(),
            payload,
        }
    }

    /// Add metadata to the trigger
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Get payload as a string slice (if valid UTF-8)
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Get payload length in bytes
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}
