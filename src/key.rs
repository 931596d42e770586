//! Key derivation for VIRTA
//!
//! The key-derivation seam turns a Trigger into the RequestKey the fetcher
//! consumes. Derivation is synchronous and expected to be pure. A derivation
//! error is contained the same way a request failure is: it becomes a
//! `Failure` outcome and the pipeline keeps running.

use crate::error::FetchError;
use crate::trigger::Trigger;
use std::fmt;

/// The value a request is built from (e.g., an endpoint identifier)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Create a new key
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// View the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RequestKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Key derivation trait - projects a RequestKey out of a Trigger
///
/// # Return Value
///
/// - `Ok(key)` - issue a request for this key
/// - `Err(e)` - contained as a `Failure` outcome; never ends the pipeline
pub trait KeyDerive: Send + Sync {
    /// Derivation name for identification and logging
    fn name(&self) -> &'static str;

    /// Derive the request key from a trigger
    fn derive(&self, trigger: &Trigger) -> Result<RequestKey, FetchError>;
}

/// Default derivation: the trigger payload, interpreted as UTF-8, is the key
///
/// This is the "read the input field at click time" projection: whatever the
/// event source captured into the payload becomes the endpoint identifier.
pub struct PayloadKey;

impl KeyDerive for PayloadKey {
    fn name(&self) -> &'static str {
        "payload"
    }

    fn derive(&self, trigger: &Trigger) -> Result<RequestKey, FetchError> {
        let text = trigger
            .payload_str()
            .ok_or_else(|| FetchError::Derive("payload is not valid UTF-8".to_string()))?;
        let text = text.trim();
        if text.is_empty() {
            return Err(FetchError::Derive("payload is empty".to_string()));
        }
        Ok(RequestKey::new(text))
    }
}

/// Derivation from an infallible closure
///
/// # Example
///
/// ```ignore
/// let derive = KeyFn::new(|trigger| RequestKey::new(trigger.source.clone()));
/// ```
pub struct KeyFn<F>
where
    F: Fn(&Trigger) -> RequestKey + Send + Sync,
{
    derive_fn: F,
}

impl<F> KeyFn<F>
where
    F: Fn(&Trigger) -> RequestKey + Send + Sync,
{
    /// Create a derivation from the given closure
    pub fn new(derive_fn: F) -> Self {
        Self { derive_fn }
    }
}

impl<F> KeyDerive for KeyFn<F>
where
    F: Fn(&Trigger) -> RequestKey + Send + Sync,
{
    fn name(&self) -> &'static str {
        "key_fn"
    }

    fn derive(&self, trigger: &Trigger) -> Result<RequestKey, FetchError> {
        Ok((self.derive_fn)(trigger))
    }
}

/// Derivation from a fallible closure
///
/// Errors are contained as `Failure` outcomes, same as request failures.
pub struct TryKeyFn<F>
where
    F: Fn(&Trigger) -> Result<RequestKey, FetchError> + Send + Sync,
{
    derive_fn: F,
}

impl<F> TryKeyFn<F>
where
    F: Fn(&Trigger) -> Result<RequestKey, FetchError> + Send + Sync,
{
    /// Create a fallible derivation from the given closure
    pub fn new(derive_fn: F) -> Self {
        Self { derive_fn }
    }
}

impl<F> KeyDerive for TryKeyFn<F>
where
    F: Fn(&Trigger) -> Result<RequestKey, FetchError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "try_key_fn"
    }

    fn derive(&self, trigger: &Trigger) -> Result<RequestKey, FetchError> {
        (self.derive_fn)(trigger)
    }
}
