//! Fetcher system for VIRTA
//!
//! A Fetcher issues the asynchronous request a trigger was converted into.
//! The pipeline holds at most one fetch in flight; pending triggers wait in
//! the queue until the current fetch settles.

pub mod http;

use crate::error::FetchError;
use crate::key::RequestKey;
use async_trait::async_trait;
use bytes::Bytes;

pub use http::HttpFetcher;

/// Fetcher trait - issues one request per derived key
///
/// # Example
///
/// ```ignore
/// struct MyBackendFetcher {
///     client: MyClient,
/// }
///
/// #[async_trait]
/// impl Fetcher for MyBackendFetcher {
///     fn name(&self) -> &'static str { "my-backend" }
///
///     async fn fetch(&self, key: &RequestKey) -> Result<Bytes, FetchError> {
///         self.client.get(key.as_str()).await
///     }
///
///     async fn health(&self) -> bool {
///         self.client.ping().await.is_ok()
///     }
/// }
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetcher name for identification and logging
    fn name(&self) -> &'static str;

    /// Issue the request for a key and await its settlement
    ///
    /// # Returns
    /// The response body on success, `FetchError` on failure. Either way the
    /// pipeline delivers exactly one outcome and moves on to the next
    /// trigger.
    async fn fetch(&self, key: &RequestKey) -> Result<Bytes, FetchError>;

    /// Health check for the destination
    async fn health(&self) -> bool;

    /// Graceful shutdown
    ///
    /// Called on pipeline teardown to close connections, flush state, etc.
    async fn shutdown(&self) -> Result<(), FetchError> {
        Ok(())
    }
}
