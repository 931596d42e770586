//! Error types for VIRTA

use thiserror::Error;

/// Result type alias for VIRTA operations
pub type Result<T> = std::result::Result<T, VirtaError>;

/// Main error type for VIRTA
#[derive(Error, Debug)]
pub enum VirtaError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// The pipeline has been torn down; no more triggers are accepted
    #[error("pipeline terminated")]
    Terminated,

    /// The pending-trigger queue is full
    #[error("trigger queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics error
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Runtime error (task join failure during teardown)
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Error type for a single request attempt
///
/// Always contained at the per-request boundary: a `FetchError` becomes a
/// `Failure` outcome (or a masked completion marker), never a pipeline
/// termination.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// Connection-level failure (DNS, refused, timeout)
    #[error("connection error: {0}")]
    Connection(String),

    /// The endpoint answered with a non-success status
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request URL could not be built
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    /// Key derivation failed before a request could be issued
    #[error("key derivation failed: {0}")]
    Derive(String),
}

/// Error type for sink delivery
///
/// Sink errors are logged by the runner and never terminate the pipeline.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Delivery to the destination failed
    #[error("delivery failed: {0}")]
    Deliver(String),

    /// The receiving side is gone
    #[error("sink closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 404,
            body: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "endpoint returned 404: not found");
    }

    #[test]
    fn test_queue_full_display() {
        let err = VirtaError::QueueFull { capacity: 64 };
        assert_eq!(err.to_string(), "trigger queue full (capacity 64)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: VirtaError = io.into();
        assert!(matches!(err, VirtaError::Io(_)));
    }
}
