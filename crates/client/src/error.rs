//! Error taxonomy and the background error callback
//!
//! `init` failures surface synchronously; failures on the flusher path
//! (serializer or transport) never stop the loop and are instead routed
//! through the optional [`ErrorHandler`] injected at construction.

use std::fmt;

use bandit_protocol::SerializeError;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type for batcher operations
pub type Result<T> = std::result::Result<T, BatcherError>;

/// Errors produced by the batching pipeline
#[derive(Debug, Error)]
pub enum BatcherError {
    /// Configuration out of range
    #[error("subsample rate must be within (0, 1], got {rate}")]
    InvalidSubsampleRate { rate: f32 },

    /// A serializer reported failure while building a batch
    #[error("batch serialization failed: {0}")]
    Serialize(#[from] SerializeError),

    /// The transport rejected a batch
    #[error("batch send failed: {0}")]
    Send(#[from] TransportError),

    /// Internal queue failure; unreachable in normal operation
    #[error("event queue failure: {0}")]
    Queue(String),
}

/// Callback invoked for failures on the background flush path.
///
/// The callback runs on the flusher task; it should hand the error off
/// rather than block.
pub struct ErrorHandler {
    callback: Box<dyn Fn(&BatcherError) + Send + Sync>,
}

impl ErrorHandler {
    pub fn new(callback: impl Fn(&BatcherError) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Invoke the callback with one background failure.
    pub fn handle(&self, error: &BatcherError) {
        (self.callback)(error);
    }
}

impl fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandler").finish_non_exhaustive()
    }
}
