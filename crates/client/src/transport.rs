//! Transport seam - where finished batches leave the process
//!
//! The batcher exclusively owns its transport: only the flusher (and
//! the shutdown drain) ever call `send`, so implementations can assume
//! one call in flight at a time.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by transports
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection or request failure
    #[error("transport i/o failure: {0}")]
    Io(String),

    /// Endpoint answered with a non-success status
    #[error("endpoint returned status {status}")]
    Status { status: u16 },

    /// Transport has been closed and cannot accept batches
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// Create an i/o error
    #[inline]
    pub fn io(reason: impl Into<String>) -> Self {
        Self::Io(reason.into())
    }
}

/// Sink for finished batches, exclusively owned by one batcher.
#[async_trait]
pub trait Transport: Send {
    /// Ship one serialized batch.
    async fn send(&mut self, message_id: u16, payload: &[u8]) -> Result<(), TransportError>;

    /// Ship one batch together with the original (pre-subsample) event
    /// count of its window. Called instead of [`send`](Self::send) when
    /// counter mode is enabled.
    async fn send_counted(
        &mut self,
        message_id: u16,
        payload: &[u8],
        original_count: u32,
    ) -> Result<(), TransportError> {
        let _ = original_count;
        self.send(message_id, payload).await
    }
}

/// Request timeout for the HTTP transport
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const HEADER_MESSAGE_ID: &str = "x-batch-message-id";
const HEADER_ORIGINAL_COUNT: &str = "x-batch-original-count";

/// HTTP batch sender: POSTs each batch body to a fixed endpoint.
///
/// The message kind and, in counter mode, the original event count ride
/// as request headers so the body stays exactly the serialized batch.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            api_key: api_key.into(),
        }
    }

    async fn post(
        &self,
        message_id: u16,
        payload: &[u8],
        original_count: Option<u32>,
    ) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("content-type", "application/octet-stream")
            .header("authorization", &self.api_key)
            .header(HEADER_MESSAGE_ID, message_id.to_string())
            .body(payload.to_vec());
        if let Some(count) = original_count {
            request = request.header(HEADER_ORIGINAL_COUNT, count.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::io(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&mut self, message_id: u16, payload: &[u8]) -> Result<(), TransportError> {
        self.post(message_id, payload, None).await
    }

    async fn send_counted(
        &mut self,
        message_id: u16,
        payload: &[u8],
        original_count: u32,
    ) -> Result<(), TransportError> {
        self.post(message_id, payload, Some(original_count)).await
    }
}
