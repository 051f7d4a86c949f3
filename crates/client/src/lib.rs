//! Bandit client - asynchronous event batcher
//!
//! Producer tasks hand individual telemetry events to [`EventBatcher::append`];
//! a background flusher drains them every `send_batch_interval_ms` into
//! size-bounded batches and ships each one through a pluggable
//! [`Transport`]. The pipeline supports cooperative subsampling at append
//! time, two queue-overflow policies (BLOCK and DROP), and an optional
//! counter mode that preserves the original pre-subsample event count of
//! every batch window.
//!
//! # Pipeline
//!
//! ```text
//! append(evt) -> subsample -> bounded queue -> flusher -> serializer -> transport
//!                                 |                |
//!                          BLOCK wait /      cut at high-water
//!                          DROP prune        mark, pooled buffers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use bandit_client::{BatcherConfig, EventBatcher, HttpTransport, Watchdog};
//! use bandit_protocol::{BasicEvent, FramedBinarySerializer};
//!
//! let transport = HttpTransport::new("https://ingest.example.com/batches", "api-key");
//! let config = BatcherConfig::default().with_queue_capacity(16 * 1024);
//! let batcher: EventBatcher<BasicEvent, FramedBinarySerializer<BasicEvent>> =
//!     EventBatcher::new(Box::new(transport), Default::default(), (), None, config);
//! batcher.init()?;
//!
//! batcher.append(BasicEvent::new("event-1", b"...".to_vec())).await?;
//!
//! // stop the flusher and drain whatever is still queued
//! batcher.shutdown().await;
//! ```

mod batcher;
mod config;
mod error;
mod flusher;
mod pool;
mod queue;
mod transport;
mod watchdog;

pub use batcher::{
    BatcherMetrics, EventBatcher, MetricsSnapshot, QUEUE_OVERFLOW_PASS_PROBABILITY,
};
pub use config::{
    BatcherConfig, CounterStatus, QueueMode, Section, Settings,
    DEFAULT_SEND_BATCH_INTERVAL_MS, DEFAULT_SEND_HIGH_WATER_MARK,
    DEFAULT_SEND_QUEUE_MAX_CAPACITY,
};
pub use error::{BatcherError, ErrorHandler, Result};
pub use pool::{BufferPool, BufferPoolMetrics, PoolMetricsSnapshot};
pub use queue::EventQueue;
pub use transport::{HttpTransport, Transport, TransportError};
pub use watchdog::Watchdog;

pub use bandit_protocol as protocol;
