//! The asynchronous event batcher
//!
//! Accepts individually produced events from any number of producer
//! tasks, accumulates them in a bounded queue, and lets the background
//! flusher cut them into size-bounded batches for the transport.
//!
//! # Append path
//!
//! 1. In counter mode the admission counter is incremented - even for
//!    events subsampling is about to drop, so every batch window's
//!    original count reflects all admissions, not just survivors
//! 2. With `subsample_rate < 1` the event is consulted via `try_drop`;
//!    a dropped event still counts as appended successfully
//! 3. Survivors get the admission index assigned and are enqueued with
//!    the serializer's size estimate
//! 4. A full queue either parks the producer (BLOCK) or runs a
//!    probabilistic prune pass over the queued events (DROP)
//!
//! # Flush path
//!
//! Once per interval the flusher snapshots the queue length and drains
//! that many events into pooled buffers, cutting a batch as soon as the
//! serializer reaches the high-water mark (the triggering event stays in
//! the batch). Events arriving mid-pass wait for the next iteration,
//! which bounds worst-case flush latency.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use bandit_protocol::{are_close, DropPass, EventSerializer, TelemetryEvent};
use bytes::BytesMut;
use tokio::sync::Mutex;

use crate::config::{BatcherConfig, QueueMode};
use crate::error::{BatcherError, ErrorHandler, Result};
use crate::flusher::BackgroundFlusher;
use crate::pool::BufferPool;
use crate::queue::EventQueue;
use crate::transport::Transport;
use crate::watchdog::Watchdog;

/// Pass probability handed to `try_drop` by the DROP-mode overflow prune
pub const QUEUE_OVERFLOW_PASS_PROBABILITY: f32 = 0.5;

/// Number of pooled batch buffers
const BUFFER_POOL_SIZE: usize = 4;

/// Floor for pooled buffer capacity, so tiny high-water marks still get
/// usable buffers
const MIN_BUFFER_CAPACITY: usize = 4 * 1024;

/// Counters for pipeline activity
#[derive(Debug, Default)]
pub struct BatcherMetrics {
    events_appended: AtomicU64,
    events_subsampled: AtomicU64,
    events_pruned: AtomicU64,
    batches_sent: AtomicU64,
    bytes_sent: AtomicU64,
    serialize_errors: AtomicU64,
    send_errors: AtomicU64,
}

impl BatcherMetrics {
    #[inline]
    fn record_appended(&self) {
        self.events_appended.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_subsampled(&self) {
        self.events_subsampled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_pruned(&self, removed: u64) {
        self.events_pruned.fetch_add(removed, Ordering::Relaxed);
    }

    #[inline]
    fn record_batch(&self, bytes: u64) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    fn record_serialize_error(&self) {
        self.serialize_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_appended: self.events_appended.load(Ordering::Relaxed),
            events_subsampled: self.events_subsampled.load(Ordering::Relaxed),
            events_pruned: self.events_pruned.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            serialize_errors: self.serialize_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of batcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_appended: u64,
    pub events_subsampled: u64,
    pub events_pruned: u64,
    pub batches_sent: u64,
    pub bytes_sent: u64,
    pub serialize_errors: u64,
    pub send_errors: u64,
}

/// State touched only under the flush lock: the transport (sends are
/// serial) and the window bookkeeping for counter mode.
struct FlushState {
    transport: Box<dyn Transport>,
    /// Admission index at the end of the last finalized buffer's window
    buffer_end_event_number: u64,
}

pub(crate) struct BatcherCore<E: TelemetryEvent, S: EventSerializer<E>> {
    queue: EventQueue<E>,
    pool: BufferPool,
    flush_state: Mutex<FlushState>,
    shared_state: S::SharedState,
    config: BatcherConfig,
    /// Admissions counter; incremented for every append in counter mode,
    /// including events subsampling drops
    event_index: AtomicU64,
    error_handler: Option<ErrorHandler>,
    watchdog: Arc<Watchdog>,
    metrics: BatcherMetrics,
    _serializer: PhantomData<fn() -> S>,
}

impl<E: TelemetryEvent, S: EventSerializer<E>> BatcherCore<E, S> {
    pub(crate) async fn append(&self, mut event: E) -> Result<()> {
        let assigned_index = if self.config.events_counter_status.is_enabled() {
            Some(self.event_index.fetch_add(1, Ordering::Relaxed) + 1)
        } else {
            None
        };

        if self.config.subsample_rate < 1.0
            && event.try_drop(self.config.subsample_rate, DropPass::Subsample)
        {
            self.metrics.record_subsampled();
            tracing::trace!(seed_id = event.seed_id(), "event dropped by subsampling");
            return Ok(());
        }

        if let Some(index) = assigned_index {
            event.set_event_index(index);
        }

        let size_estimate = S::size_estimate(&event);
        self.queue.push(event, size_estimate);
        self.metrics.record_appended();

        if self.queue.is_full() {
            match self.config.queue_mode {
                QueueMode::Block => self.queue.wait_for_space().await,
                QueueMode::Drop => {
                    let removed = self.queue.prune(QUEUE_OVERFLOW_PASS_PROBABILITY);
                    if removed > 0 {
                        self.metrics.record_pruned(removed as u64);
                        tracing::debug!(removed, "queue overflow prune");
                    }
                }
            }
        }

        Ok(())
    }

    /// One full drain pass. Failures inside the pass are routed through
    /// the error callback; the pass itself keeps going.
    pub(crate) async fn run_iteration(&self) {
        self.flush().await;
    }

    async fn flush(&self) {
        // snapshot at entry: events arriving during the pass are left
        // for the next iteration
        let mut remaining = self.queue.len();
        if remaining == 0 {
            return;
        }
        let mut state = self.flush_state.lock().await;
        tracing::trace!(remaining, "flush pass started");

        while remaining > 0 {
            match self.fill_buffer(&mut state, &mut remaining) {
                Ok(Some((payload, original_count))) => {
                    let bytes = payload.len() as u64;
                    let result = match original_count {
                        Some(count) => {
                            state
                                .transport
                                .send_counted(S::message_id(), &payload, count)
                                .await
                        }
                        None => state.transport.send(S::message_id(), &payload).await,
                    };
                    self.pool.put(payload);
                    match result {
                        Ok(()) => self.metrics.record_batch(bytes),
                        Err(error) => {
                            self.metrics.record_send_error();
                            self.report(&BatcherError::Send(error));
                        }
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    self.metrics.record_serialize_error();
                    self.report(&error);
                }
            }
        }
    }

    /// Pop events into one serializer until the snapshot is exhausted or
    /// the encoded size reaches the high-water mark. The cut is
    /// post-insert: the triggering event stays in the current batch.
    fn fill_buffer(
        &self,
        state: &mut FlushState,
        remaining: &mut usize,
    ) -> Result<Option<(BytesMut, Option<u32>)>> {
        let buffer = self.pool.get();
        let mut serializer = S::new(
            buffer,
            &self.config.batch_content_encoding,
            &self.shared_state,
        );
        let mut last_index = 0u64;
        let mut added = 0usize;

        while *remaining > 0 && serializer.size() < self.config.send_high_water_mark {
            let Some(event) = self.queue.pop() else {
                // a racing DROP-mode prune can shrink the queue below
                // the entry snapshot; an empty queue ends the pass
                *remaining = 0;
                break;
            };
            *remaining -= 1;
            last_index = event.event_index();
            serializer.add(&event)?;
            added += 1;
        }

        if added == 0 {
            return Ok(None);
        }

        if self.config.events_counter_status.is_enabled() {
            // a buffer that drains the queue absorbs trailing
            // subsample-dropped admissions into its window; a buffer cut
            // on size ends at its last serialized event
            let window_end = if self.queue.is_empty() {
                self.event_index.load(Ordering::Relaxed).max(last_index)
            } else {
                last_index
            };
            let window_start = state.buffer_end_event_number;
            state.buffer_end_event_number = window_end;
            let original_count = window_end.saturating_sub(window_start);
            let payload = serializer.finalize_counted(original_count)?;
            let count = u32::try_from(original_count).unwrap_or(u32::MAX);
            Ok(Some((payload, Some(count))))
        } else {
            Ok(Some((serializer.finalize()?, None)))
        }
    }

    fn report(&self, error: &BatcherError) {
        tracing::warn!(%error, "background batch failure");
        if let Some(handler) = &self.error_handler {
            handler.handle(error);
        }
    }
}

/// The batcher: public append surface plus the lifecycle of its
/// background flusher. Generic over the event type and the serializer
/// strategy.
pub struct EventBatcher<E: TelemetryEvent, S: EventSerializer<E>> {
    core: Arc<BatcherCore<E, S>>,
    flusher: StdMutex<Option<BackgroundFlusher>>,
}

impl<E: TelemetryEvent, S: EventSerializer<E> + 'static> EventBatcher<E, S> {
    /// Create a batcher that exclusively owns `transport`.
    ///
    /// The batcher is inert until [`init`](Self::init) starts the
    /// background flusher.
    pub fn new(
        transport: Box<dyn Transport>,
        watchdog: Arc<Watchdog>,
        shared_state: S::SharedState,
        error_handler: Option<ErrorHandler>,
        config: BatcherConfig,
    ) -> Self {
        let buffer_capacity = config
            .send_high_water_mark
            .saturating_add(config.send_high_water_mark / 4)
            .max(MIN_BUFFER_CAPACITY);
        let core = BatcherCore {
            queue: EventQueue::new(config.send_queue_max_capacity),
            pool: BufferPool::new(BUFFER_POOL_SIZE, buffer_capacity),
            flush_state: Mutex::new(FlushState {
                transport,
                buffer_end_event_number: 0,
            }),
            shared_state,
            config,
            event_index: AtomicU64::new(0),
            error_handler,
            watchdog,
            metrics: BatcherMetrics::default(),
            _serializer: PhantomData,
        };
        Self {
            core: Arc::new(core),
            flusher: StdMutex::new(None),
        }
    }

    /// Validate the configuration and start the background flusher.
    ///
    /// Fails when `subsample_rate` is outside (0, 1]. Calling `init` on
    /// an already initialized batcher is a no-op.
    pub fn init(&self) -> Result<()> {
        let rate = self.core.config.subsample_rate;
        let at_most_zero = rate < 0.0 || are_close(rate, 0.0);
        let above_one = rate > 1.0 && !are_close(rate, 1.0);
        if at_most_zero || above_one {
            return Err(BatcherError::InvalidSubsampleRate { rate });
        }

        let mut flusher = self.lock_flusher();
        if flusher.is_none() {
            *flusher = Some(BackgroundFlusher::spawn(
                Arc::clone(&self.core),
                self.core.config.batch_interval(),
                Arc::clone(&self.core.watchdog),
            ));
            tracing::debug!(
                interval_ms = self.core.config.send_batch_interval_ms,
                high_water_mark = self.core.config.send_high_water_mark,
                queue_capacity = self.core.config.send_queue_max_capacity,
                queue_mode = ?self.core.config.queue_mode,
                "event batcher started"
            );
        }
        Ok(())
    }

    /// Admit one event into the pipeline.
    ///
    /// Returns as soon as the event is enqueued (or dropped by
    /// subsampling). Waits only in BLOCK mode while the queue is full;
    /// batch-level failures never surface here.
    pub async fn append(&self, event: E) -> Result<()> {
        self.core.append(event).await
    }

    /// Run one drain pass outside the timer, e.g. to force a flush.
    ///
    /// Serializer and transport failures are routed through the error
    /// callback, never returned.
    pub async fn run_iteration(&self) {
        self.core.run_iteration().await;
    }

    /// Stop the background flusher, then drain any remaining events.
    ///
    /// Drain failures route through the error callback. Idempotent;
    /// after it returns no further background activity occurs.
    pub async fn shutdown(&self) {
        let flusher = self.lock_flusher().take();
        if let Some(flusher) = flusher {
            flusher.stop().await;
        }
        if !self.core.queue.is_empty() {
            self.core.run_iteration().await;
        }
        tracing::debug!(
            batches_sent = self.core.metrics.snapshot().batches_sent,
            "event batcher stopped"
        );
    }

    /// Events currently queued and waiting for the next flush.
    pub fn pending_events(&self) -> usize {
        self.core.queue.len()
    }

    #[inline]
    pub fn metrics(&self) -> &BatcherMetrics {
        &self.core.metrics
    }

    #[inline]
    pub fn watchdog(&self) -> &Watchdog {
        &self.core.watchdog
    }

    fn lock_flusher(&self) -> MutexGuard<'_, Option<BackgroundFlusher>> {
        self.flusher.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: TelemetryEvent, S: EventSerializer<E>> Drop for EventBatcher<E, S> {
    fn drop(&mut self) {
        let flusher = self
            .flusher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(flusher) = flusher {
            flusher.abort();
            let pending = self.core.queue.len();
            if pending > 0 {
                tracing::warn!(
                    pending,
                    "event batcher dropped without shutdown; queued events were not flushed"
                );
            }
        }
    }
}
