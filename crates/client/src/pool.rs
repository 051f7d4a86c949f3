//! Reusable batch buffer pool
//!
//! Serializers write each outgoing batch into a pooled `BytesMut`; after
//! the transport finishes with it, the buffer comes back cleared for the
//! next batch. The pool bounds allocation churn, not total memory: when
//! it runs empty a fresh buffer is allocated, and returns beyond the
//! pool's capacity are simply dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;

/// Pool of reusable batch buffers shared between flush passes.
pub struct BufferPool {
    buffers: ArrayQueue<BytesMut>,
    buffer_capacity: usize,
    metrics: BufferPoolMetrics,
}

impl BufferPool {
    /// Create a pool of `pool_size` pre-allocated buffers of
    /// `buffer_capacity` bytes each.
    pub fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        let buffers = ArrayQueue::new(pool_size.max(1));
        for _ in 0..buffers.capacity() {
            // filling an empty queue cannot fail
            let _ = buffers.push(BytesMut::with_capacity(buffer_capacity));
        }
        Self {
            buffers,
            buffer_capacity,
            metrics: BufferPoolMetrics::new(),
        }
    }

    /// Take a buffer, allocating a fresh one if the pool is empty.
    pub fn get(&self) -> BytesMut {
        match self.buffers.pop() {
            Some(buffer) => {
                self.metrics.hits.fetch_add(1, Ordering::Relaxed);
                buffer
            }
            None => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(self.buffer_capacity)
            }
        }
    }

    /// Clear a buffer and hand it back for reuse.
    ///
    /// Buffers that shrank below the pool's capacity (split off by a
    /// serializer) and returns to a full pool are dropped instead.
    pub fn put(&self, mut buffer: BytesMut) {
        buffer.clear();
        if buffer.capacity() < self.buffer_capacity || self.buffers.push(buffer).is_err() {
            self.metrics.drops.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.metrics.returns.fetch_add(1, Ordering::Relaxed);
    }

    /// Buffers currently resting in the pool.
    #[inline]
    pub fn available(&self) -> usize {
        self.buffers.len()
    }

    /// Maximum number of pooled buffers.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffers.capacity()
    }

    /// Capacity of each pooled buffer in bytes.
    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    #[inline]
    pub fn metrics(&self) -> &BufferPoolMetrics {
        &self.metrics
    }
}

/// Counters for pool behavior
#[derive(Debug, Default)]
pub struct BufferPoolMetrics {
    /// Buffer reused from the pool
    hits: AtomicU64,
    /// Pool was empty; a new buffer was allocated
    misses: AtomicU64,
    /// Buffer returned to the pool
    returns: AtomicU64,
    /// Buffer dropped on return (pool full or buffer shrank)
    drops: AtomicU64,
}

impl BufferPoolMetrics {
    const fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            returns: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> PoolMetricsSnapshot {
        PoolMetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            returns: self.returns.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub returns: u64,
    pub drops: u64,
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
