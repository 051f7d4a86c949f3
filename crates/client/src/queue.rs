//! Bounded event queue with size accounting
//!
//! FIFO of events plus their serializer-provided size estimates. Push
//! and pop are safe from any task; a notify wakes BLOCK-mode producers
//! when the flusher makes room. Capacity is checked *after* push (the
//! append path enqueues first, then applies the overflow policy), so the
//! bound is on steady state, not on a single racing push.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bandit_protocol::{DropPass, TelemetryEvent};
use tokio::sync::Notify;

struct QueueInner<E> {
    items: VecDeque<(E, usize)>,
    approx_bytes: usize,
}

/// Bounded FIFO shared between producers and the background flusher.
pub struct EventQueue<E> {
    inner: Mutex<QueueInner<E>>,
    capacity: usize,
    space: Notify,
}

impl<E: TelemetryEvent> EventQueue<E> {
    /// Create a queue holding at most `capacity` events (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::new(),
                approx_bytes: 0,
            }),
            capacity: capacity.max(1),
            space: Notify::new(),
        }
    }

    // A poisoned lock only means another holder panicked mid-operation;
    // the container itself stays consistent, so recover the guard.
    fn lock(&self) -> MutexGuard<'_, QueueInner<E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one event with its size estimate.
    pub fn push(&self, event: E, size_estimate: usize) {
        let mut inner = self.lock();
        inner.items.push_back((event, size_estimate));
        inner.approx_bytes += size_estimate;
    }

    /// Remove and return the front event, waking one space waiter.
    pub fn pop(&self) -> Option<E> {
        let mut inner = self.lock();
        let (event, size_estimate) = inner.items.pop_front()?;
        inner.approx_bytes -= size_estimate;
        let has_space = inner.items.len() < self.capacity;
        drop(inner);
        if has_space {
            self.space.notify_waiters();
        }
        Some(event)
    }

    /// Current element count.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// True iff the count has reached the configured capacity.
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Sum of the queued events' size estimates.
    pub fn approx_bytes(&self) -> usize {
        self.lock().approx_bytes
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove every event that elects to be dropped in the overflow
    /// pass, preserving the relative order of survivors. Returns the
    /// number of events removed.
    pub fn prune(&self, pass_prob: f32) -> usize {
        let mut inner = self.lock();
        let before = inner.items.len();
        let mut kept = VecDeque::with_capacity(before);
        let mut kept_bytes = 0;
        for (event, size_estimate) in inner.items.drain(..) {
            if event.try_drop(pass_prob, DropPass::QueueOverflow) {
                continue;
            }
            kept_bytes += size_estimate;
            kept.push_back((event, size_estimate));
        }
        inner.items = kept;
        inner.approx_bytes = kept_bytes;
        before - inner.items.len()
    }

    /// Wait until the queue is below capacity again (BLOCK mode).
    pub async fn wait_for_space(&self) {
        loop {
            // register interest before the check so a pop between the
            // check and the await cannot be missed
            let notified = self.space.notified();
            if !self.is_full() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
