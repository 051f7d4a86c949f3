//! Event contract for the batching pipeline
//!
//! Events are opaque to the batcher except for three things: a stable
//! seed identifier, a mutable event index assigned in counter mode, and
//! a `try_drop` decision consulted during subsampling and queue-overflow
//! pruning. The pass tag tells the event *why* it is being asked, so
//! implementations can protect important events from one pass but not
//! the other.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Tolerance for probability comparisons.
///
/// Seed strings parsed back into floats ("0.70") do not land exactly on
/// the configured rate, so equality checks allow this slack.
pub const FLOAT_TOLERANCE: f32 = 1e-6;

/// True when two probabilities are equal within [`FLOAT_TOLERANCE`].
#[inline]
pub fn are_close(a: f32, b: f32) -> bool {
    (a - b).abs() < FLOAT_TOLERANCE
}

/// Why an event is being consulted for a drop decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DropPass {
    /// Subsampling at append time.
    Subsample = 0,
    /// Overflow prune of a full queue in DROP mode.
    QueueOverflow = 1,
}

impl DropPass {
    /// Integer tag handed to event implementations.
    #[inline]
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// Contract every batched event satisfies.
///
/// The batcher takes events by value; once appended, an event is owned
/// by the pipeline until it is serialized or dropped.
pub trait TelemetryEvent: Send + 'static {
    /// Stable seed identifier; drives drop decisions and diagnostics.
    fn seed_id(&self) -> &str;

    /// Index assigned by the batcher in counter mode (0 = unassigned).
    fn event_index(&self) -> u64;

    /// Called by the batcher in counter mode, after the event survives
    /// subsampling.
    fn set_event_index(&mut self, index: u64);

    /// Returns true iff the event elects to be dropped in the given pass.
    ///
    /// `pass_prob` is the probability of *passing*: an implementation
    /// drawing uniformly should drop when its draw lands above it.
    fn try_drop(&self, pass_prob: f32, pass: DropPass) -> bool;
}

/// A minimal owned event: a seed id plus an opaque payload.
///
/// `try_drop` draws a deterministic value from the seed id and the pass
/// tag, so the same event answers the same way every time it is asked
/// within one pass, while the two passes stay independent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicEvent {
    seed_id: String,
    payload: Vec<u8>,
    event_index: u64,
}

impl BasicEvent {
    pub fn new(seed_id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            seed_id: seed_id.into(),
            payload: payload.into(),
            event_index: 0,
        }
    }

    /// The opaque payload carried to the serializer.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The stable seed identifier.
    #[inline]
    pub fn seed_id(&self) -> &str {
        &self.seed_id
    }
}

impl TelemetryEvent for BasicEvent {
    #[inline]
    fn seed_id(&self) -> &str {
        &self.seed_id
    }

    #[inline]
    fn event_index(&self) -> u64 {
        self.event_index
    }

    #[inline]
    fn set_event_index(&mut self, index: u64) {
        self.event_index = index;
    }

    fn try_drop(&self, pass_prob: f32, pass: DropPass) -> bool {
        if pass_prob >= 1.0 || are_close(pass_prob, 1.0) {
            return false;
        }
        uniform_draw(&self.seed_id, pass) >= pass_prob
    }
}

/// Deterministic uniform draw in [0, 1) from a seed id and pass tag.
fn uniform_draw(seed_id: &str, pass: DropPass) -> f32 {
    let mut hasher = DefaultHasher::new();
    seed_id.hash(&mut hasher);
    pass.tag().hash(&mut hasher);
    // 24 high bits give full f32 mantissa precision
    let bits = hasher.finish() >> 40;
    bits as f32 / (1u64 << 24) as f32
}
