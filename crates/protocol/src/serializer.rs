//! Serializer contract - strategy that collects events into one batch
//!
//! A serializer is bound to one output buffer at construction, collects
//! events one at a time, and hands the buffer back from `finalize` ready
//! for the transport. The batcher consults `size()` after every `add` to
//! decide where to cut the batch.

use bytes::BytesMut;
use thiserror::Error;

/// Errors reported by batch serializers
#[derive(Debug, Error)]
pub enum SerializeError {
    /// Event could not be encoded
    #[error("failed to encode event {seed_id}: {reason}")]
    Encode { seed_id: String, reason: String },

    /// Batch framing or trailer could not be written
    #[error("failed to finalize batch: {0}")]
    Finalize(String),

    /// A batch must contain at least one event before finalize
    #[error("batch contains no events")]
    EmptyBatch,
}

impl SerializeError {
    /// Create an encode error for one event
    #[inline]
    pub fn encode(seed_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encode {
            seed_id: seed_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a finalize error
    #[inline]
    pub fn finalize(reason: impl Into<String>) -> Self {
        Self::Finalize(reason.into())
    }
}

/// Content encoding applied to an outgoing batch body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    /// Body bytes shipped as written
    #[default]
    Identity,
    /// Body compressed with LZ4 at finalize
    Lz4,
}

impl ContentEncoding {
    pub const IDENTITY: &'static str = "identity";
    pub const LZ4: &'static str = "lz4";

    /// Parse the configuration string; unknown values fall back to identity.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case(Self::LZ4) {
            Self::Lz4
        } else {
            Self::Identity
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identity => Self::IDENTITY,
            Self::Lz4 => Self::LZ4,
        }
    }
}

/// Strategy that collects events into one wire batch.
///
/// The batcher is generic over this trait; the two canonical
/// implementations are [`crate::TextLinesSerializer`] (line-delimited
/// text) and [`crate::FramedBinarySerializer`] (framed binary).
pub trait EventSerializer<E> {
    /// State shared by every batch of one batcher instance.
    type SharedState: Clone + Send + Sync + 'static;

    /// Bind a new collector to one output buffer.
    ///
    /// `content_encoding` is the raw configuration string; forms that do
    /// not support an encoding ignore it.
    fn new(buffer: BytesMut, content_encoding: &str, shared: &Self::SharedState) -> Self;

    /// Append one event's encoded form, individually delimited.
    fn add(&mut self, event: &E) -> Result<(), SerializeError>;

    /// Current encoded byte size, used for the batch-cut decision.
    fn size(&self) -> usize;

    /// Write any framing and hand back the buffer, ready to send.
    fn finalize(self) -> Result<BytesMut, SerializeError>;

    /// Like [`finalize`](Self::finalize), recording the original
    /// (pre-subsample) event count of the batch window.
    fn finalize_counted(self, original_count: u64) -> Result<BytesMut, SerializeError>;

    /// Cheap size estimate used for queue accounting.
    fn size_estimate(event: &E) -> usize;

    /// Wire message kind handed to the transport alongside each batch.
    fn message_id() -> u16;
}
