//! Bandit protocol - event contract and batch serializers
//!
//! This crate defines the types that cross the batching pipeline's seams:
//! - `TelemetryEvent` - the contract every batched event satisfies
//! - `DropPass` - why an event is being consulted for a drop decision
//! - `EventSerializer` - strategy that collects events into one wire batch
//! - `TextLinesSerializer` - line-delimited text form (tests, diagnostics)
//! - `FramedBinarySerializer` / `FramedBatch` - framed binary wire form
//!
//! # Design Principles
//!
//! - **Ownership through the pipeline**: a serializer takes its output
//!   `BytesMut` at construction and hands it back from `finalize`, ready
//!   to send
//! - **Strategy, not inheritance**: the batcher is generic over the
//!   serializer; event encoding is a trait bound the serializer imposes
//! - **Deterministic drop decisions**: the same event gives the same
//!   answer for the same pass, so retries and pruning stay reproducible

mod event;
mod framed;
mod serializer;
mod text;

pub use event::{are_close, BasicEvent, DropPass, TelemetryEvent, FLOAT_TOLERANCE};
pub use framed::{
    FrameError, FramedBatch, FramedBinarySerializer, WireEncode, FRAMED_BATCH_MESSAGE_ID,
    FRAMED_HEADER_LEN, FRAMED_MAGIC,
};
pub use serializer::{ContentEncoding, EventSerializer, SerializeError};
pub use text::{TextEncode, TextLinesSerializer, TEXT_BATCH_MESSAGE_ID};

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for serializer operations
pub type Result<T> = std::result::Result<T, SerializeError>;

#[cfg(test)]
mod text_test;
