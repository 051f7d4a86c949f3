//! Framed binary batches
//!
//! The production wire form: a fixed header followed by length-prefixed
//! event records, with optional LZ4 body compression selected by the
//! batch content encoding.
//!
//! # Wire Format
//!
//! ```text
//! [4 bytes: magic "BDF1"]
//! [1 byte:  version]
//! [1 byte:  flags (bit 0 = lz4 body)]
//! [2 bytes: reserved]
//! [4 bytes: event count (BE)]
//! [8 bytes: original pre-subsample count (BE, 0 when counting is off)]
//! [body: repeated (4-byte BE record length, record bytes)]
//! ```
//!
//! When the lz4 flag is set, the body (everything after the header) is a
//! single `lz4_flex` size-prepended block.

use std::marker::PhantomData;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::serializer::{ContentEncoding, EventSerializer, SerializeError};
use crate::BasicEvent;

/// Wire message kind for framed binary batches
pub const FRAMED_BATCH_MESSAGE_ID: u16 = 2;

/// Leading magic of every framed batch
pub const FRAMED_MAGIC: [u8; 4] = *b"BDF1";

/// Fixed header length in bytes
pub const FRAMED_HEADER_LEN: usize = 20;

const FRAMED_VERSION: u8 = 1;
const FLAG_LZ4: u8 = 0b0000_0001;

/// Event form consumed by [`FramedBinarySerializer`]
pub trait WireEncode {
    /// Append the event's record bytes (without the length prefix).
    fn encode_wire(&self, out: &mut BytesMut) -> Result<(), SerializeError>;

    /// Upper-bound estimate of the record's length in bytes.
    fn wire_size_hint(&self) -> usize;
}

impl WireEncode for BasicEvent {
    fn encode_wire(&self, out: &mut BytesMut) -> Result<(), SerializeError> {
        let seed = self.seed_id().as_bytes();
        if seed.len() > u16::MAX as usize {
            return Err(SerializeError::encode(self.seed_id(), "seed id too long"));
        }
        out.put_u16(seed.len() as u16);
        out.put_slice(seed);
        out.put_slice(self.payload());
        Ok(())
    }

    fn wire_size_hint(&self) -> usize {
        2 + self.seed_id().len() + self.payload().len()
    }
}

/// Collects events into the framed binary form.
pub struct FramedBinarySerializer<E> {
    buffer: BytesMut,
    encoding: ContentEncoding,
    events: u32,
    _event: PhantomData<fn() -> E>,
}

impl<E> FramedBinarySerializer<E> {
    fn finish(mut self, original_count: u64) -> Result<BytesMut, SerializeError> {
        if self.events == 0 {
            return Err(SerializeError::EmptyBatch);
        }
        if self.encoding == ContentEncoding::Lz4 {
            let body = self.buffer.split_off(FRAMED_HEADER_LEN);
            let compressed = lz4_flex::compress_prepend_size(&body);
            self.buffer.extend_from_slice(&compressed);
        }
        let header = &mut self.buffer[..FRAMED_HEADER_LEN];
        header[..4].copy_from_slice(&FRAMED_MAGIC);
        header[4] = FRAMED_VERSION;
        header[5] = match self.encoding {
            ContentEncoding::Identity => 0,
            ContentEncoding::Lz4 => FLAG_LZ4,
        };
        header[6..8].copy_from_slice(&[0, 0]);
        header[8..12].copy_from_slice(&self.events.to_be_bytes());
        header[12..20].copy_from_slice(&original_count.to_be_bytes());
        Ok(self.buffer)
    }
}

impl<E: WireEncode> EventSerializer<E> for FramedBinarySerializer<E> {
    type SharedState = ();

    fn new(mut buffer: BytesMut, content_encoding: &str, _shared: &()) -> Self {
        buffer.clear();
        // header space is reserved up front and patched at finalize
        buffer.resize(FRAMED_HEADER_LEN, 0);
        Self {
            buffer,
            encoding: ContentEncoding::parse(content_encoding),
            events: 0,
            _event: PhantomData,
        }
    }

    fn add(&mut self, event: &E) -> Result<(), SerializeError> {
        let prefix_at = self.buffer.len();
        self.buffer.put_u32(0);
        event.encode_wire(&mut self.buffer)?;
        let record_len = (self.buffer.len() - prefix_at - 4) as u32;
        self.buffer[prefix_at..prefix_at + 4].copy_from_slice(&record_len.to_be_bytes());
        self.events += 1;
        Ok(())
    }

    #[inline]
    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn finalize(self) -> Result<BytesMut, SerializeError> {
        self.finish(0)
    }

    fn finalize_counted(self, original_count: u64) -> Result<BytesMut, SerializeError> {
        self.finish(original_count)
    }

    #[inline]
    fn size_estimate(event: &E) -> usize {
        4 + event.wire_size_hint()
    }

    #[inline]
    fn message_id() -> u16 {
        FRAMED_BATCH_MESSAGE_ID
    }
}

/// Errors from parsing a framed batch
#[derive(Debug, Error)]
pub enum FrameError {
    /// Input shorter than the fixed header
    #[error("framed batch too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Leading magic did not match
    #[error("bad framed batch magic")]
    BadMagic,

    /// Header declared a version this parser does not understand
    #[error("unsupported framed batch version: {0}")]
    UnsupportedVersion(u8),

    /// A record's length prefix ran past the end of the body
    #[error("truncated record at index {index}")]
    TruncatedRecord { index: usize },

    /// LZ4 body could not be decompressed
    #[error("failed to decompress batch body: {0}")]
    Decompress(String),
}

/// Parsed view of one framed batch.
#[derive(Debug, Clone)]
pub struct FramedBatch {
    version: u8,
    encoding: ContentEncoding,
    event_count: u32,
    original_count: u64,
    body: Bytes,
    /// (offset, length) of each record within `body`
    records: Vec<(usize, usize)>,
}

impl FramedBatch {
    /// Parse a complete framed batch, decompressing the body if needed.
    pub fn parse(input: &[u8]) -> Result<Self, FrameError> {
        if input.len() < FRAMED_HEADER_LEN {
            return Err(FrameError::TooShort {
                expected: FRAMED_HEADER_LEN,
                actual: input.len(),
            });
        }
        if input[..4] != FRAMED_MAGIC {
            return Err(FrameError::BadMagic);
        }
        let version = input[4];
        if version != FRAMED_VERSION {
            return Err(FrameError::UnsupportedVersion(version));
        }
        let encoding = if input[5] & FLAG_LZ4 != 0 {
            ContentEncoding::Lz4
        } else {
            ContentEncoding::Identity
        };
        let event_count = u32::from_be_bytes([input[8], input[9], input[10], input[11]]);
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&input[12..20]);
        let original_count = u64::from_be_bytes(count_bytes);

        let raw_body = &input[FRAMED_HEADER_LEN..];
        let body: Bytes = match encoding {
            ContentEncoding::Identity => Bytes::copy_from_slice(raw_body),
            ContentEncoding::Lz4 => lz4_flex::decompress_size_prepended(raw_body)
                .map_err(|e| FrameError::Decompress(e.to_string()))?
                .into(),
        };

        let mut records = Vec::with_capacity(event_count as usize);
        let mut offset = 0usize;
        while offset < body.len() {
            if offset + 4 > body.len() {
                return Err(FrameError::TruncatedRecord {
                    index: records.len(),
                });
            }
            let len = u32::from_be_bytes([
                body[offset],
                body[offset + 1],
                body[offset + 2],
                body[offset + 3],
            ]) as usize;
            let start = offset + 4;
            if start + len > body.len() {
                return Err(FrameError::TruncatedRecord {
                    index: records.len(),
                });
            }
            records.push((start, len));
            offset = start + len;
        }

        Ok(Self {
            version,
            encoding,
            event_count,
            original_count,
            body,
            records,
        })
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.version
    }

    #[inline]
    pub fn encoding(&self) -> ContentEncoding {
        self.encoding
    }

    /// Number of events physically present in the batch.
    #[inline]
    pub fn event_count(&self) -> u32 {
        self.event_count
    }

    /// Pre-subsample admission count of the batch window (0 when the
    /// producer ran with counting off).
    #[inline]
    pub fn original_count(&self) -> u64 {
        self.original_count
    }

    /// Record bytes by index.
    #[inline]
    pub fn record(&self, index: usize) -> Option<&[u8]> {
        let (start, len) = *self.records.get(index)?;
        Some(&self.body[start..start + len])
    }

    /// Iterate over all records in batch order.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.records
            .iter()
            .map(move |&(start, len)| &self.body[start..start + len])
    }
}
