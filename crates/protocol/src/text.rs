//! Line-delimited text batches
//!
//! Each event's single-line text form followed by `\n`. This is the
//! diagnostic and test format of the pipeline: bodies stay readable and
//! events are delimited by construction. `finalize` adds no framing, and
//! the counted variant leaves the body identical - the original event
//! count rides the transport call instead.

use std::marker::PhantomData;

use bytes::{BufMut, BytesMut};

use crate::serializer::{EventSerializer, SerializeError};
use crate::BasicEvent;

/// Wire message kind for line-delimited text batches
pub const TEXT_BATCH_MESSAGE_ID: u16 = 1;

/// Event form consumed by [`TextLinesSerializer`]
pub trait TextEncode {
    /// Write the single-line text form. Must not contain `\n`.
    fn encode_text(&self, out: &mut String) -> Result<(), SerializeError>;

    /// Upper-bound estimate of the text form's length in bytes.
    fn text_size_hint(&self) -> usize;
}

impl TextEncode for BasicEvent {
    fn encode_text(&self, out: &mut String) -> Result<(), SerializeError> {
        let text = std::str::from_utf8(self.payload())
            .map_err(|_| SerializeError::encode(self.seed_id(), "payload is not valid utf-8"))?;
        out.push_str(text);
        Ok(())
    }

    fn text_size_hint(&self) -> usize {
        self.payload().len()
    }
}

/// Collects events as newline-terminated text lines.
pub struct TextLinesSerializer<E> {
    buffer: BytesMut,
    /// Scratch line reused across `add` calls
    line: String,
    events: usize,
    _event: PhantomData<fn() -> E>,
}

impl<E: TextEncode> EventSerializer<E> for TextLinesSerializer<E> {
    type SharedState = ();

    fn new(mut buffer: BytesMut, _content_encoding: &str, _shared: &()) -> Self {
        // text batches are always shipped as-is; the encoding option
        // only applies to the binary form
        buffer.clear();
        Self {
            buffer,
            line: String::new(),
            events: 0,
            _event: PhantomData,
        }
    }

    fn add(&mut self, event: &E) -> Result<(), SerializeError> {
        self.line.clear();
        event.encode_text(&mut self.line)?;
        self.buffer.put_slice(self.line.as_bytes());
        self.buffer.put_u8(b'\n');
        self.events += 1;
        Ok(())
    }

    #[inline]
    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn finalize(self) -> Result<BytesMut, SerializeError> {
        if self.events == 0 {
            return Err(SerializeError::EmptyBatch);
        }
        Ok(self.buffer)
    }

    fn finalize_counted(self, _original_count: u64) -> Result<BytesMut, SerializeError> {
        // the count travels with the transport call for this form
        self.finalize()
    }

    #[inline]
    fn size_estimate(event: &E) -> usize {
        event.text_size_hint() + 1
    }

    #[inline]
    fn message_id() -> u16 {
        TEXT_BATCH_MESSAGE_ID
    }
}
