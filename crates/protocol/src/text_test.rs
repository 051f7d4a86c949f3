//! Tests for the line-delimited text serializer

use bytes::BytesMut;

use crate::{
    BasicEvent, EventSerializer, SerializeError, TextLinesSerializer, TEXT_BATCH_MESSAGE_ID,
};

fn serializer() -> TextLinesSerializer<BasicEvent> {
    TextLinesSerializer::new(BytesMut::new(), "identity", &())
}

#[test]
fn test_events_are_newline_terminated() {
    let mut ser = serializer();
    ser.add(&BasicEvent::new("a", b"foo".to_vec())).unwrap();
    ser.add(&BasicEvent::new("b", b"bar".to_vec())).unwrap();

    let buffer = ser.finalize().unwrap();
    assert_eq!(&buffer[..], b"foo\nbar\n");
}

#[test]
fn test_size_tracks_encoded_bytes() {
    let mut ser = serializer();
    assert_eq!(ser.size(), 0);

    ser.add(&BasicEvent::new("a", b"foo".to_vec())).unwrap();
    assert_eq!(ser.size(), 4);

    ser.add(&BasicEvent::new("b", b"bar-yyy".to_vec())).unwrap();
    assert_eq!(ser.size(), 12);
}

#[test]
fn test_finalize_empty_batch_fails() {
    let ser = serializer();
    assert!(matches!(ser.finalize(), Err(SerializeError::EmptyBatch)));
}

#[test]
fn test_finalize_counted_leaves_body_identical() {
    let mut plain = serializer();
    plain.add(&BasicEvent::new("a", b"foo".to_vec())).unwrap();
    let plain = plain.finalize().unwrap();

    let mut counted = serializer();
    counted.add(&BasicEvent::new("a", b"foo".to_vec())).unwrap();
    let counted = counted.finalize_counted(17).unwrap();

    assert_eq!(&plain[..], &counted[..]);
}

#[test]
fn test_invalid_utf8_payload_is_an_encode_error() {
    let mut ser = serializer();
    let result = ser.add(&BasicEvent::new("a", vec![0xff, 0xfe]));
    assert!(matches!(result, Err(SerializeError::Encode { .. })));
}

#[test]
fn test_size_estimate_includes_delimiter() {
    let event = BasicEvent::new("a", b"foo".to_vec());
    assert_eq!(
        <TextLinesSerializer<BasicEvent> as EventSerializer<BasicEvent>>::size_estimate(&event),
        4
    );
}

#[test]
fn test_message_id() {
    assert_eq!(
        <TextLinesSerializer<BasicEvent> as EventSerializer<BasicEvent>>::message_id(),
        TEXT_BATCH_MESSAGE_ID
    );
}

#[test]
fn test_reuses_cleared_buffer() {
    let mut dirty = BytesMut::new();
    dirty.extend_from_slice(b"stale");

    let mut ser = TextLinesSerializer::<BasicEvent>::new(dirty, "identity", &());
    ser.add(&BasicEvent::new("a", b"foo".to_vec())).unwrap();
    assert_eq!(&ser.finalize().unwrap()[..], b"foo\n");
}
