use std::sync::Arc;

use bytes::{BufMut, Bytes};
use gridwire::messages::{BatchRequest, DeploymentMode, Envelope, ExecutionPolicy, WireTopic};
use gridwire::{
    CodecConfig, Error, ErrorKind, ExternalUuid, Message, MessageDecoder, MessageEncoder,
    MessageFactory, WriteStatus,
};
use proptest::prelude::*;
use uuid::Uuid;

/// Encode through a fixed-size window, returning the bytes and the number of calls
fn encode_chunked(message: &dyn Message, window: usize) -> (Vec<u8>, usize) {
    let mut encoder = MessageEncoder::new(message);
    let mut wire = Vec::new();
    let mut calls = 0;
    loop {
        calls += 1;
        let mut chunk = Vec::new();
        let status = encoder
            .encode(&mut (&mut chunk).limit(window))
            .expect("encode");
        assert!(chunk.len() <= window);
        wire.extend_from_slice(&chunk);
        if status == WriteStatus::Complete {
            return (wire, calls);
        }
        assert!(!chunk.is_empty(), "no progress with {window}-byte window");
    }
}

/// Feed `wire` to a fresh decoder in `chunk`-sized pieces
fn decode_chunked(wire: &[u8], chunk: usize) -> Box<dyn Message> {
    let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
    let mut pieces = wire.chunks(chunk).peekable();
    while let Some(mut piece) = pieces.next() {
        let result = decoder.decode(&mut piece).expect("decode");
        assert!(piece.is_empty(), "decoder left bytes of a single message");
        match result {
            Some(message) => {
                assert!(pieces.peek().is_none(), "completed before the last chunk");
                return message;
            }
            None => assert!(!decoder.is_idle()),
        }
    }
    panic!("input ended before the message did");
}

/// Encode through windows whose sizes cycle through `windows`
fn encode_varying(message: &dyn Message, windows: &[usize]) -> Vec<u8> {
    let mut encoder = MessageEncoder::new(message);
    let mut wire = Vec::new();
    for &window in windows.iter().cycle() {
        let mut chunk = Vec::new();
        let status = encoder
            .encode(&mut (&mut chunk).limit(window))
            .expect("encode");
        assert!(chunk.len() <= window);
        assert!(status == WriteStatus::Complete || !chunk.is_empty());
        wire.extend_from_slice(&chunk);
        if status == WriteStatus::Complete {
            break;
        }
    }
    wire
}

/// Feed `wire` to a fresh decoder in pieces whose sizes cycle through `chunks`
fn decode_varying(wire: &[u8], chunks: &[usize]) -> Box<dyn Message> {
    let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
    let mut rest = wire;
    for &size in chunks.iter().cycle() {
        let (piece, tail) = rest.split_at(size.min(rest.len()));
        rest = tail;
        let mut piece = piece;
        let result = decoder.decode(&mut piece).expect("decode");
        assert!(piece.is_empty(), "decoder left bytes of a single message");
        if let Some(message) = result {
            assert!(rest.is_empty(), "completed before the last chunk");
            return message;
        }
        assert!(!rest.is_empty(), "input ended before the message did");
    }
    unreachable!("chunk sizes are never empty")
}

fn participants(n: u128) -> Vec<(Uuid, ExternalUuid)> {
    (0..n)
        .map(|i| {
            (
                Uuid::from_u128(0x1000 + i),
                ExternalUuid::new(Uuid::from_u128(0x2000 + i), i as i64),
            )
        })
        .collect()
}

fn assert_same_request(decoded: &BatchRequest, original: &BatchRequest) {
    assert_eq!(decoded.request_id(), original.request_id());
    assert_eq!(decoded.response_topic_bytes(), original.response_topic_bytes());
    assert_eq!(decoded.cache_name(), original.cache_name());
    assert_eq!(decoded.updater_bytes(), original.updater_bytes());
    assert_eq!(decoded.collection_bytes(), original.collection_bytes());
    assert_eq!(
        decoded.ignore_deployment_ownership(),
        original.ignore_deployment_ownership()
    );
    assert_eq!(decoded.skip_store(), original.skip_store());
    assert_eq!(decoded.deployment_mode(), original.deployment_mode());
    assert_eq!(decoded.sample_class_name(), original.sample_class_name());
    assert_eq!(decoded.user_version(), original.user_version());
    assert_eq!(decoded.participants(), original.participants());
    assert_eq!(decoded.class_loader_id(), original.class_loader_id());
    assert_eq!(
        decoded.force_local_deployment(),
        original.force_local_deployment()
    );
}

#[test]
fn envelope_through_four_byte_window() {
    let inner = BatchRequest::builder(77)
        .cache_name("replicated")
        .collection_bytes(vec![0xab; 96])
        .deployment_mode(DeploymentMode::Private)
        .build();
    let original = Envelope::new(
        ExecutionPolicy::System,
        WireTopic::Ordinal(3),
        Box::new(inner),
        true,
        5000,
        false,
    );

    let (wire, calls) = encode_chunked(&original, 4);
    assert!(calls >= 24, "expected dozens of suspensions, got {calls}");

    let mut single = wire.as_slice();
    let factory = MessageFactory::standard();
    let decoded = gridwire::protocol::decode(&mut single, &factory)
        .expect("decode")
        .expect("complete");
    let decoded = decoded.downcast::<Envelope>().expect("envelope");

    assert!(decoded.is_ordered());
    assert_eq!(decoded.timeout(), 5000);
    assert!(!decoded.skip_on_timeout());
    assert_eq!(decoded.policy(), Some(ExecutionPolicy::System));
    assert_eq!(decoded.topic(), Some(WireTopic::Ordinal(3)));

    let payload = decoded.payload().expect("payload");
    let original_payload = original.payload().expect("payload");
    assert_same_request(
        payload.downcast_ref::<BatchRequest>().expect("batch request"),
        original_payload.downcast_ref::<BatchRequest>().expect("batch request"),
    );
}

#[test]
fn batch_request_seven_byte_encode_thirteen_byte_decode() {
    let mut builder = BatchRequest::builder(1)
        .response_topic_bytes(vec![1, 2, 3])
        .updater_bytes(vec![9; 33])
        .collection_bytes((0..10_000u32).map(|i| i as u8).collect::<Vec<_>>())
        .deployment_mode(DeploymentMode::Continuous)
        .sample_class_name("org.example.Entry")
        .user_version("0")
        .class_loader_id(ExternalUuid::new(Uuid::from_u128(7), -7))
        .skip_store(true);
    for (node, loader) in participants(3) {
        builder = builder.participant(node, loader);
    }
    let original = builder.build();
    assert!(original.cache_name().is_none());

    let (wire, _) = encode_chunked(&original, 7);
    let decoded = decode_chunked(&wire, 13)
        .downcast::<BatchRequest>()
        .expect("batch request");

    assert_same_request(&decoded, &original);
    assert_eq!(decoded.participants().len(), 3);
}

#[test]
fn every_window_and_chunk_size_agrees() {
    let original = Envelope::new(
        ExecutionPolicy::Management,
        WireTopic::Bytes(Bytes::from_static(b"topic")),
        Box::new(
            BatchRequest::builder(5)
                .cache_name("c")
                .participant(Uuid::from_u128(1), ExternalUuid::new(Uuid::from_u128(2), 3))
                .build(),
        ),
        false,
        -1,
        true,
    );
    let (reference, _) = encode_chunked(&original, usize::MAX);

    for size in 1..=reference.len() {
        let (wire, _) = encode_chunked(&original, size);
        assert_eq!(wire, reference, "window {size}");

        let decoded = decode_chunked(&reference, size)
            .downcast::<Envelope>()
            .expect("envelope");
        assert_eq!(
            decoded.topic(),
            Some(WireTopic::Bytes(Bytes::from_static(b"topic")))
        );
    }
}

#[test]
fn unknown_type_tag_is_schema_error() {
    let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
    let mut wire: &[u8] = &[0x7f, 0x00, 0x00];
    let err = decoder.decode(&mut wire).unwrap_err();

    assert!(matches!(err, Error::UnknownMessageType { type_byte: 0x7f }));
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(err.is_connection_fatal());
}

#[test]
fn decoder_usable_after_error() {
    let original = BatchRequest::builder(31).build();
    let (wire, _) = encode_chunked(&original, 64);

    let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
    // Valid tag, then a bad string length.
    let mut bad: &[u8] = &[BatchRequest::TYPE, 0xf0, 0xff, 0xff, 0xff];
    assert!(decoder.decode(&mut bad).is_err());
    assert!(decoder.is_idle());

    let decoded = decoder
        .decode(&mut wire.as_slice())
        .expect("decode")
        .expect("complete");
    assert_eq!(
        decoded.downcast_ref::<BatchRequest>().map(BatchRequest::request_id),
        Some(31)
    );
}

#[test]
fn map_insertion_order_does_not_matter() {
    let entries = participants(16);
    let mut forward = BatchRequest::builder(2);
    for (node, loader) in entries.iter().copied() {
        forward = forward.participant(node, loader);
    }
    let mut reverse = BatchRequest::builder(2);
    for (node, loader) in entries.iter().rev().copied() {
        reverse = reverse.participant(node, loader);
    }

    let forward = forward.build();
    let reverse = reverse.build();
    let (a, _) = encode_chunked(&forward, 5);
    let (b, _) = encode_chunked(&reverse, 11);

    let a = decode_chunked(&a, 3).downcast::<BatchRequest>().unwrap();
    let b = decode_chunked(&b, 17).downcast::<BatchRequest>().unwrap();
    assert_eq!(a.participants(), b.participants());
    assert_same_request(&a, &forward);
}

#[test]
fn all_absent_roundtrip() {
    let original = BatchRequest::default();
    let (wire, _) = encode_chunked(&original, 2);
    let decoded = decode_chunked(&wire, 1)
        .downcast::<BatchRequest>()
        .unwrap();
    assert_same_request(&decoded, &original);
}

#[test]
fn large_fields_roundtrip() {
    let big = vec![0x5a; 1 << 20];
    let original = BatchRequest::builder(i64::MAX)
        .collection_bytes(big.clone())
        .updater_bytes(big)
        .cache_name("x".repeat(70_000))
        .participants(participants(2_000).into_iter().collect())
        .build();

    let (wire, _) = encode_chunked(&original, 64 * 1024);
    let decoded = decode_chunked(&wire, 4093)
        .downcast::<BatchRequest>()
        .unwrap();
    assert_same_request(&decoded, &original);
}

#[test]
fn encode_limits_reported_before_any_field_bytes() {
    let original = BatchRequest::builder(0)
        .participants(participants(10).into_iter().collect())
        .build();
    let config = CodecConfig::default().with_max_collection_len(4);
    let mut encoder = MessageEncoder::with_config(&original, config);
    let mut wire = Vec::new();
    let err = encoder.encode(&mut wire).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert!(matches!(
        err,
        Error::FieldTooLarge {
            field: "loader_participants",
            len: 10,
            max: 4
        }
    ));
}

#[test]
fn bytes_source_decodes_back_to_back_messages() {
    let first = BatchRequest::builder(1).build();
    let second = Envelope::new(
        ExecutionPolicy::Public,
        WireTopic::Ordinal(0),
        Box::new(BatchRequest::builder(2).build()),
        false,
        0,
        false,
    );
    let mut wire = encode_chunked(&first, 9).0;
    wire.extend_from_slice(&encode_chunked(&second, 9).0);

    let mut source = Bytes::from(wire);
    let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
    let a = decoder.decode(&mut source).unwrap().unwrap();
    let b = decoder.decode(&mut source).unwrap().unwrap();

    assert!(a.is::<BatchRequest>());
    assert!(b.is::<Envelope>());
    assert!(source.is_empty());
    assert!(decoder.decode(&mut source).unwrap().is_none());
}

#[test]
fn rejected_message_does_not_desync_the_stream() {
    // Tag, absent cache name, absent class loader, absent collection.
    const DEPLOYMENT_MODE_OFFSET: usize = 10;

    let mut wire = encode_chunked(
        &BatchRequest::builder(1)
            .deployment_mode(DeploymentMode::Isolated)
            .build(),
        64,
    )
    .0;
    assert_eq!(wire[DEPLOYMENT_MODE_OFFSET], 1);
    wire[DEPLOYMENT_MODE_OFFSET] = 9;
    wire.extend_from_slice(&encode_chunked(&BatchRequest::builder(2).build(), 64).0);

    let mut source = Bytes::from(wire);
    let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
    let err = decoder.decode(&mut source).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidOrdinal {
            field: "deployment_mode",
            ordinal: 9
        }
    ));
    assert_eq!(err.kind(), ErrorKind::Ordinal);
    assert!(!err.is_connection_fatal());

    let second = decoder
        .decode(&mut source)
        .expect("decode")
        .expect("complete")
        .downcast::<BatchRequest>()
        .expect("batch request");
    assert_eq!(second.request_id(), 2);
    assert!(source.is_empty());
}

fn envelope_strategy() -> impl Strategy<Value = Envelope> {
    (
        0u128..=5,
        prop::collection::vec(any::<u8>(), 0..=300),
        any::<i64>(),
        any::<bool>(),
        any::<u8>(),
    )
        .prop_map(|(count, blob, id, ordered, topic)| {
            let request = BatchRequest::builder(id)
                .collection_bytes(blob)
                .participants(participants(count).into_iter().collect())
                .deployment_mode(DeploymentMode::Continuous)
                .build();
            Envelope::new(
                ExecutionPolicy::Affinity,
                WireTopic::Ordinal(topic),
                Box::new(request),
                ordered,
                -1,
                !ordered,
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn independent_random_splits_roundtrip(
        original in envelope_strategy(),
        encode_windows in prop::collection::vec(1usize..9, 1..32),
        decode_chunks in prop::collection::vec(1usize..9, 1..32),
    ) {
        let wire = encode_varying(&original, &encode_windows);
        let (reference, _) = encode_chunked(&original, usize::MAX);
        prop_assert_eq!(&wire, &reference);

        let decoded = decode_varying(&wire, &decode_chunks)
            .downcast::<Envelope>()
            .expect("envelope");
        prop_assert_eq!(decoded.is_ordered(), original.is_ordered());
        prop_assert_eq!(decoded.skip_on_timeout(), original.skip_on_timeout());
        prop_assert_eq!(decoded.timeout(), original.timeout());
        prop_assert_eq!(decoded.policy(), original.policy());
        prop_assert_eq!(decoded.topic(), original.topic());

        let payload = decoded.payload().expect("payload");
        let original_payload = original.payload().expect("payload");
        assert_same_request(
            payload.downcast_ref::<BatchRequest>().expect("batch request"),
            original_payload.downcast_ref::<BatchRequest>().expect("batch request"),
        );
    }
}
