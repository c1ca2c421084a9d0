//! Property tests over generated documents.

use bson_wire::codec::calculate_document_size;
use bson_wire::protocol::{InsertBody, RequestMessage};
use bson_wire::{
    decode_document, encode_document, Binary, Document, EncodeOptions, ObjectId, Value,
};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        (prop::num::f64::NORMAL | prop::num::f64::ZERO | prop::num::f64::INFINITE)
            .prop_map(Value::Double),
        ".{0,16}".prop_map(Value::String),
        any::<bool>().prop_map(Value::Boolean),
        any::<i32>().prop_map(Value::Int32),
        any::<i64>().prop_map(Value::Int64),
        any::<i64>().prop_map(Value::DateTime),
        Just(Value::Null),
        Just(Value::MinKey),
        Just(Value::MaxKey),
        any::<[u8; 12]>().prop_map(|b| Value::ObjectId(ObjectId::from_bytes(b))),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|b| Value::Binary(Binary::new(b))),
        ("[a-z^$.*]{0,6}", "[imsx]{0,3}")
            .prop_map(|(pattern, options)| Value::Regex { pattern, options }),
        (any::<u32>(), any::<u32>())
            .prop_map(|(increment, time)| Value::Timestamp { increment, time }),
        "[a-z]{0,8}".prop_map(Value::Symbol),
        "[a-z();]{0,8}".prop_map(Value::Code),
    ]
}

fn document_of(value: BoxedStrategy<Value>) -> impl Strategy<Value = Document> {
    prop::collection::vec(("[a-z_]{1,6}", value), 0..6)
        .prop_map(|entries| entries.into_iter().collect::<Document>())
}

fn value() -> BoxedStrategy<Value> {
    scalar()
        .prop_recursive(4, 64, 6, |inner| {
            prop_oneof![
                document_of(inner.clone()).prop_map(Value::Document),
                prop::collection::vec(inner.clone(), 0..6).prop_map(|items| Value::array(items)),
                ("[a-z ]{0,10}", document_of(inner))
                    .prop_map(|(code, scope)| Value::CodeWithScope { code, scope }),
            ]
        })
        .boxed()
}

fn document() -> impl Strategy<Value = Document> {
    document_of(value())
}

proptest! {
    #[test]
    fn prop_decode_inverts_encode(doc in document()) {
        let bytes = encode_document(&doc).unwrap();
        let decoded = decode_document(&bytes).unwrap();
        prop_assert_eq!(&decoded, &doc);
        prop_assert!(decoded.keys().eq(doc.keys()));
    }

    #[test]
    fn prop_computed_size_matches_bytes(doc in document()) {
        let bytes = encode_document(&doc).unwrap();
        prop_assert_eq!(bytes.len(), calculate_document_size(&doc));
        prop_assert_eq!(&bytes[0..4], &(bytes.len() as i32).to_le_bytes()[..]);
        prop_assert_eq!(bytes.last().copied(), Some(0u8));
    }

    #[test]
    fn prop_truncated_input_is_rejected(doc in document(), cut in any::<prop::sample::Index>()) {
        let bytes = encode_document(&doc).unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(decode_document(&bytes[..cut]).is_err());
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_document(&bytes);
    }

    #[test]
    fn prop_split_batches_fit(docs in prop::collection::vec(document(), 1..20), max in 200usize..2000) {
        let options = EncodeOptions::new().with_max_message_size(max);
        let count = docs.len();
        if let Ok(batches) = InsertBody::split("db.c", docs, options) {
            prop_assert_eq!(batches.iter().map(|b| b.documents.len()).sum::<usize>(), count);
            for body in batches {
                let mut message = RequestMessage::new(body);
                let bytes = message.encode(options).unwrap();
                prop_assert!(bytes.len() <= max);
            }
        }
    }
}
