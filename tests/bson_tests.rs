//! BSON Codec Tests
//!
//! Exact encoding vectors, per-tag round trips, and reader behavior.

use mongowire::bson::{tag, BsonDocument, BsonValue, DocumentBuilder, ObjectId};
use mongowire::error::{DecodeError, EncodeError};

// =============================================================================
// Exact Encoding Vectors
// =============================================================================

#[test]
fn test_double_field_exact_bytes() {
    let mut builder = DocumentBuilder::new();
    builder.append_double("double", 42.0).unwrap();
    let doc = builder.finish().unwrap();

    #[rustfmt::skip]
    let expected = vec![
        0x15, 0x00, 0x00, 0x00,                         // total length 21
        0x01,                                           // double tag
        b'd', b'o', b'u', b'b', b'l', b'e', 0x00,       // field name
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x45, 0x40, // 42.0 LE
        0x00,                                           // terminator
    ];
    assert_eq!(doc.to_vec(), expected);
    assert_eq!(doc.byte_len().unwrap(), 21);
}

#[test]
fn test_string_field_size() {
    let mut builder = DocumentBuilder::new();
    builder.append_string("string", "fourty-two").unwrap();
    let doc = builder.finish().unwrap();

    // 4 + (1 + 7 + (4 + 10 + 1)) + 1
    assert_eq!(doc.to_vec().len(), 28);
    assert_eq!(doc.get_utf8("string").unwrap(), Some("fourty-two".into()));
}

#[test]
fn test_boolean_value_bytes() {
    let mut builder = DocumentBuilder::new();
    builder.append_bool("true", true).unwrap();
    builder.append_bool("false", false).unwrap();
    let doc = builder.finish().unwrap();

    let bytes = doc.to_vec();
    // 4 + (1 + 5 + 1) + (1 + 6 + 1) + 1
    assert_eq!(bytes.len(), 20);
    // value byte of "true" sits after its tag and name
    assert_eq!(bytes[4 + 1 + 5], 0x01);
    // value byte of "false" sits at the end, before the terminator
    assert_eq!(bytes[bytes.len() - 2], 0x00);
    assert_eq!(doc.get_bool("true").unwrap(), Some(true));
    assert_eq!(doc.get_bool("false").unwrap(), Some(false));
}

#[test]
fn test_regex_field_size() {
    let mut builder = DocumentBuilder::new();
    builder.append_regex("regex", "pattern", "ilmsux").unwrap();
    let doc = builder.finish().unwrap();

    // 4 + (1 + 6 + 8 + 7) + 1
    assert_eq!(doc.to_vec().len(), 27);
    assert_eq!(
        doc.get("regex").unwrap(),
        Some(BsonValue::Regex {
            pattern: "pattern".into(),
            options: "ilmsux".into()
        })
    );
}

#[test]
fn test_field_name_with_nul_rejected() {
    let mut builder = DocumentBuilder::new();
    assert_eq!(
        builder.append_int32("bad\0name", 1).unwrap_err(),
        EncodeError::InvalidFieldName
    );
}

#[test]
fn test_bad_regex_options_rejected() {
    let mut builder = DocumentBuilder::new();
    assert_eq!(
        builder.append_regex("r", "p", "fubar").unwrap_err(),
        EncodeError::InvalidRegexOptions("fubar".into())
    );
    // out-of-order letters from the valid set are also rejected
    let mut builder = DocumentBuilder::new();
    assert!(builder.append_regex("r", "p", "si").is_err());
}

// =============================================================================
// Round Trips
// =============================================================================

fn sample_values() -> Vec<(&'static str, BsonValue)> {
    let scope = {
        let mut b = DocumentBuilder::new();
        b.append_int32("x", 7).unwrap();
        b.finish().unwrap()
    };
    let embedded = {
        let mut b = DocumentBuilder::new();
        b.append_string("inner", "value").unwrap();
        b.finish().unwrap()
    };
    let oid = ObjectId::from_hex("507f191e810c19729de860ea").unwrap();

    vec![
        ("double", BsonValue::Double(-1.25)),
        ("string", BsonValue::String("héllo".into())),
        ("document", BsonValue::Document(embedded)),
        (
            "array",
            BsonValue::Array(vec![
                BsonValue::Int32(1),
                BsonValue::String("two".into()),
                BsonValue::Double(3.0),
            ]),
        ),
        (
            "binary",
            BsonValue::Binary {
                subtype: 0x02,
                payload: vec![0xde, 0xad, 0xbe, 0xef],
            },
        ),
        ("undefined", BsonValue::Undefined),
        ("objectid", BsonValue::ObjectId(oid)),
        ("boolean", BsonValue::Boolean(true)),
        ("datetime", BsonValue::DateTime(1_700_000_000_000)),
        ("null", BsonValue::Null),
        (
            "regex",
            BsonValue::Regex {
                pattern: "^a.*z$".into(),
                options: "im".into(),
            },
        ),
        (
            "dbpointer",
            BsonValue::DbPointer {
                namespace: "db.coll".into(),
                id: oid,
            },
        ),
        ("code", BsonValue::JsCode("function(){}".into())),
        ("symbol", BsonValue::Symbol("sym".into())),
        (
            "scoped",
            BsonValue::ScopedJsCode {
                code: "f(x)".into(),
                scope,
            },
        ),
        ("int32", BsonValue::Int32(i32::MIN)),
        ("timestamp", BsonValue::Timestamp(0x0102030405060708)),
        ("int64", BsonValue::Int64(i64::MAX)),
    ]
}

#[test]
fn test_every_tag_round_trips() {
    let values = sample_values();

    let mut builder = DocumentBuilder::new();
    for (name, value) in &values {
        builder.append(name, value).unwrap();
    }
    let doc = builder.finish().unwrap();
    doc.validate().unwrap();

    for (name, value) in &values {
        let parsed = doc.get(name).unwrap().unwrap_or_else(|| {
            panic!("field {name} missing after round trip");
        });
        assert_eq!(&parsed, value, "field {name}");
        assert_eq!(parsed.tag(), value.tag());
    }
}

#[test]
fn test_document_rebuild_is_byte_identical() {
    let mut builder = DocumentBuilder::new();
    for (name, value) in sample_values() {
        builder.append(&name, &value).unwrap();
    }
    let original = builder.finish().unwrap();

    let mut rebuilt = DocumentBuilder::new();
    for field in original.iter() {
        let (name, value) = field.unwrap();
        rebuilt.append(&name, &value).unwrap();
    }
    let rebuilt = rebuilt.finish().unwrap();

    assert_eq!(original.to_vec(), rebuilt.to_vec());
}

#[test]
fn test_iteration_reflects_wire_order() {
    let mut builder = DocumentBuilder::new();
    builder.append_int32("z", 1).unwrap();
    builder.append_int32("a", 2).unwrap();
    builder.append_int32("m", 3).unwrap();
    let doc = builder.finish().unwrap();

    let names: Vec<String> = doc.iter().map(|f| f.unwrap().0).collect();
    assert_eq!(names, ["z", "a", "m"]);
}

// =============================================================================
// Reader Behavior
// =============================================================================

#[test]
fn test_typed_accessors() {
    let mut builder = DocumentBuilder::new();
    builder.append_double("d", 1.5).unwrap();
    builder.append_int32("i", 42).unwrap();
    builder.append_int64("l", 43).unwrap();
    builder.append_datetime_ms("t", 99).unwrap();
    builder.append_binary("b", 0, b"xy").unwrap();
    let doc = builder.finish().unwrap();

    assert_eq!(doc.get_double("d").unwrap(), Some(1.5));
    assert_eq!(doc.get_int32("i").unwrap(), Some(42));
    assert_eq!(doc.get_int64("l").unwrap(), Some(43));
    assert_eq!(doc.get_datetime_ms("t").unwrap(), Some(99));
    assert_eq!(doc.get_binary("b").unwrap(), Some((0, b"xy".to_vec())));
    assert_eq!(doc.get_double("missing").unwrap(), None);
}

#[test]
fn test_type_mismatch() {
    let mut builder = DocumentBuilder::new();
    builder.append_double("field", 1.0).unwrap();
    let doc = builder.finish().unwrap();

    match doc.get_int32("field").unwrap_err() {
        DecodeError::TypeMismatch {
            name,
            expected,
            found,
        } => {
            assert_eq!(name, "field");
            assert_eq!(expected, tag::INT32);
            assert_eq!(found, tag::DOUBLE);
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
}

#[test]
fn test_duplicate_names_first_match_wins() {
    let mut builder = DocumentBuilder::new();
    builder.append_int32("dup", 1).unwrap();
    builder.append_int32("dup", 2).unwrap();
    let doc = builder.finish().unwrap();

    assert_eq!(doc.get_int32("dup").unwrap(), Some(1));
}

#[test]
fn test_contains() {
    let mut builder = DocumentBuilder::new();
    builder.append_null("present").unwrap();
    let doc = builder.finish().unwrap();

    assert!(doc.contains("present"));
    assert!(!doc.contains("absent"));
}

#[test]
fn test_nested_document_access() {
    let inner = {
        let mut b = DocumentBuilder::new();
        b.append_int32("depth", 2).unwrap();
        b.finish().unwrap()
    };
    let mut builder = DocumentBuilder::new();
    builder.append_document("nested", &inner).unwrap();
    let doc = builder.finish().unwrap();

    let nested = doc.get_document("nested").unwrap().unwrap();
    assert_eq!(nested.get_int32("depth").unwrap(), Some(2));
    assert_eq!(nested.to_vec(), inner.to_vec());
}

#[test]
fn test_array_keys_are_decimal_strings() {
    let mut builder = DocumentBuilder::new();
    builder
        .append_array(
            "arr",
            &[BsonValue::Int32(10), BsonValue::Int32(20), BsonValue::Int32(30)],
        )
        .unwrap();
    let doc = builder.finish().unwrap();

    // the array is itself a document keyed "0", "1", "2"
    let raw = doc.get("arr").unwrap().unwrap();
    assert_eq!(
        raw,
        BsonValue::Array(vec![
            BsonValue::Int32(10),
            BsonValue::Int32(20),
            BsonValue::Int32(30)
        ])
    );
    assert_eq!(doc.get_array("arr").unwrap().unwrap().len(), 3);
}

#[test]
fn test_unknown_tag_rejected() {
    // { <0x7f> "x" ... } is not a BSON document
    let bytes = vec![0x0a, 0x00, 0x00, 0x00, 0x7f, b'x', 0x00, 0x00, 0x00, 0x00];
    let doc = BsonDocument::from_vec(bytes);
    assert!(matches!(
        doc.get("x").unwrap_err(),
        DecodeError::BadTag(0x7f)
    ));
}

#[test]
fn test_truncated_document_rejected() {
    let mut builder = DocumentBuilder::new();
    builder.append_string("s", "hello").unwrap();
    let full = builder.finish().unwrap().to_vec();

    let cut = BsonDocument::from_vec(full[..full.len() - 4].to_vec());
    assert!(cut.validate().is_err());
}

#[test]
fn test_empty_document() {
    let doc = BsonDocument::empty();
    assert_eq!(doc.to_vec(), vec![5, 0, 0, 0, 0]);
    doc.validate().unwrap();
    assert_eq!(doc.iter().count(), 0);
}
