use chrono::{TimeDelta, Utc};
use clover::common::{Value, DOC_EXPIRES_AT, DOC_ID};
use clover::doc;
use clover::document::{decode, encode, validate, Document};
use clover::errors::ErrorKind;
use clover_int_test::test_util::{create_test_docs, parse_instant};
use serde::Deserialize;
use std::collections::HashMap;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_encoded_documents_survive_round_trip() {
    for doc in create_test_docs() {
        let copy = decode(encode(&doc).to_vec());
        assert!(!copy.is_materialized());
        assert_eq!(copy, doc);
        assert_eq!(copy.get("data").unwrap(), doc.get("data").unwrap());
        assert!(copy.is_materialized());
        validate(&copy).unwrap();
    }
}

#[test]
fn test_nested_paths() {
    let mut doc = doc! {
        location: {
            address: { zip: "00100", city: "Rome" },
        },
    };

    assert_eq!(doc.get("location.address.zip").unwrap(), Some(&Value::from("00100")));
    assert_eq!(doc.get("location.address.zip.code").unwrap(), None);
    assert_eq!(doc.get("location.street").unwrap(), None);

    doc.set("location.address.zip.code", 7).unwrap();
    assert_eq!(doc.get("location.address.zip.code").unwrap(), Some(&Value::I64(7)));
    assert_eq!(doc.get("location.address.city").unwrap(), Some(&Value::from("Rome")));
    assert_eq!(
        doc.fields(true).unwrap(),
        vec!["location.address.city", "location.address.zip.code"]
    );

    doc.set("location..city", 1).unwrap();
    assert_eq!(doc.get("location..city").unwrap(), Some(&Value::I64(1)));
    assert_eq!(doc.get("location.address.city").unwrap(), Some(&Value::from("Rome")));
}

#[test]
fn test_opaque_values_survive_round_trip() {
    let mut doc = doc! { _id: (uuid::Uuid::new_v4().to_string()) };
    doc.set("score", Value::opaque(Value::I64(1))).unwrap();
    doc.set("tags", Value::opaque(Value::Array(vec![Value::from("a")]))).unwrap();

    let copy = decode(encode(&doc).to_vec());
    assert_eq!(copy, doc);
    assert_eq!(copy.get("score").unwrap(), doc.get("score").unwrap());
}

#[test]
fn test_reserved_fields() {
    let mut doc = Document::new();
    assert_eq!(validate(&doc).unwrap_err().kind(), &ErrorKind::InvalidIdentifier);

    doc.set(DOC_ID, uuid::Uuid::new_v4().to_string()).unwrap();
    validate(&doc).unwrap();
    assert_eq!(doc.ttl().unwrap(), TimeDelta::milliseconds(-1));

    doc.set(DOC_EXPIRES_AT, "tomorrow").unwrap();
    assert_eq!(validate(&doc).unwrap_err().kind(), &ErrorKind::InvalidExpiration);

    doc.set_expires_at(Utc::now() + TimeDelta::hours(1)).unwrap();
    validate(&doc).unwrap();
    let ttl = doc.ttl().unwrap();
    assert!(ttl > TimeDelta::minutes(59) && ttl <= TimeDelta::hours(1));

    doc.set_expires_at(parse_instant("2001-01-01T00:00:00Z")).unwrap();
    assert_eq!(doc.ttl().unwrap(), TimeDelta::zero());
}

#[test]
fn test_set_all_keeps_applied_entries() {
    let mut doc = Document::new();
    let mut bad = HashMap::new();
    bad.insert(1u8, "one");
    let err = doc
        .set_all(vec![("a", HashMap::new()), ("b", bad), ("c", HashMap::new())])
        .unwrap_err();
    assert_eq!(err.kind(), &ErrorKind::InvalidMapKey);
    assert!(doc.has("a").unwrap());
    assert!(!doc.has("c").unwrap());
}

#[test]
fn test_null_fields_are_present() {
    let doc = doc! { note: (Option::<String>::None) };
    assert!(doc.has("note").unwrap());
    assert_eq!(doc.get("note").unwrap(), Some(&Value::Null));
}

#[test]
fn test_corrupted_bytes() {
    let doc = decode(vec![0xc1, 0x00]);
    assert_eq!(doc.get("a").unwrap_err().kind(), &ErrorKind::CorruptedDocument);
}

#[test]
fn test_unmarshal_into_application_type() {
    #[derive(Deserialize, Debug, PartialEq)]
    struct Person {
        first_name: String,
        last_name: String,
    }

    let doc = doc! { first_name: "fn1", last_name: "ln1", age: 31 };
    let person: Person = doc.unmarshal().unwrap();
    assert_eq!(
        person,
        Person {
            first_name: "fn1".to_string(),
            last_name: "ln1".to_string(),
        }
    );
}
