//! Serialization tests for memo-core types.

use memo_core::Payload;
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    name: String,
    totals: Vec<u32>,
}

#[test]
fn test_structured_payload_envelope() {
    let payload = Payload::from(json!({"n": 1}));

    let json = serde_json::to_string(&payload).expect("serialize");
    assert_eq!(json, r#"{"kind":"value","data":{"n":1}}"#);

    let parsed: Payload = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(payload, parsed);
}

#[test]
fn test_bytes_payload_envelope() {
    let payload = Payload::Bytes(vec![0, 159, 146, 150]);

    let json = serde_json::to_string(&payload).expect("serialize");
    let parsed: Payload = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(parsed.as_bytes(), Some([0u8, 159, 146, 150].as_slice()));
}

#[test]
fn test_invalid_base64_is_rejected() {
    let result: Result<Payload, _> = serde_json::from_str(r#"{"kind":"bytes","data":"***"}"#);
    assert!(result.is_err());
}

#[test]
fn test_typed_value_through_payload() {
    let report = Report {
        name: "nightly".to_string(),
        totals: vec![3, 1, 4],
    };

    let payload = Payload::from_serialize(&report).expect("to payload");
    assert_eq!(payload.as_value().unwrap()["name"], json!("nightly"));

    let back: Report = payload.deserialize_into().expect("from payload");
    assert_eq!(back, report);
}
