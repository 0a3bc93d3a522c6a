use super::*;

fn sample_frame() -> Frame {
    Frame {
        id: "id-1".to_owned(),
        parent_id: Some("parent-1".to_owned()),
        ts: 42,
        session_id: Some("session-1".to_owned()),
        from: Some("user-1".to_owned()),
        syscall: "whiteboard:update".to_owned(),
        status: Status::Done,
        data: serde_json::json!({
            "x": 1.25,
            "ok": true,
            "tags": ["a", "b"],
            "nested": {"k": "v"},
            "nil": null
        }),
    }
}

#[test]
fn status_numeric_mapping_matches_wire_enum() {
    assert_eq!(Status::Request.as_i32(), 0);
    assert_eq!(Status::Done.as_i32(), 1);
    assert_eq!(Status::Error.as_i32(), 2);
}

#[test]
fn status_from_wire_rejects_out_of_range_value() {
    let err = Status::from_i32(99).expect_err("status should be invalid");
    assert!(matches!(err, CodecError::InvalidStatus(99)));
}

#[test]
fn encode_decode_preserves_frame() {
    let frame = sample_frame();
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode should succeed");
    assert_eq!(decoded, frame);
}

#[test]
fn decode_frame_rejects_malformed_bytes() {
    let err = decode_frame(&[0xff, 0x00, 0x01]).expect_err("bytes should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_frame_rejects_invalid_wire_status() {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        parent_id: None,
        ts: 1,
        session_id: None,
        from: None,
        syscall: "signal:join-room".to_owned(),
        status: 77,
        data: Some(json_to_proto_value(&serde_json::json!({}))),
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let err = decode_frame(&bytes).expect_err("status should fail");
    assert!(matches!(err, CodecError::InvalidStatus(77)));
}

#[test]
fn decode_frame_defaults_missing_data_to_empty_object() {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        parent_id: None,
        ts: 1,
        session_id: None,
        from: None,
        syscall: "whiteboard:clear".to_owned(),
        status: Status::Request.as_i32(),
        data: None,
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let frame = decode_frame(&bytes).expect("decode");
    assert_eq!(frame.data, serde_json::json!({}));
}

#[test]
fn decode_frame_converts_nan_number_to_json_null() {
    let wire = WireFrame {
        id: "id-1".to_owned(),
        parent_id: None,
        ts: 1,
        session_id: None,
        from: None,
        syscall: "room:chat-message".to_owned(),
        status: Status::Request.as_i32(),
        data: Some(prost_types::Value { kind: Some(prost_types::value::Kind::NumberValue(f64::NAN)) }),
    };
    let mut bytes = Vec::new();
    wire.encode(&mut bytes).expect("encode");

    let frame = decode_frame(&bytes).expect("decode");
    assert_eq!(frame.data, Value::Null);
}

#[test]
fn integer_json_numbers_come_back_as_floats() {
    let frame = Frame::request("room:participants-update", serde_json::json!({"count": 2}));
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.data.get("count"), Some(&serde_json::json!(2.0)));
}

#[test]
fn snapshot_strings_survive_the_codec_byte_for_byte() {
    let snapshot = r#"{"objects":[{"id":"a","x":1,"y":2}]}"#;
    let frame = Frame::request(syscall::WHITEBOARD_UPDATE, serde_json::json!({"data": snapshot}));
    let decoded = decode_frame(&encode_frame(&frame)).expect("decode");
    assert_eq!(decoded.str_field("data"), Some(snapshot));
}

#[test]
fn request_builder_sets_routing_fields() {
    let frame = Frame::request(syscall::JOIN_ROOM, serde_json::json!({}))
        .with_session("s-1")
        .with_from("u-1");
    assert_eq!(frame.status, Status::Request);
    assert_eq!(frame.session_id.as_deref(), Some("s-1"));
    assert_eq!(frame.from.as_deref(), Some("u-1"));
    assert!(frame.parent_id.is_none());
    assert!(frame.ts > 0);
    assert!(!frame.id.is_empty());
}

#[test]
fn prefix_splits_on_first_colon() {
    let frame = Frame::request(syscall::RECEIVING_RETURNED_SIGNAL, Value::Null);
    assert_eq!(frame.prefix(), "signal");

    let frame = Frame::request("noseparator", Value::Null);
    assert_eq!(frame.prefix(), "noseparator");
}

#[test]
fn status_serializes_as_lowercase_json() {
    assert_eq!(serde_json::to_string(&Status::Request).expect("serialize"), "\"request\"");
    assert_eq!(serde_json::from_str::<Status>("\"error\"").expect("deserialize"), Status::Error);
    assert!(serde_json::from_str::<Status>("\"Error\"").is_err());
}
