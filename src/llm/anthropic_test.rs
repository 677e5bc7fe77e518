use super::*;

#[test]
fn message_start_yields_input_tokens() {
    let data = r#"{"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":42,"output_tokens":1}}}"#;
    let event = parse_event(data).unwrap();
    assert_eq!(event, Some(StreamEvent::MessageStart { input_tokens: 42 }));
}

#[test]
fn content_block_delta_yields_text() {
    let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#;
    let event = parse_event(data).unwrap();
    assert_eq!(event, Some(StreamEvent::TextDelta { text: "Hello".into() }));
}

#[test]
fn non_text_delta_is_skipped() {
    let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#;
    assert_eq!(parse_event(data).unwrap(), None);
}

#[test]
fn message_delta_yields_output_tokens() {
    let data = r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":128}}"#;
    let event = parse_event(data).unwrap();
    assert_eq!(event, Some(StreamEvent::MessageDelta { output_tokens: 128 }));
}

#[test]
fn message_stop_terminates() {
    let data = r#"{"type":"message_stop"}"#;
    assert_eq!(parse_event(data).unwrap(), Some(StreamEvent::MessageStop));
}

#[test]
fn ping_and_unknown_events_are_skipped() {
    assert_eq!(parse_event(r#"{"type":"ping"}"#).unwrap(), None);
    assert_eq!(parse_event(r#"{"type":"content_block_start","index":0}"#).unwrap(), None);
}

#[test]
fn provider_error_event_becomes_stream_error() {
    let data = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
    let err = parse_event(data).unwrap_err();
    assert!(matches!(err, LlmError::Stream(msg) if msg == "Overloaded"));
}

#[test]
fn malformed_json_is_a_parse_error() {
    let err = parse_event("{not json").unwrap_err();
    assert!(matches!(err, LlmError::StreamParse(_)));
}
