use super::*;

const SECRET: &str = "whsec_test";
const NOW: i64 = 1_700_000_000;

fn signed_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    format!("t={timestamp},v1={}", sign_payload(payload, secret, timestamp))
}

// =========================================================================
// signature verification
// =========================================================================

#[test]
fn correctly_signed_payload_verifies() {
    let payload = br#"{"id":"evt_123"}"#;
    let header = signed_header(payload, SECRET, NOW);
    assert!(verify_webhook_signature(payload, &header, SECRET, NOW).is_ok());
}

#[test]
fn wrong_secret_is_rejected() {
    let payload = br#"{"id":"evt_123"}"#;
    let header = signed_header(payload, "whsec_other", NOW);
    assert!(matches!(
        verify_webhook_signature(payload, &header, SECRET, NOW),
        Err(BillingError::InvalidSignature)
    ));
}

#[test]
fn tampered_payload_is_rejected() {
    let payload = br#"{"id":"evt_123"}"#;
    let header = signed_header(payload, SECRET, NOW);
    assert!(matches!(
        verify_webhook_signature(br#"{"id":"evt_666"}"#, &header, SECRET, NOW),
        Err(BillingError::InvalidSignature)
    ));
}

#[test]
fn stale_timestamp_is_rejected() {
    let payload = br#"{"id":"evt_123"}"#;
    let header = signed_header(payload, SECRET, NOW - SIGNATURE_TOLERANCE_SECS - 1);
    assert!(matches!(
        verify_webhook_signature(payload, &header, SECRET, NOW),
        Err(BillingError::StaleTimestamp)
    ));
}

#[test]
fn timestamp_inside_tolerance_is_accepted() {
    let payload = br#"{"id":"evt_123"}"#;
    let header = signed_header(payload, SECRET, NOW - SIGNATURE_TOLERANCE_SECS + 5);
    assert!(verify_webhook_signature(payload, &header, SECRET, NOW).is_ok());
}

#[test]
fn header_without_timestamp_or_tag_is_malformed() {
    let payload = b"{}";
    assert!(matches!(
        verify_webhook_signature(payload, "v1=abcd", SECRET, NOW),
        Err(BillingError::MalformedHeader)
    ));
    assert!(matches!(
        verify_webhook_signature(payload, "t=1700000000", SECRET, NOW),
        Err(BillingError::MalformedHeader)
    ));
    assert!(matches!(
        verify_webhook_signature(payload, "", SECRET, NOW),
        Err(BillingError::MalformedHeader)
    ));
}

#[test]
fn any_matching_v1_candidate_passes() {
    // Secret rotation sends two v1 entries; one valid match suffices.
    let payload = br#"{"id":"evt_123"}"#;
    let good = sign_payload(payload, SECRET, NOW);
    let header = format!("t={NOW},v1={},v1={good}", "00".repeat(32));
    assert!(verify_webhook_signature(payload, &header, SECRET, NOW).is_ok());
}

#[test]
fn hex_decoding_rejects_odd_and_non_hex() {
    assert_eq!(hex_to_bytes("abc"), None);
    assert_eq!(hex_to_bytes("zz"), None);
    assert_eq!(hex_to_bytes("00ff"), Some(vec![0x00, 0xff]));
}

// =========================================================================
// event parsing
// =========================================================================

#[test]
fn event_envelope_parses() {
    let payload = br#"{
        "id": "evt_123",
        "type": "checkout.session.completed",
        "data": { "object": { "id": "cs_1", "customer": "cus_1" } }
    }"#;
    let event = parse_webhook_event(payload).unwrap();
    assert_eq!(event.id, "evt_123");
    assert_eq!(event.kind, "checkout.session.completed");
    assert_eq!(event.data.object["customer"], "cus_1");
}

#[test]
fn malformed_event_body_errors() {
    assert!(matches!(
        parse_webhook_event(b"not json"),
        Err(BillingError::MalformedPayload(_))
    ));
    assert!(matches!(
        parse_webhook_event(br#"{"id":"evt_1"}"#),
        Err(BillingError::MalformedPayload(_))
    ));
}

#[test]
fn subscription_response_parses_nested_price() {
    let body = r#"{
        "id": "sub_1",
        "current_period_end": 1735689600,
        "items": { "data": [ { "price": { "id": "price_pro" } } ] }
    }"#;
    let sub: SubscriptionResponse = serde_json::from_str(body).unwrap();
    assert_eq!(sub.id, "sub_1");
    assert_eq!(sub.items.data[0].price.id, "price_pro");
    assert_eq!(sub.current_period_end, 1_735_689_600);
}
