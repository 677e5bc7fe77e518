use super::*;

fn tokens() -> DownloadTokens {
    DownloadTokens::new("test-secret", 7)
}

#[test]
fn round_trip_returns_the_subject() {
    let issuer = tokens();
    let token = issuer.issue("buyer@example.com");
    let claims = issuer.verify(&token).unwrap();
    assert_eq!(claims.sub, "buyer@example.com");
}

#[test]
fn expiry_is_seven_days_out() {
    let issuer = tokens();
    let now = 1_700_000_000;
    let token = issuer.issue_at("buyer@example.com", now);
    let claims = issuer.verify_at(&token, now).unwrap();
    assert_eq!(claims.exp, now + 7 * 24 * 3600);
}

#[test]
fn expired_tokens_are_rejected() {
    let issuer = tokens();
    let now = 1_700_000_000;
    let token = issuer.issue_at("buyer@example.com", now);
    let err = issuer
        .verify_at(&token, now + 7 * 24 * 3600 + 1)
        .unwrap_err();
    assert_eq!(err, DownloadTokenError::Expired);
}

#[test]
fn any_single_bit_mutation_invalidates() {
    let issuer = tokens();
    let token = issuer.issue("buyer@example.com");
    let bytes = token.as_bytes();

    for i in 0..bytes.len() {
        let mut mutated = bytes.to_vec();
        mutated[i] ^= 0x01;
        let Ok(mutated) = String::from_utf8(mutated) else {
            continue;
        };
        assert!(issuer.verify(&mutated).is_err(), "mutation at byte {i} was accepted");
    }
}

#[test]
fn wrong_secret_is_rejected() {
    let token = tokens().issue("buyer@example.com");
    let other = DownloadTokens::new("different-secret", 7);
    assert_eq!(other.verify(&token).unwrap_err(), DownloadTokenError::InvalidSignature);
}

#[test]
fn structurally_broken_tokens_are_malformed() {
    let issuer = tokens();
    assert_eq!(issuer.verify("no-dot-here").unwrap_err(), DownloadTokenError::Malformed);
    assert_eq!(issuer.verify("a.b!!!").unwrap_err(), DownloadTokenError::Malformed);
    assert_eq!(issuer.verify("").unwrap_err(), DownloadTokenError::Malformed);
}

#[test]
fn tokens_are_redeemable_repeatedly_before_expiry() {
    let issuer = tokens();
    let token = issuer.issue("buyer@example.com");
    assert!(issuer.verify(&token).is_ok());
    assert!(issuer.verify(&token).is_ok());
}
