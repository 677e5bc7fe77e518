use super::*;

#[test]
fn status_codes_match_taxonomy() {
    assert_eq!(ApiError::Validation("bad".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::Auth.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ApiError::NotFound("conversation").status(), StatusCode::NOT_FOUND);
    assert_eq!(
        ApiError::RateLimited { limit: 10, remaining: 0, reset_at: 0 }.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(ApiError::QuotaExhausted { used: 50, limit: 50 }.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(ApiError::Integrity("invalid token").status(), StatusCode::FORBIDDEN);
    assert_eq!(ApiError::Upstream("model".into()).status(), StatusCode::BAD_GATEWAY);
    assert_eq!(ApiError::ServiceUnavailable("stripe").status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(ApiError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn quota_error_message_names_the_limit() {
    let err = ApiError::QuotaExhausted { used: 50, limit: 50 };
    assert!(err.to_string().contains("50"));
}

#[test]
fn not_found_names_the_resource() {
    assert_eq!(ApiError::NotFound("conversation").to_string(), "conversation not found");
}
