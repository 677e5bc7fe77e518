use super::*;

fn with_env<T>(key: &str, value: Option<&str>, f: impl FnOnce() -> T) -> T {
    let previous = std::env::var(key).ok();
    match value {
        Some(v) => unsafe { std::env::set_var(key, v) },
        None => unsafe { std::env::remove_var(key) },
    }
    let result = f();
    match previous {
        Some(v) => unsafe { std::env::set_var(key, v) },
        None => unsafe { std::env::remove_var(key) },
    }
    result
}

#[test]
fn env_bool_parses_common_spellings() {
    with_env("AUTH_TEST_FLAG", Some("yes"), || {
        assert_eq!(env_bool("AUTH_TEST_FLAG"), Some(true));
    });
    with_env("AUTH_TEST_FLAG", Some("0"), || {
        assert_eq!(env_bool("AUTH_TEST_FLAG"), Some(false));
    });
    with_env("AUTH_TEST_FLAG", Some("maybe"), || {
        assert_eq!(env_bool("AUTH_TEST_FLAG"), None);
    });
    with_env("AUTH_TEST_FLAG", None, || {
        assert_eq!(env_bool("AUTH_TEST_FLAG"), None);
    });
}

#[test]
fn verification_failure_maps_to_auth_error() {
    let err = map_email_auth_error(email_auth::EmailAuthError::VerificationFailed);
    assert!(matches!(err, ApiError::Auth));
}

#[test]
fn invalid_input_maps_to_validation() {
    assert!(matches!(
        map_email_auth_error(email_auth::EmailAuthError::InvalidEmail),
        ApiError::Validation(_)
    ));
    assert!(matches!(
        map_email_auth_error(email_auth::EmailAuthError::InvalidCode),
        ApiError::Validation(_)
    ));
}

#[test]
fn session_cookie_is_http_only_and_lax() {
    let cookie = session_cookie("tok".into(), true);
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.secure(), Some(true));
    assert_eq!(cookie.same_site(), Some(axum_extra::extract::cookie::SameSite::Lax));
}
