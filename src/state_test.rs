use super::*;
use crate::state::test_helpers::*;

#[tokio::test]
async fn optional_subsystems_default_to_none() {
    let state = test_app_state();
    assert!(state.llm.is_none());
    assert!(state.stripe.is_none());
    assert!(state.download.is_none());
    assert!(state.mailer.is_none());
}

#[tokio::test]
async fn configured_subsystems_are_constructed() {
    let mut config = test_config();
    config.stripe = Some(crate::config::StripeConfig {
        secret_key: "sk_test".into(),
        webhook_secret: "whsec_test".into(),
        allowed_price_ids: vec!["price_pro".into()],
        api_base_url: "https://api.stripe.com".into(),
    });
    config.download = Some(crate::config::DownloadConfig {
        secret: "secret".into(),
        artifact_url: "https://example.com/kit.zip".into(),
        expiry_days: 7,
        product_name: "Kit".into(),
    });

    let base = test_app_state();
    let state = AppState::new(base.pool.clone(), config, None, base.rate_limiter.clone());
    assert!(state.stripe.is_some());
    assert!(state.download.is_some());
    assert!(state.mailer.is_none());
}
