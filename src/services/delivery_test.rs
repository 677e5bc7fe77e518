use super::*;

#[test]
fn login_code_template_substitutes_both_fields() {
    let html = render_login_code("jane@example.com", "ABC234");
    assert!(html.contains("jane@example.com"));
    assert!(html.contains("ABC234"));
    assert!(!html.contains("{{"));
}

#[test]
fn download_template_substitutes_product_and_url() {
    let html = render_download_ready("LaunchKit Starter", "https://example.com/api/download?token=abc");
    assert!(html.contains("LaunchKit Starter"));
    assert!(html.contains("https://example.com/api/download?token=abc"));
    assert!(!html.contains("{{"));
}
