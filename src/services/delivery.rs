//! Transactional email delivery.
//!
//! Two templates: login access codes and the post-purchase download link.
//! Rendering is pure string substitution so it stays testable without a
//! network.

use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

use crate::config::EmailConfig;

const LOGIN_CODE_TEMPLATE: &str = include_str!("../../templates/login_code.html");
const DOWNLOAD_READY_TEMPLATE: &str = include_str!("../../templates/download_ready.html");

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("email delivery failed: {0}")]
    Send(String),
}

pub struct Mailer {
    resend: Resend,
    from: String,
}

impl Mailer {
    #[must_use]
    pub fn new(config: &EmailConfig) -> Self {
        Self { resend: Resend::new(&config.api_key), from: config.from.clone() }
    }

    /// Send a login access code.
    pub async fn send_login_code(&self, to_email: &str, code: &str) -> Result<(), DeliveryError> {
        let subject = "Your sign-in code";
        let html = render_login_code(to_email, code);
        self.send(to_email, subject, &html).await
    }

    /// Send the download link issued after a completed purchase.
    pub async fn send_download_link(
        &self,
        to_email: &str,
        product_name: &str,
        download_url: &str,
    ) -> Result<(), DeliveryError> {
        let subject = format!("Your {product_name} download is ready");
        let html = render_download_ready(product_name, download_url);
        self.send(to_email, &subject, &html).await
    }

    async fn send(&self, to_email: &str, subject: &str, html: &str) -> Result<(), DeliveryError> {
        let to = [to_email];
        let email = CreateEmailBaseOptions::new(&self.from, to, subject).with_html(html);
        self.resend
            .emails
            .send(email)
            .await
            .map_err(|e| DeliveryError::Send(e.to_string()))?;
        Ok(())
    }
}

#[must_use]
pub fn render_login_code(email: &str, code: &str) -> String {
    LOGIN_CODE_TEMPLATE
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

#[must_use]
pub fn render_download_ready(product_name: &str, download_url: &str) -> String {
    DOWNLOAD_READY_TEMPLATE
        .replace("{{PRODUCT}}", product_name)
        .replace("{{DOWNLOAD_URL}}", download_url)
}

#[cfg(test)]
#[path = "delivery_test.rs"]
mod tests;
