//! Application configuration parsed from environment variables.
//!
//! DESIGN
//! ======
//! One typed struct per optional subsystem. Only `DATABASE_URL` is required;
//! billing, download delivery, and email degrade gracefully when their env
//! vars are absent — the corresponding routes answer 503 instead of the
//! process refusing to start.

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_STRIPE_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_DOWNLOAD_EXPIRY_DAYS: u64 = 7;
const DEFAULT_PRODUCT_NAME: &str = "LaunchKit Starter";

/// Payment provider credentials plus the server-held price whitelist.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Only price ids in this list may be sent to checkout.
    pub allowed_price_ids: Vec<String>,
    pub api_base_url: String,
}

/// Signed download-link issuance for the purchased artifact.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub secret: String,
    /// Where the artifact actually lives (e.g. a release archive URL).
    pub artifact_url: String,
    pub expiry_days: u64,
    pub product_name: String,
}

/// Transactional email credentials.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Public base URL of this deployment; used in redirect and email links.
    pub app_base_url: String,
    /// When set, rate limiting uses the shared Redis store instead of the
    /// in-process one.
    pub redis_url: Option<String>,
    pub stripe: Option<StripeConfig>,
    pub download: Option<DownloadConfig>,
    pub email: Option<EmailConfig>,
}

impl AppConfig {
    /// Build the full application config from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or `PORT` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidValue { var: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };

        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_APP_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            database_url,
            port,
            app_base_url,
            redis_url: std::env::var("REDIS_URL").ok(),
            stripe: stripe_from_env(),
            download: download_from_env(),
            email: email_from_env(),
        })
    }
}

fn stripe_from_env() -> Option<StripeConfig> {
    let secret_key = std::env::var("STRIPE_SECRET_KEY").ok()?;
    let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").ok()?;
    let allowed_price_ids = parse_price_ids(&std::env::var("STRIPE_PRICE_IDS").ok()?);
    if allowed_price_ids.is_empty() {
        return None;
    }

    Some(StripeConfig {
        secret_key,
        webhook_secret,
        allowed_price_ids,
        api_base_url: std::env::var("STRIPE_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string(),
    })
}

/// Split the comma-separated price whitelist, dropping empty segments.
fn parse_price_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn download_from_env() -> Option<DownloadConfig> {
    let secret = std::env::var("DOWNLOAD_SECRET").ok()?;
    let artifact_url = std::env::var("DOWNLOAD_URL").ok()?;

    Some(DownloadConfig {
        secret,
        artifact_url,
        expiry_days: std::env::var("DOWNLOAD_EXPIRY_DAYS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_DOWNLOAD_EXPIRY_DAYS),
        product_name: std::env::var("PRODUCT_NAME").unwrap_or_else(|_| DEFAULT_PRODUCT_NAME.to_string()),
    })
}

fn email_from_env() -> Option<EmailConfig> {
    let api_key = std::env::var("RESEND_API_KEY").ok()?;
    let from = std::env::var("RESEND_FROM").ok()?;
    Some(EmailConfig { api_key, from })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
