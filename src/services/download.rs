//! Download capability tokens.
//!
//! DESIGN
//! ======
//! A token is `base64url(payload) "." base64url(tag)` where the payload is a
//! small JSON claims object and the tag is an HMAC-SHA256 over the encoded
//! payload with a server-held secret. Fully self-contained: verification
//! needs no storage lookup, and `ring`'s `hmac::verify` compares in constant
//! time. There is no revocation — a token stays valid until its natural
//! expiry.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::hmac;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DownloadTokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
}

/// Claims carried inside a download token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadClaims {
    /// Who the capability was issued to (purchaser email).
    pub sub: String,
    /// Expiry, unix seconds.
    pub exp: i64,
}

pub struct DownloadTokens {
    key: hmac::Key,
    expiry: Duration,
}

impl DownloadTokens {
    #[must_use]
    pub fn new(secret: &str, expiry_days: u64) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            expiry: Duration::from_secs(expiry_days * 24 * 3600),
        }
    }

    /// Issue a token for `subject`, expiring after the configured window.
    #[must_use]
    pub fn issue(&self, subject: &str) -> String {
        self.issue_at(subject, unix_now())
    }

    fn issue_at(&self, subject: &str, now: i64) -> String {
        let claims = DownloadClaims {
            sub: subject.to_string(),
            exp: now + i64::try_from(self.expiry.as_secs()).unwrap_or(i64::MAX),
        };
        // Claims are plain strings and integers; serialization cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        let tag = hmac::sign(&self.key, encoded.as_bytes());
        format!("{encoded}.{}", URL_SAFE_NO_PAD.encode(tag.as_ref()))
    }

    /// Verify signature then expiry, returning the claims.
    ///
    /// # Errors
    ///
    /// Returns an error for structural problems, a bad tag, or expiry.
    pub fn verify(&self, token: &str) -> Result<DownloadClaims, DownloadTokenError> {
        self.verify_at(token, unix_now())
    }

    fn verify_at(&self, token: &str, now: i64) -> Result<DownloadClaims, DownloadTokenError> {
        let (encoded, tag) = token.split_once('.').ok_or(DownloadTokenError::Malformed)?;
        let tag_bytes = URL_SAFE_NO_PAD
            .decode(tag)
            .map_err(|_| DownloadTokenError::Malformed)?;

        hmac::verify(&self.key, encoded.as_bytes(), &tag_bytes).map_err(|_| DownloadTokenError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| DownloadTokenError::Malformed)?;
        let claims: DownloadClaims =
            serde_json::from_slice(&payload).map_err(|_| DownloadTokenError::Malformed)?;

        if claims.exp < now {
            return Err(DownloadTokenError::Expired);
        }
        Ok(claims)
    }
}

fn unix_now() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_secs()).unwrap_or(0)
}

#[cfg(test)]
#[path = "download_test.rs"]
mod tests;
