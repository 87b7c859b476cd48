use std::fmt;

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Reasons a stored token could not be read as a credential.
///
/// All of these are treated exactly like an expired token by the guard.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("expected 3 dot-separated segments, found {0}")]
    Malformed(usize),
    #[error("payload segment is not base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload is not a token payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// The subset of the token payload the console cares about.
///
/// `exp` is mandatory; a payload without it never validates.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Claims {
    /// Expiration instant in seconds since the epoch.
    pub exp: f64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// An opaque bearer token as issued by the registry on login.
///
/// The signature is never checked here: the console cannot hold the
/// server secret, so expiry is only used to skip obviously stale sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Credential(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decodes the middle segment of the token.
    pub fn claims(&self) -> Result<Claims, CredentialError> {
        let segments: Vec<&str> = self.0.split('.').collect();
        if segments.len() != 3 {
            return Err(CredentialError::Malformed(segments.len()));
        }

        let payload = decode_segment(segments[1])?;
        Ok(serde_json::from_slice::<Claims>(&payload)?)
    }

    /// True iff the payload decodes and `exp` lies strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.claims() {
            Ok(claims) => claims.exp * 1000.0 > now.timestamp_millis() as f64,
            Err(_) => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// The expiration instant, when the payload carries a representable one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let claims = self.claims().ok()?;
        if !claims.exp.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis((claims.exp * 1000.0) as i64)
    }
}

// Tokens are bearer secrets, keep them out of debug output and logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
}
