use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use shared_models::auth::Claims;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedTokenError {
    #[error("Invalid token format")]
    Format,

    #[error("Invalid claims encoding")]
    Encoding,

    #[error("Invalid claims format: {0}")]
    Claims(String),

    #[error("Token has no subject")]
    MissingSubject,
}

/// Reads the claims out of a session token.
///
/// The signature is NOT verified. The IdP checked it at issuance and checks it
/// again on every protected call; the result is only fit for display and for
/// routing the current user's id.
pub fn decode_token(raw: &str) -> Result<Claims, MalformedTokenError> {
    let parts: Vec<&str> = raw.trim().split('.').collect();
    if parts.len() != 3 || parts.iter().take(2).any(|p| p.is_empty()) {
        return Err(MalformedTokenError::Format);
    }

    let claims_b64 = parts[1].trim_end_matches('=');

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|e| {
            debug!("Failed to decode claims segment: {}", e);
            MalformedTokenError::Encoding
        })?;

    let claims: Claims = serde_json::from_slice(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        MalformedTokenError::Claims(e.to_string())
    })?;

    if claims.sub.trim().is_empty() {
        return Err(MalformedTokenError::MissingSubject);
    }

    Ok(claims)
}

/// A token without `exp` never expires.
pub fn is_expired(claims: &Claims, now: DateTime<Utc>) -> bool {
    match claims.exp {
        Some(exp) => exp <= now.timestamp(),
        None => false,
    }
}
