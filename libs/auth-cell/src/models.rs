use std::fmt;
use std::time::Duration;

#[cfg(not(test))]
use std::time::Instant;
#[cfg(test)]
use mock_instant::Instant;

use serde_json::Value;
use thiserror::Error;

use shared_config::AppConfig;
use shared_idp::IdpError;
use shared_models::error::AppError;

/// Lifetime the IdP applies when the token endpoint omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 86_400;

// ==============================================================================
// M2M TOKEN
// ==============================================================================

#[derive(Clone)]
pub struct M2mToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Duration,
    pub issued_at: Instant,
}

impl M2mToken {
    /// Usable while `now < issued_at + expires_in - margin`.
    pub fn is_fresh_at(&self, now: Instant, margin: Duration) -> bool {
        now < self.usable_until(margin)
    }

    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.is_fresh_at(Instant::now(), margin)
    }

    /// Remaining usable lifetime, zero once the token should be re-issued.
    pub fn remaining(&self, margin: Duration) -> Duration {
        let deadline = self.usable_until(margin);
        let now = Instant::now();
        if now < deadline {
            deadline.duration_since(now)
        } else {
            Duration::ZERO
        }
    }

    fn usable_until(&self, margin: Duration) -> Instant {
        self.issued_at + self.expires_in.saturating_sub(margin)
    }
}

impl fmt::Debug for M2mToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("M2mToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("issued_at", &self.issued_at)
            .finish()
    }
}

/// Admin client credentials, read from configuration only.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
}

impl ClientCredentials {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client_id: config.idp_admin_client_id.clone(),
            client_secret: config.idp_admin_client_secret.clone(),
            audience: config.idp_audience.clone(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.audience.is_empty()
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("audience", &self.audience)
            .finish()
    }
}

/// Externally visible broker state: `Empty -> Fetching -> Cached -> (expiry) Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerStatus {
    Empty,
    Fetching,
    Cached,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone)]
pub enum BrokerError {
    #[error("Management API credentials are not configured")]
    NotConfigured,

    #[error("Token acquisition failed: {message}")]
    TokenAcquisition {
        status: Option<u16>,
        message: String,
    },
}

impl From<IdpError> for BrokerError {
    fn from(err: IdpError) -> Self {
        BrokerError::TokenAcquisition {
            status: err.status(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ManagementError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl From<IdpError> for ManagementError {
    fn from(err: IdpError) -> Self {
        let status = match &err {
            IdpError::Status { status, .. } => *status,
            IdpError::Timeout(_) => 504,
            IdpError::Transport(_) | IdpError::Decode(_) | IdpError::InvalidHeader(_) => 502,
        };

        match err {
            IdpError::Status { message, body, .. } => ManagementError::Upstream {
                status,
                message,
                body,
            },
            other => ManagementError::Upstream {
                status,
                message: other.to_string(),
                body: None,
            },
        }
    }
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        AppError::TokenAcquisition(err.to_string())
    }
}

impl From<ManagementError> for AppError {
    fn from(err: ManagementError) -> Self {
        match err {
            ManagementError::Validation(message) => AppError::Validation(message),
            ManagementError::NotFound(user_id) => {
                AppError::NotFound(format!("User not found: {}", user_id))
            }
            ManagementError::Upstream { status, message, body } => AppError::Upstream {
                status,
                message,
                details: body,
            },
            ManagementError::Broker(err) => err.into(),
        }
    }
}
