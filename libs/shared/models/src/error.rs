use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::MalformedToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TokenAcquisition(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Upstream { status, .. } => upstream_status(*status),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Pass the IdP status through unless it is not an error status, or it
/// describes our own M2M credentials (401/403) rather than the caller.
fn upstream_status(status: u16) -> StatusCode {
    match StatusCode::from_u16(status) {
        Ok(code) if code == StatusCode::UNAUTHORIZED || code == StatusCode::FORBIDDEN => {
            StatusCode::BAD_GATEWAY
        }
        Ok(code) if code.is_client_error() || code.is_server_error() => code,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::error!("Error: {}: {}", status, self);

        let body = match self {
            AppError::Upstream { message, details: Some(details), .. } => json!({
                "error": message,
                "details": details
            }),
            AppError::Upstream { message, .. } => json!({ "error": message }),
            AppError::Validation(msg)
            | AppError::NotAuthenticated(msg)
            | AppError::MalformedToken(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::TokenAcquisition(msg)
            | AppError::Internal(msg) => json!({ "error": msg }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: u16) -> AppError {
        AppError::Upstream {
            status,
            message: "idp failed".to_string(),
            details: None,
        }
    }

    #[test]
    fn test_upstream_status_passthrough() {
        assert_eq!(upstream(429).status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(upstream(503).status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(upstream(504).status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_upstream_credential_statuses_are_masked() {
        assert_eq!(upstream(401).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream(403).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream(302).status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_taxonomy_statuses() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::TokenAcquisition("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::MalformedToken("x".into()).status_code(), StatusCode::UNAUTHORIZED);
    }
}
