use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use shared_config::AppConfig;
use shared_models::error::AppError;

pub const INTERNAL_API_KEY_HEADER: &str = "x-internal-api-key";

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| AppError::NotAuthenticated("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::NotAuthenticated("Invalid authorization header format".to_string()))?;

    match auth_value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::NotAuthenticated("Invalid authorization header format".to_string())),
    }
}

// Guards routes that hand out admin credentials. Disabled entirely when no key is configured.
pub async fn internal_key_middleware(
    State(config): State<Arc<AppConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if !config.is_internal_endpoint_enabled() {
        return Err(AppError::Forbidden("Internal endpoint is disabled".to_string()));
    }

    let provided = request
        .headers()
        .get(INTERNAL_API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq(provided.as_bytes(), config.internal_api_key.as_bytes()) {
        warn!("Rejected internal request with missing or wrong API key");
        return Err(AppError::Forbidden("Invalid internal API key".to_string()));
    }

    Ok(next.run(request).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
