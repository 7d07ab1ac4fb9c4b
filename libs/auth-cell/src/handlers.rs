use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use shared_models::auth::{
    ManagementTokenResponse, UpdateMetadataRequest, UserIdentityRecord, UserInfoRequest,
};
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;
use shared_utils::jwt::{decode_token, is_expired};

use crate::services::management::validate_update;
use crate::state::AuthState;

// Requests carrying a session token may only address their own user.
fn ensure_caller_matches(headers: &HeaderMap, user_id: &str) -> Result<(), AppError> {
    if !headers.contains_key(axum::http::header::AUTHORIZATION) {
        return Ok(());
    }

    let token = extract_bearer_token(headers)?;
    let claims = decode_token(&token).map_err(|e| AppError::MalformedToken(e.to_string()))?;

    if is_expired(&claims, Utc::now()) {
        return Err(AppError::NotAuthenticated("Session token has expired".to_string()));
    }

    if claims.sub != user_id {
        return Err(AppError::Forbidden(
            "Session does not belong to the requested user".to_string(),
        ));
    }

    Ok(())
}

fn body_or_validation<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Internal route: hands a short-lived Management API token to trusted
/// server-side callers. Guarded by the internal key middleware.
pub async fn issue_management_token(
    State(state): State<Arc<AuthState>>,
) -> Result<Json<ManagementTokenResponse>, AppError> {
    debug!("Issuing management token to internal caller");

    let token = state.broker.get_management_token().await?;

    Ok(Json(ManagementTokenResponse {
        expires_in: token.remaining(state.broker.safety_margin()).as_secs(),
        access_token: token.access_token,
        token_type: token.token_type,
    }))
}

pub async fn update_metadata(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Result<Json<UpdateMetadataRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = body_or_validation(payload)?;

    let user_id = request.user_id.unwrap_or_default();
    let metadata_patch = request.user_metadata.unwrap_or(Value::Null);

    validate_update(&user_id, &metadata_patch)?;
    ensure_caller_matches(&headers, &user_id)?;

    let user = state
        .management
        .update_user_metadata(&user_id, metadata_patch)
        .await?;

    Ok(Json(json!({
        "success": true,
        "user": user
    })))
}

pub async fn get_user_info(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    Query(query): Query<UserInfoRequest>,
) -> Result<Json<UserIdentityRecord>, AppError> {
    fetch_user_info(&state, &headers, query.user_id).await
}

pub async fn post_user_info(
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Result<Json<UserInfoRequest>, JsonRejection>,
) -> Result<Json<UserIdentityRecord>, AppError> {
    let request = body_or_validation(payload)?;
    fetch_user_info(&state, &headers, request.user_id).await
}

async fn fetch_user_info(
    state: &AuthState,
    headers: &HeaderMap,
    user_id: Option<String>,
) -> Result<Json<UserIdentityRecord>, AppError> {
    let user_id = user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::Validation("userId is required".to_string()))?;

    ensure_caller_matches(headers, &user_id)?;

    let record = state.management.get_user_info(&user_id).await?;
    Ok(Json(record))
}

pub async fn health_check(State(state): State<Arc<AuthState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "idp_configured": state.config.is_configured()
    }))
}
