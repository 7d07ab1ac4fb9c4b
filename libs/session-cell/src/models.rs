use serde::Serialize;
use thiserror::Error;

use shared_models::auth::UserIdentityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Init,
    Loading,
    Authenticated,
    Unauthenticated,
}

/// Where the current `userInfo` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoSource {
    Claims,
    Idp,
}

/// What the presentation layer renders from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub user_id: Option<String>,
    pub user_info: Option<UserIdentityRecord>,
    pub is_logged_in: bool,
    pub is_loading: bool,
    pub phase: SessionPhase,
    pub info_source: Option<InfoSource>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            user_id: None,
            user_info: None,
            is_logged_in: false,
            is_loading: false,
            phase: SessionPhase::Init,
            info_source: None,
        }
    }
}

/// Outcome of reading the token store. The gate never navigates itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSignal {
    RedirectToLogin,
    Anonymous,
    Ready,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_serializes_camel_case() {
        let view = SessionView {
            user_id: Some("u1".to_string()),
            is_logged_in: true,
            phase: SessionPhase::Authenticated,
            info_source: Some(InfoSource::Claims),
            ..SessionView::default()
        };

        let out = serde_json::to_value(&view).unwrap();
        assert_eq!(out["userId"], "u1");
        assert_eq!(out["isLoggedIn"], true);
        assert_eq!(out["isLoading"], false);
        assert_eq!(out["phase"], "authenticated");
        assert_eq!(out["infoSource"], "claims");
        assert!(out["userInfo"].is_null());
    }
}
