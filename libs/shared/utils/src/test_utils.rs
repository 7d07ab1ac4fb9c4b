use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::Claims;

/// Key the fixture IdP signs session tokens with. Nothing in the crate verifies it.
const FIXTURE_SIGNING_KEY: &str = "fixture-idp-signing-key";

pub struct TestConfig {
    pub idp_issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub internal_api_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            idp_issuer_url: "http://localhost:8089".to_string(),
            client_id: "test-admin-client".to_string(),
            client_secret: "test-admin-secret".to_string(),
            internal_api_key: "test-internal-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_issuer(issuer: &str) -> Self {
        Self {
            idp_issuer_url: issuer.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            idp_issuer_url: self.idp_issuer_url.clone(),
            idp_admin_client_id: self.client_id.clone(),
            idp_admin_client_secret: self.client_secret.clone(),
            idp_audience: AppConfig::default_audience(&self.idp_issuer_url),
            internal_api_key: self.internal_api_key.clone(),
            token_safety_margin_secs: 60,
            http_timeout_secs: 5,
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", "Test User")
    }
}

impl TestUser {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            id: format!("auth0|{}", Uuid::new_v4().simple()),
            email: email.to_string(),
            name: name.to_string(),
        }
    }

    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn to_claims(&self) -> Claims {
        Claims {
            sub: self.id.clone(),
            exp: Some((Utc::now() + Duration::hours(1)).timestamp()),
            iat: Some(Utc::now().timestamp()),
            email: Some(self.email.clone()),
            email_verified: Some(true),
            name: Some(self.name.clone()),
            nickname: None,
            picture: None,
            scope: Some("openid profile email".to_string()),
            aud: None,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "email_verified": true,
            "name": user.name,
            "scope": "openid profile email",
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        Self::sign(&payload)
    }

    pub fn create_expired_token(user: &TestUser) -> String {
        Self::create_test_token(user, Some(-1))
    }

    /// Three segments, valid base64url, but the payload is not JSON.
    pub fn create_malformed_token() -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = general_purpose::URL_SAFE_NO_PAD.encode("not-json-at-all");
        format!("{}.{}.c2lnbmF0dXJl", header, payload)
    }

    pub fn sign(payload: &Value) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(FIXTURE_SIGNING_KEY.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }
}

pub struct MockIdpResponses;

impl MockIdpResponses {
    pub fn token_response(access_token: &str, expires_in: u64) -> Value {
        json!({
            "access_token": access_token,
            "expires_in": expires_in,
            "scope": "read:users update:users",
            "token_type": "Bearer"
        })
    }

    /// A raw Management API user, including fields that must never reach the browser.
    pub fn user_response(user_id: &str, user_metadata: Value) -> Value {
        json!({
            "user_id": user_id,
            "email": "test@example.com",
            "email_verified": true,
            "name": "Test User",
            "nickname": "test",
            "picture": "https://cdn.example.com/avatar.png",
            "created_at": "2024-01-01T00:00:00.000Z",
            "updated_at": "2024-06-01T12:30:00.000Z",
            "last_login": "2024-06-01T12:30:00.000Z",
            "login_count": 12,
            "app_metadata": { "roles": ["member"] },
            "user_metadata": user_metadata,
            "identities": [{
                "provider": "auth0",
                "user_id": user_id.trim_start_matches("auth0|"),
                "connection": "Username-Password-Authentication",
                "isSocial": false,
                "access_token": "provider-access-token"
            }],
            "last_ip": "203.0.113.7",
            "logins_count": 12,
            "multifactor": ["guardian"],
            "password_hash": "$2b$10$abcdefghijklmnopqrstuv"
        })
    }

    pub fn error_response(status: u16, error: &str, message: &str) -> Value {
        json!({
            "statusCode": status,
            "error": error,
            "message": message
        })
    }
}
