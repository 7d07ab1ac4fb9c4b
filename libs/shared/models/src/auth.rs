use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `aud` is either a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

/// Identity attributes carried in the payload of an IdP-issued session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub picture: Option<String>,
    pub scope: Option<String>,
    pub aud: Option<Audience>,
}

impl Claims {
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Body sent to the IdP token endpoint for the client-credentials grant.
#[derive(Serialize)]
pub struct ClientCredentialsRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub audience: &'a str,
    pub grant_type: &'a str,
}

/// Response of the IdP token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenEndpointResponse {
    pub access_token: String,
    pub expires_in: Option<u64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Response of the internal `/auth/management-token` route.
#[derive(Debug, Serialize, Deserialize)]
pub struct ManagementTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Identity user ids are strings for most providers, numbers for a few social ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdentityUserId {
    Text(String),
    Numeric(i64),
}

/// A linked identity. Provider tokens the IdP may attach are never deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub provider: String,
    pub user_id: Option<IdentityUserId>,
    pub connection: Option<String>,
    #[serde(rename = "isSocial", alias = "is_social")]
    pub is_social: Option<bool>,
}

/// The subset of an IdP user profile that may leave the server.
///
/// Deserializing a raw Management API response into this type drops every
/// field not listed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentityRecord {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub picture: Option<String>,
    pub email_verified: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: Option<u64>,
    pub app_metadata: Option<Value>,
    pub user_metadata: Option<Value>,
    #[serde(default)]
    pub identities: Vec<Identity>,
}

impl UserIdentityRecord {
    /// Basic profile derived from token claims, used when the IdP cannot be reached.
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            email: claims.email.clone(),
            name: claims.name.clone(),
            nickname: claims.nickname.clone(),
            picture: claims.picture.clone(),
            email_verified: claims.email_verified,
            created_at: None,
            updated_at: None,
            last_login: None,
            login_count: None,
            app_metadata: None,
            user_metadata: None,
            identities: Vec::new(),
        }
    }

    pub fn metadata_value(&self, key: &str) -> Option<&Value> {
        self.user_metadata.as_ref().and_then(|m| m.get(key))
    }
}

/// Body of `POST /auth/update-metadata`. Both fields are optional so that
/// missing input is reported as a validation error instead of a rejection.
#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub user_metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UserInfoRequest {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_drops_unknown_fields() {
        let raw = json!({
            "user_id": "auth0|abc",
            "email": "user@example.com",
            "email_verified": true,
            "created_at": "2024-01-01T00:00:00.000Z",
            "login_count": 7,
            "user_metadata": { "plan": "pro" },
            "last_ip": "10.0.0.1",
            "multifactor": ["guardian"],
            "identities": [{
                "provider": "google-oauth2",
                "user_id": "1234",
                "connection": "google-oauth2",
                "isSocial": true,
                "access_token": "provider-secret"
            }]
        });

        let record: UserIdentityRecord = serde_json::from_value(raw).unwrap();
        let out = serde_json::to_value(&record).unwrap();

        assert!(out.get("last_ip").is_none());
        assert!(out.get("multifactor").is_none());
        assert!(out["identities"][0].get("access_token").is_none());
        assert_eq!(out["identities"][0]["isSocial"], true);
        assert_eq!(record.login_count, Some(7));
        assert_eq!(record.metadata_value("plan"), Some(&json!("pro")));
    }

    #[test]
    fn test_numeric_identity_user_id() {
        let identity: Identity = serde_json::from_value(json!({
            "provider": "github",
            "user_id": 42,
            "isSocial": true
        }))
        .unwrap();
        assert_eq!(identity.user_id, Some(IdentityUserId::Numeric(42)));
    }

    #[test]
    fn test_record_from_claims() {
        let claims = Claims {
            sub: "auth0|xyz".to_string(),
            exp: None,
            iat: None,
            email: Some("a@b.c".to_string()),
            email_verified: Some(false),
            name: Some("Ada".to_string()),
            nickname: None,
            picture: None,
            scope: Some("openid profile email".to_string()),
            aud: Some(Audience::Multiple(vec!["a".into(), "b".into()])),
        };

        let record = UserIdentityRecord::from_claims(&claims);
        assert_eq!(record.user_id, "auth0|xyz");
        assert_eq!(record.name.as_deref(), Some("Ada"));
        assert!(record.identities.is_empty());
        assert_eq!(claims.scopes(), vec!["openid", "profile", "email"]);
    }
}
