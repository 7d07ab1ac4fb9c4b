use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_models::auth::UserIdentityRecord;

use crate::models::SessionError;
use crate::store::TokenStore;

/// Same-origin server endpoints the session gate depends on.
#[async_trait]
pub trait SessionApi: Send + Sync + 'static {
    async fn fetch_user_info(&self, user_id: &str) -> Result<UserIdentityRecord, SessionError>;

    async fn post_json(&self, endpoint: &str, body: Value) -> Result<Value, SessionError>;
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpSessionApi {
    client: Client,
    base_url: String,
    store: TokenStore,
}

impl HttpSessionApi {
    pub fn new(base_url: &str, store: TokenStore) -> Result<Self, SessionError> {
        Self::with_timeout(base_url, store, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        store: TokenStore,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
        })
    }

    async fn send(&self, endpoint: &str, body: &Value) -> Result<reqwest::Response, SessionError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Posting to {}", url);

        let response = self
            .client
            .post(&url)
            .headers(self.store.get_auth_headers())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("{} timed out", endpoint);
                    SessionError::Transport(format!("request to {} timed out", endpoint))
                } else {
                    SessionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string());

            error!("{} failed ({}): {}", endpoint, status, message);
            return Err(SessionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_user_info(&self, user_id: &str) -> Result<UserIdentityRecord, SessionError> {
        self.send("/user/info", &json!({ "userId": user_id }))
            .await?
            .json::<UserIdentityRecord>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }

    async fn post_json(&self, endpoint: &str, body: Value) -> Result<Value, SessionError> {
        self.send(endpoint, &body)
            .await?
            .json::<Value>()
            .await
            .map_err(|e| SessionError::Decode(e.to_string()))
    }
}
