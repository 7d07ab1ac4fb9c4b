use std::time::Duration;

use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::auth::{ClientCredentialsRequest, TokenEndpointResponse};

#[derive(Error, Debug, Clone)]
pub enum IdpError {
    #[error("IdP returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        body: Option<Value>,
    },

    #[error("IdP request timed out after {0:?}")]
    Timeout(Duration),

    #[error("IdP request failed: {0}")]
    Transport(String),

    #[error("Failed to decode IdP response: {0}")]
    Decode(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl IdpError {
    pub fn status(&self) -> Option<u16> {
        match self {
            IdpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct IdpClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl IdpClient {
    pub fn new(config: &AppConfig) -> Result<Self, IdpError> {
        Self::with_timeout(&config.idp_issuer_url, config.http_timeout())
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, IdpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdpError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn get_headers(&self, bearer: Option<&str>) -> Result<HeaderMap, IdpError> {
        let mut headers = HeaderMap::new();

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| IdpError::InvalidHeader("authorization".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<&Value>,
    ) -> Result<T, IdpError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let headers = self.get_headers(bearer)?;

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(body_data);
        }

        let response = req.send().await.map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("IdP API error ({}) on {}: {}", status, path, error_text);

            let body = serde_json::from_str::<Value>(&error_text)
                .ok()
                .or_else(|| (!error_text.is_empty()).then(|| Value::String(error_text.clone())));

            return Err(IdpError::Status {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| IdpError::Decode(e.to_string()))
    }

    /// Exchanges the admin client credentials at `POST /oauth/token`.
    pub async fn request_client_credentials(
        &self,
        request: &ClientCredentialsRequest<'_>,
    ) -> Result<TokenEndpointResponse, IdpError> {
        let body = serde_json::to_value(request).map_err(|e| IdpError::Decode(e.to_string()))?;

        self.request(Method::POST, "/oauth/token", None, Some(&body))
            .await
    }

    /// Management API path for a single user. IdP user ids contain `|`.
    pub fn user_path(user_id: &str) -> String {
        format!("/api/v2/users/{}", urlencoding::encode(user_id))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_transport(&self, err: reqwest::Error) -> IdpError {
        if err.is_timeout() {
            IdpError::Timeout(self.timeout)
        } else {
            IdpError::Transport(err.to_string())
        }
    }
}

/// Pulls a human readable message out of an IdP error body.
fn error_message(body: &Option<Value>) -> Option<String> {
    match body {
        Some(Value::Object(map)) => ["message", "error_description", "error"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    }
}
