use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, info};

use shared_models::auth::Claims;
use shared_utils::jwt::{decode_token, is_expired};

pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Client-local key/value storage the session token lives in.
pub trait TokenStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl TokenStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Holds the IdP-issued session token. Never talks to the network.
///
/// Every read re-checks `exp`; a token found expired is removed, so an expired
/// session is noticed on the next read rather than on the next failed call.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn TokenStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()))
    }

    pub fn set_token(&self, raw: &str) {
        self.storage.set(ACCESS_TOKEN_KEY, raw.trim());
    }

    pub fn clear(&self) {
        self.storage.remove(ACCESS_TOKEN_KEY);
    }

    /// Claims of the stored token, or `None` when it is missing, malformed or expired.
    pub fn claims(&self) -> Option<Claims> {
        let raw = self.storage.get(ACCESS_TOKEN_KEY)?;

        let claims = match decode_token(&raw) {
            Ok(claims) => claims,
            Err(e) => {
                debug!("Stored session token is unusable: {}", e);
                return None;
            }
        };

        if is_expired(&claims, Utc::now()) {
            info!("Session token for {} expired, clearing it", claims.sub);
            self.clear();
            return None;
        }

        Some(claims)
    }

    pub fn is_authenticated(&self) -> bool {
        self.claims().is_some()
    }

    pub fn get_user_id(&self) -> Option<String> {
        self.claims().map(|claims| claims.sub)
    }

    pub fn get_auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if self.claims().is_none() {
            return headers;
        }

        let value = self
            .storage
            .get(ACCESS_TOKEN_KEY)
            .and_then(|token| HeaderValue::from_str(&format!("Bearer {}", token)).ok());

        if let Some(value) = value {
            headers.insert(AUTHORIZATION, value);
        }

        headers
    }
}
