use std::sync::Arc;
use std::time::Duration;

#[cfg(not(test))]
use std::time::Instant;
#[cfg(test)]
use mock_instant::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use shared_config::AppConfig;
use shared_idp::IdpClient;
use shared_models::auth::ClientCredentialsRequest;

use crate::models::{
    BrokerError, BrokerStatus, ClientCredentials, M2mToken, DEFAULT_TOKEN_LIFETIME_SECS,
};

type TokenFetch = Shared<BoxFuture<'static, Result<M2mToken, BrokerError>>>;

enum BrokerState {
    Empty,
    Fetching { generation: u64, fetch: TokenFetch },
    Cached(M2mToken),
}

struct BrokerInner {
    state: BrokerState,
    generation: u64,
}

/// Exchanges the admin client credentials for a Management API token and
/// caches it for its lifetime.
///
/// One broker is built at startup and shared by `Arc`. Concurrent callers that
/// find no usable token join the same in-flight request, so the token endpoint
/// sees at most one exchange at a time. Failures are returned to every waiter
/// and never retried here.
pub struct ManagementTokenBroker {
    idp: IdpClient,
    credentials: Arc<ClientCredentials>,
    safety_margin: Duration,
    inner: Arc<Mutex<BrokerInner>>,
}

impl ManagementTokenBroker {
    pub fn new(idp: IdpClient, credentials: ClientCredentials, safety_margin: Duration) -> Self {
        Self {
            idp,
            credentials: Arc::new(credentials),
            safety_margin,
            inner: Arc::new(Mutex::new(BrokerInner {
                state: BrokerState::Empty,
                generation: 0,
            })),
        }
    }

    pub fn from_config(idp: IdpClient, config: &AppConfig) -> Self {
        Self::new(
            idp,
            ClientCredentials::from_config(config),
            config.token_safety_margin(),
        )
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Must be called from within a Tokio runtime: the exchange runs on a
    /// spawned task so it settles the cache even if every caller is dropped.
    pub async fn get_management_token(&self) -> Result<M2mToken, BrokerError> {
        let started = Instant::now();

        loop {
            let (joined, fetch) = {
                let mut inner = self.inner.lock().await;

                match &inner.state {
                    BrokerState::Cached(token) if token.is_fresh(self.safety_margin) => {
                        debug!("Reusing cached management token");
                        return Ok(token.clone());
                    }
                    BrokerState::Fetching { fetch, .. } => {
                        debug!("Joining in-flight management token request");
                        (true, fetch.clone())
                    }
                    _ => {
                        if !self.credentials.is_complete() {
                            error!("Management token requested but admin credentials are not configured");
                            return Err(BrokerError::NotConfigured);
                        }

                        inner.generation += 1;
                        let generation = inner.generation;
                        let fetch = self.spawn_fetch(generation);

                        inner.state = BrokerState::Fetching {
                            generation,
                            fetch: fetch.clone(),
                        };
                        (false, fetch)
                    }
                }
            };

            let result = fetch.await;

            // A joined fetch may have been issued long before this call
            if let Ok(token) = &result {
                if joined && token.issued_at < started && !token.is_fresh(self.safety_margin) {
                    debug!("Joined fetch returned a stale token, requesting a new one");
                    continue;
                }
            }

            return result;
        }
    }

    // The task writes the outcome back itself, so settlement never depends on a waiter
    fn spawn_fetch(&self, generation: u64) -> TokenFetch {
        let idp = self.idp.clone();
        let credentials = self.credentials.clone();
        let inner = self.inner.clone();

        let task = tokio::spawn(async move {
            let result = Self::fetch_token(idp, credentials).await;

            let mut inner = inner.lock().await;
            let settles_this_fetch = matches!(
                &inner.state,
                BrokerState::Fetching { generation: current, .. } if *current == generation
            );
            if settles_this_fetch {
                inner.state = match &result {
                    Ok(token) => BrokerState::Cached(token.clone()),
                    Err(_) => BrokerState::Empty,
                };
            }

            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                error!("Management token task failed: {}", e);
                Err(BrokerError::TokenAcquisition {
                    status: None,
                    message: format!("token request task failed: {}", e),
                })
            })
        }
        .boxed()
        .shared()
    }

    /// Drops the cached token so the next caller re-issues one.
    pub async fn invalidate(&self) {
        let mut inner = self.inner.lock().await;
        if matches!(inner.state, BrokerState::Cached(_)) {
            info!("Invalidating cached management token");
            inner.state = BrokerState::Empty;
        }
    }

    pub async fn status(&self) -> BrokerStatus {
        let inner = self.inner.lock().await;
        match &inner.state {
            BrokerState::Empty => BrokerStatus::Empty,
            BrokerState::Fetching { .. } => BrokerStatus::Fetching,
            BrokerState::Cached(token) if token.is_fresh(self.safety_margin) => BrokerStatus::Cached,
            BrokerState::Cached(_) => BrokerStatus::Empty,
        }
    }

    async fn fetch_token(
        idp: IdpClient,
        credentials: Arc<ClientCredentials>,
    ) -> Result<M2mToken, BrokerError> {
        info!("Requesting management token for client {}", credentials.client_id);

        let issued_at = Instant::now();
        let request = ClientCredentialsRequest {
            client_id: &credentials.client_id,
            client_secret: &credentials.client_secret,
            audience: &credentials.audience,
            grant_type: "client_credentials",
        };

        let response = idp.request_client_credentials(&request).await.map_err(|e| {
            error!("Management token request failed: {}", e);
            BrokerError::from(e)
        })?;

        let expires_in = response.expires_in.unwrap_or_else(|| {
            warn!("Token endpoint omitted expires_in, assuming {}s", DEFAULT_TOKEN_LIFETIME_SECS);
            DEFAULT_TOKEN_LIFETIME_SECS
        });

        info!("Management token issued, expires in {}s", expires_in);

        Ok(M2mToken {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_in: Duration::from_secs(expires_in),
            issued_at,
        })
    }
}
