use std::sync::Arc;

use shared_config::AppConfig;
use shared_idp::{IdpClient, IdpError};

use crate::services::{ManagementApiClient, ManagementTokenBroker};

/// Process-wide state for the auth and user routes. Built once at startup so
/// every request shares the same token cache.
pub struct AuthState {
    pub config: Arc<AppConfig>,
    pub broker: Arc<ManagementTokenBroker>,
    pub management: ManagementApiClient,
}

impl AuthState {
    pub fn new(config: Arc<AppConfig>) -> Result<Self, IdpError> {
        let idp = IdpClient::new(&config)?;
        let broker = Arc::new(ManagementTokenBroker::from_config(idp.clone(), &config));
        let management = ManagementApiClient::new(idp, broker.clone());

        Ok(Self {
            config,
            broker,
            management,
        })
    }
}
