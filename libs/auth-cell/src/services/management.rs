use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_idp::{IdpClient, IdpError};
use shared_models::auth::UserIdentityRecord;

use crate::models::ManagementError;
use crate::services::broker::ManagementTokenBroker;

/// Reads and patches users on the IdP Management API with the broker's token.
///
/// Responses are deserialized straight into [`UserIdentityRecord`], which is
/// what keeps raw IdP fields (ips, hashes, provider tokens) off the wire.
#[derive(Clone)]
pub struct ManagementApiClient {
    idp: IdpClient,
    broker: Arc<ManagementTokenBroker>,
}

impl ManagementApiClient {
    pub fn new(idp: IdpClient, broker: Arc<ManagementTokenBroker>) -> Self {
        Self { idp, broker }
    }

    pub async fn get_user_info(&self, user_id: &str) -> Result<UserIdentityRecord, ManagementError> {
        validate_user_id(user_id)?;
        debug!("Fetching IdP profile for user: {}", user_id);

        let token = self.broker.get_management_token().await?;

        let record = self
            .idp
            .request::<UserIdentityRecord>(
                Method::GET,
                &IdpClient::user_path(user_id),
                Some(&token.access_token),
                None,
            )
            .await;

        self.settle(user_id, record).await
    }

    /// Merge-patches `user_metadata`. Never retried: a repeated PATCH after an
    /// ambiguous failure could double-apply.
    pub async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata_patch: Value,
    ) -> Result<UserIdentityRecord, ManagementError> {
        validate_update(user_id, &metadata_patch)?;
        debug!("Patching user_metadata for user: {}", user_id);

        let token = self.broker.get_management_token().await?;
        let body = json!({ "user_metadata": metadata_patch });

        let record = self
            .idp
            .request::<UserIdentityRecord>(
                Method::PATCH,
                &IdpClient::user_path(user_id),
                Some(&token.access_token),
                Some(&body),
            )
            .await;

        let record = self.settle(user_id, record).await?;
        info!("Updated user_metadata for user: {}", user_id);
        Ok(record)
    }

    async fn settle(
        &self,
        user_id: &str,
        result: Result<UserIdentityRecord, IdpError>,
    ) -> Result<UserIdentityRecord, ManagementError> {
        match result {
            Ok(record) => Ok(record),
            Err(IdpError::Status { status: 404, .. }) => {
                Err(ManagementError::NotFound(user_id.to_string()))
            }
            Err(err) => {
                if err.status() == Some(401) {
                    warn!("Management API rejected the cached token, invalidating it");
                    self.broker.invalidate().await;
                }
                Err(err.into())
            }
        }
    }
}

pub fn validate_user_id(user_id: &str) -> Result<(), ManagementError> {
    if user_id.trim().is_empty() {
        return Err(ManagementError::Validation("userId is required".to_string()));
    }
    Ok(())
}

pub fn validate_update(user_id: &str, metadata_patch: &Value) -> Result<(), ManagementError> {
    validate_user_id(user_id)?;

    match metadata_patch {
        Value::Object(_) => Ok(()),
        Value::Null => Err(ManagementError::Validation("user_metadata is required".to_string())),
        _ => Err(ManagementError::Validation(
            "user_metadata must be a JSON object".to_string(),
        )),
    }
}
