//! # Auth Cell
//!
//! Server side of the dashboard's identity layer: the Management API token
//! broker and the proxy that reads and patches IdP user profiles on behalf of
//! the browser, so admin credentials never leave the process.
//!
//! ```text
//! +-----------------------------------------------------+
//! |                    Auth Cell                        |
//! +-----------------------------------------------------+
//! |  handlers.rs     |  HTTP endpoint handlers          |
//! |  router.rs       |  Route definitions               |
//! |  models.rs       |  M2M token, credentials, errors  |
//! |  state.rs        |  Shared broker + proxy           |
//! |  services/       |                                  |
//! |    broker.rs     |  Client-credentials token cache  |
//! |    management.rs |  Management API proxy            |
//! +-----------------------------------------------------+
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /auth/management-token` - internal only, requires `x-internal-api-key`
//! - `POST /auth/update-metadata` - merge-patch `user_metadata` for `userId`
//! - `GET|POST /user/info` - filtered identity record for `userId`
//!
//! ## Configuration
//!
//! - `IDP_ISSUER_BASE_URL`, `IDP_ADMIN_CLIENT_ID`, `IDP_ADMIN_CLIENT_SECRET`
//! - `IDP_AUDIENCE` (optional, defaults to `{issuer}/api/v2/`)
//! - `INTERNAL_API_KEY` (optional, internal route disabled without it)

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::{BrokerError, BrokerStatus, ClientCredentials, M2mToken, ManagementError};
pub use router::{auth_routes, health_routes, user_routes};
pub use services::{ManagementApiClient, ManagementTokenBroker};
pub use state::AuthState;
