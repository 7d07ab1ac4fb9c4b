use std::env;
use std::fmt;
use std::time::Duration;

use tracing::warn;

const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PORT: u16 = 3000;

#[derive(Clone)]
pub struct AppConfig {
    pub idp_issuer_url: String,
    pub idp_admin_client_id: String,
    pub idp_admin_client_secret: String,
    pub idp_audience: String,
    pub internal_api_key: String,
    pub token_safety_margin_secs: u64,
    pub http_timeout_secs: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let idp_issuer_url = env::var("IDP_ISSUER_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("IDP_ISSUER_BASE_URL not set, using empty value");
                String::new()
            });

        let config = Self {
            idp_admin_client_id: env::var("IDP_ADMIN_CLIENT_ID")
                .unwrap_or_else(|_| {
                    warn!("IDP_ADMIN_CLIENT_ID not set, using empty value");
                    String::new()
                }),
            idp_admin_client_secret: env::var("IDP_ADMIN_CLIENT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("IDP_ADMIN_CLIENT_SECRET not set, using empty value");
                    String::new()
                }),
            idp_audience: env::var("IDP_AUDIENCE")
                .unwrap_or_else(|_| {
                    warn!("IDP_AUDIENCE not set, deriving from issuer");
                    Self::default_audience(&idp_issuer_url)
                }),
            internal_api_key: env::var("INTERNAL_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("INTERNAL_API_KEY not set, management token endpoint disabled");
                    String::new()
                }),
            token_safety_margin_secs: parse_or_default(
                "M2M_TOKEN_SAFETY_MARGIN_SECS",
                DEFAULT_SAFETY_MARGIN_SECS,
            ),
            http_timeout_secs: parse_or_default("IDP_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            port: parse_or_default("PORT", DEFAULT_PORT),
            idp_issuer_url,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing IdP environment variables");
        }

        config
    }

    /// Management API audience the IdP expects when none is configured explicitly.
    pub fn default_audience(issuer_url: &str) -> String {
        format!("{}/api/v2/", issuer_url.trim_end_matches('/'))
    }

    pub fn is_configured(&self) -> bool {
        !self.idp_issuer_url.is_empty()
            && !self.idp_admin_client_id.is_empty()
            && !self.idp_admin_client_secret.is_empty()
    }

    pub fn is_internal_endpoint_enabled(&self) -> bool {
        !self.internal_api_key.is_empty()
    }

    pub fn token_safety_margin(&self) -> Duration {
        Duration::from_secs(self.token_safety_margin_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("idp_issuer_url", &self.idp_issuer_url)
            .field("idp_admin_client_id", &self.idp_admin_client_id)
            .field("idp_admin_client_secret", &redact(&self.idp_admin_client_secret))
            .field("idp_audience", &self.idp_audience)
            .field("internal_api_key", &redact(&self.internal_api_key))
            .field("token_safety_margin_secs", &self.token_safety_margin_secs)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("port", &self.port)
            .finish()
    }
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
