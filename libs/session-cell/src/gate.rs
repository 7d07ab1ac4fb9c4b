use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared_models::auth::{Claims, UserIdentityRecord};

use crate::client::SessionApi;
use crate::models::{GateSignal, InfoSource, SessionError, SessionPhase, SessionView};
use crate::store::TokenStore;

pub const UPDATE_METADATA_ENDPOINT: &str = "/auth/update-metadata";

#[derive(Debug, Clone, Copy)]
pub struct GateOptions {
    pub require_auth: bool,
}

impl Default for GateOptions {
    fn default() -> Self {
        Self { require_auth: true }
    }
}

struct GateInner {
    store: TokenStore,
    api: Arc<dyn SessionApi>,
    options: GateOptions,
    view: watch::Sender<SessionView>,
    latest_fetch: AtomicU64,
    mounted: AtomicBool,
}

/// Turns the token store and the user-info endpoint into one [`SessionView`].
///
/// Claims from the stored token are published immediately; the full IdP
/// profile follows from a background fetch. Every fetch carries a sequence
/// number and only the most recently issued one may write the view, so a slow
/// earlier response can never overwrite a later refresh.
///
/// `mount`, `refresh` and `logout` spawn the profile fetch, so they must be
/// called from within a Tokio runtime. While unmounted they only publish the
/// claims and never spawn.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

impl SessionGate {
    pub fn new(store: TokenStore, api: Arc<dyn SessionApi>, options: GateOptions) -> Self {
        let (view, _) = watch::channel(SessionView::default());

        Self {
            inner: Arc::new(GateInner {
                store,
                api,
                options,
                view,
                latest_fetch: AtomicU64::new(0),
                mounted: AtomicBool::new(false),
            }),
        }
    }

    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn mount(&self) -> GateSignal {
        self.inner.mounted.store(true, Ordering::SeqCst);
        self.load().0
    }

    /// Stops any in-flight fetch from touching the view.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        self.inner.latest_fetch.fetch_add(1, Ordering::SeqCst);
    }

    /// Re-reads the token store and re-runs the profile fetch. Returns the
    /// handle of the spawned fetch, if any.
    pub fn refresh(&self) -> (GateSignal, Option<JoinHandle<()>>) {
        debug!("Session refresh triggered");
        self.load()
    }

    pub fn logout(&self) -> GateSignal {
        info!("Logging out");
        self.inner.store.clear();
        self.load().0
    }

    /// Posts `body` to a same-origin endpoint with the current user id injected.
    pub async fn api_call_with_user_id(
        &self,
        endpoint: &str,
        body: Value,
    ) -> Result<Value, SessionError> {
        let user_id = self.view().user_id.ok_or(SessionError::NotAuthenticated)?;

        if !endpoint.starts_with('/') || endpoint.starts_with("//") {
            return Err(SessionError::Validation(format!(
                "Endpoint must be a same-origin path: {}",
                endpoint
            )));
        }

        let mut body = match body {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(SessionError::Validation(
                    "Request body must be a JSON object".to_string(),
                ))
            }
        };
        body.insert("userId".to_string(), Value::String(user_id));

        self.inner.api.post_json(endpoint, Value::Object(body)).await
    }

    /// Patches the current user's metadata, then refreshes the view. The
    /// returned signal is the refresh outcome; the session may have expired
    /// while the patch was in flight.
    pub async fn update_metadata(
        &self,
        metadata_patch: Value,
    ) -> Result<(Value, GateSignal), SessionError> {
        let response = self
            .api_call_with_user_id(
                UPDATE_METADATA_ENDPOINT,
                json!({ "user_metadata": metadata_patch }),
            )
            .await?;

        let (signal, _) = self.refresh();
        if signal != GateSignal::Ready {
            info!("Session ended after metadata update: {:?}", signal);
        }
        Ok((response, signal))
    }

    fn load(&self) -> (GateSignal, Option<JoinHandle<()>>) {
        // Supersede whatever is in flight before touching the view
        let seq = self.inner.latest_fetch.fetch_add(1, Ordering::SeqCst) + 1;

        self.inner.view.send_modify(|view| {
            view.phase = SessionPhase::Loading;
            view.is_loading = true;
        });

        let Some(claims) = self.inner.store.claims() else {
            self.inner.view.send_replace(SessionView {
                phase: SessionPhase::Unauthenticated,
                ..SessionView::default()
            });

            return if self.inner.options.require_auth {
                info!("No valid session, signalling redirect to login");
                (GateSignal::RedirectToLogin, None)
            } else {
                (GateSignal::Anonymous, None)
            };
        };

        let mounted = self.inner.mounted.load(Ordering::SeqCst);
        let basic = UserIdentityRecord::from_claims(&claims);
        self.inner.view.send_modify(|view| {
            let same_user = view.user_id.as_deref() == Some(claims.sub.as_str());

            view.user_id = Some(claims.sub.clone());
            view.is_logged_in = true;
            view.is_loading = mounted;
            view.phase = SessionPhase::Authenticated;
            if !same_user || view.user_info.is_none() {
                view.user_info = Some(basic);
                view.info_source = Some(InfoSource::Claims);
            }
        });

        if !mounted {
            debug!("Gate not mounted, skipping user info fetch");
            return (GateSignal::Ready, None);
        }

        let gate = self.clone();
        let handle = tokio::spawn(async move { gate.fetch_user_info(seq, claims).await });

        (GateSignal::Ready, Some(handle))
    }

    async fn fetch_user_info(&self, seq: u64, claims: Claims) {
        let result = self.inner.api.fetch_user_info(&claims.sub).await;

        let applied = self.inner.view.send_if_modified(|view| {
            if !self.is_current(seq) {
                return false;
            }

            match &result {
                Ok(record) => {
                    view.user_info = Some(record.clone());
                    view.info_source = Some(InfoSource::Idp);
                }
                Err(err) => {
                    warn!("User info fetch failed, using token claims: {}", err);
                    view.user_info = Some(UserIdentityRecord::from_claims(&claims));
                    view.info_source = Some(InfoSource::Claims);
                }
            }
            view.is_loading = false;
            true
        });

        if !applied {
            debug!("Discarding stale user info fetch #{}", seq);
        }
    }

    fn is_current(&self, seq: u64) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
            && self.inner.latest_fetch.load(Ordering::SeqCst) == seq
    }
}
