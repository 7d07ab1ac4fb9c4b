#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use auth_cell::AuthState;
use shared_utils::test_utils::{MockIdpResponses, TestConfig};

pub const M2M_TOKEN: &str = "m2m-test-token";

pub fn auth_state(server: &MockServer) -> Arc<AuthState> {
    let config = TestConfig::with_issuer(&server.uri()).to_arc();
    Arc::new(AuthState::new(config).expect("IdP client builds"))
}

pub async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockIdpResponses::token_response(M2M_TOKEN, 86400)),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// In-memory stand-in for the IdP user store, applying merge-patch semantics
/// to `user_metadata` so reads observe earlier writes.
#[derive(Clone, Default)]
pub struct FakeUserStore {
    users: Arc<Mutex<HashMap<String, Value>>>,
}

impl FakeUserStore {
    pub fn with_user(user_id: &str) -> Self {
        let store = Self::default();
        store
            .users
            .lock()
            .unwrap()
            .insert(user_id.to_string(), MockIdpResponses::user_response(user_id, json!({})));
        store
    }

    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/v2/users/[^/]+$"))
            .respond_with(UserReader(self.clone()))
            .mount(server)
            .await;

        Mock::given(method("PATCH"))
            .and(path_regex(r"^/api/v2/users/[^/]+$"))
            .respond_with(UserPatcher(self.clone()))
            .mount(server)
            .await;
    }

    fn user_id(request: &Request) -> String {
        request
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
            .to_string()
    }
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(MockIdpResponses::error_response(
        404,
        "Not Found",
        "The user does not exist.",
    ))
}

struct UserReader(FakeUserStore);

impl Respond for UserReader {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let users = self.0.users.lock().unwrap();
        match users.get(&FakeUserStore::user_id(request)) {
            Some(user) => ResponseTemplate::new(200).set_body_json(user.clone()),
            None => not_found(),
        }
    }
}

struct UserPatcher(FakeUserStore);

impl Respond for UserPatcher {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let patch: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };

        let mut users = self.0.users.lock().unwrap();
        let Some(user) = users.get_mut(&FakeUserStore::user_id(request)) else {
            return not_found();
        };

        if let (Some(Value::Object(current)), Some(Value::Object(changes))) =
            (user.get_mut("user_metadata"), patch.get("user_metadata"))
        {
            for (key, value) in changes {
                current.insert(key.clone(), value.clone());
            }
        }

        ResponseTemplate::new(200).set_body_json(user.clone())
    }
}
