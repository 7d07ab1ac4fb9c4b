use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::{auth_routes, user_routes, AuthState};
use session_cell::{GateOptions, GateSignal, HttpSessionApi, InfoSource, SessionGate, TokenStore};
use shared_utils::test_utils::{JwtTestUtils, MockIdpResponses, TestConfig, TestUser};

/// Serves the auth and user routes on an ephemeral port, backed by `idp`.
async fn spawn_server(idp: &MockServer) -> String {
    let config = TestConfig::with_issuer(&idp.uri()).to_arc();
    let state = Arc::new(AuthState::new(config).unwrap());

    let app = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/user", user_routes(state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_gate_loads_filtered_profile_through_server() {
    let idp = MockServer::start().await;
    let user = TestUser::new("grace@example.com", "Grace");

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(MockIdpResponses::token_response("m2m-token", 86400)),
        )
        .expect(1)
        .mount(&idp)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/v2/users/.+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockIdpResponses::user_response(&user.id, json!({ "onboarded": true })),
        ))
        .mount(&idp)
        .await;

    let base_url = spawn_server(&idp).await;

    let store = TokenStore::in_memory();
    store.set_token(&JwtTestUtils::create_test_token(&user, Some(1)));
    let api = Arc::new(HttpSessionApi::new(&base_url, store.clone()).unwrap());
    let gate = SessionGate::new(store, api, GateOptions::default());

    assert_eq!(gate.mount(), GateSignal::Ready);

    let mut rx = gate.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| !v.is_loading))
        .await
        .unwrap()
        .unwrap()
        .clone();

    assert_eq!(view.info_source, Some(InfoSource::Idp));
    let info = view.user_info.unwrap();
    assert_eq!(info.user_id, user.id);
    assert_eq!(info.login_count, Some(12));
    assert_eq!(info.metadata_value("onboarded"), Some(&json!(true)));

    // nothing sensitive survives the server-side filter
    let raw = serde_json::to_value(&info).unwrap();
    assert!(raw.get("last_ip").is_none());
    assert!(raw.get("password_hash").is_none());
    assert!(raw.get("multifactor").is_none());
    assert!(raw["identities"][0].get("access_token").is_none());
}

#[tokio::test]
async fn test_gate_degrades_when_idp_is_down() {
    let idp = MockServer::start().await;
    let user = TestUser::new("linus@example.com", "Linus");

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&idp)
        .await;

    let base_url = spawn_server(&idp).await;

    let store = TokenStore::in_memory();
    store.set_token(&JwtTestUtils::create_test_token(&user, Some(1)));
    let api = Arc::new(HttpSessionApi::new(&base_url, store.clone()).unwrap());
    let gate = SessionGate::new(store, api, GateOptions::default());

    assert_eq!(gate.mount(), GateSignal::Ready);

    let mut rx = gate.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|v| !v.is_loading))
        .await
        .unwrap()
        .unwrap()
        .clone();

    assert!(view.is_logged_in);
    assert_eq!(view.user_id.as_deref(), Some(user.id.as_str()));
    assert_eq!(view.info_source, Some(InfoSource::Claims));
    assert_eq!(view.user_info.unwrap().name.as_deref(), Some("Linus"));
}
