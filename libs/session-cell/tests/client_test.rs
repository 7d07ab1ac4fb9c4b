use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use session_cell::{HttpSessionApi, SessionApi, SessionError, TokenStore};
use shared_utils::test_utils::{JwtTestUtils, MockIdpResponses, TestUser};

#[tokio::test]
async fn test_user_info_posts_user_id_with_bearer() {
    let server = MockServer::start().await;
    let user = TestUser::default();
    let token = JwtTestUtils::create_test_token(&user, Some(1));

    let store = TokenStore::in_memory();
    store.set_token(&token);

    Mock::given(method("POST"))
        .and(path("/user/info"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .and(body_json(json!({ "userId": user.id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(MockIdpResponses::user_response(
            &user.id,
            json!({ "theme": "dark" }),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpSessionApi::new(&server.uri(), store).unwrap();
    let record = api.fetch_user_info(&user.id).await.unwrap();

    assert_eq!(record.user_id, user.id);
    assert_eq!(record.metadata_value("theme"), Some(&json!("dark")));
}

#[tokio::test]
async fn test_error_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/info"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "User not found" })),
        )
        .mount(&server)
        .await;

    let api = HttpSessionApi::new(&server.uri(), TokenStore::in_memory()).unwrap();
    let result = api.fetch_user_info("auth0|missing").await;

    assert_matches!(
        result,
        Err(SessionError::Api { status: 404, message }) if message == "User not found"
    );
}

#[tokio::test]
async fn test_no_token_sends_no_authorization() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/billing/portal"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/billing/portal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "url": "/portal" })))
        .mount(&server)
        .await;

    let api = HttpSessionApi::new(&format!("{}/", server.uri()), TokenStore::in_memory()).unwrap();
    let body = api.post_json("/billing/portal", json!({ "userId": "u1" })).await.unwrap();

    assert_eq!(body["url"], "/portal");
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let api = HttpSessionApi::new("http://127.0.0.1:9", TokenStore::in_memory()).unwrap();
    let result = api.post_json("/user/info", json!({})).await;

    assert_matches!(result, Err(SessionError::Transport(_)));
}

#[tokio::test]
async fn test_hung_endpoint_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/user/info"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "user_id": "u1" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let api = HttpSessionApi::with_timeout(
        &server.uri(),
        TokenStore::in_memory(),
        Duration::from_millis(50),
    )
    .unwrap();
    let result = api.fetch_user_info("u1").await;

    assert_matches!(result, Err(SessionError::Transport(msg)) if msg.contains("timed out"));
}
