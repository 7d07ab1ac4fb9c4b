use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::internal_key_middleware;

use crate::handlers;
use crate::state::AuthState;

pub fn auth_routes(state: Arc<AuthState>) -> Router {
    let public_routes = Router::new()
        .route("/update-metadata", post(handlers::update_metadata));

    // Never reachable from the browser without the internal key
    let internal_routes = Router::new()
        .route("/management-token", post(handlers::issue_management_token))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            internal_key_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(internal_routes)
        .with_state(state)
}

pub fn user_routes(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/info", get(handlers::get_user_info).post(handlers::post_user_info))
        .with_state(state)
}

pub fn health_routes(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(handlers::health_check))
        .with_state(state)
}
