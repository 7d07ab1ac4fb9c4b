use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use auth_cell::{auth_routes, health_routes, user_routes, AuthState};

pub fn create_router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dashboard API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/user", user_routes(state.clone()))
        .nest("/health", health_routes(state))
}
