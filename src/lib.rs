pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use config::SessionCookieConfig;
use services::AuthService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub session_cookie: SessionCookieConfig,
    /// Whether `/auth/login` echoes the magic link back to the caller.
    pub expose_magic_links: bool,
}

pub fn build_router(app_state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/session", get(handlers::current_session_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/auth/login", post(handlers::request_login_handler))
        .route("/auth/verify", get(handlers::verify_handler))
        .route(
            "/auth/signout",
            get(handlers::signout_handler).post(handlers::signout_handler),
        )
        .merge(protected_routes)
        .with_state(app_state)
}
