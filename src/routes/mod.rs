//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON auth endpoints drive the per-browser session store; page routes come
//! from the route table and every one of them passes through the navigation
//! guard middleware before its handler runs.

pub mod auth;
pub mod guard;
pub mod pages;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let pages = state
        .routes
        .routes()
        .iter()
        .fold(Router::<AppState>::new(), |router, route| router.route(route.path, get(pages::page)))
        .route_layer(middleware::from_fn_with_state(state.clone(), guard::require_navigation));

    Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/profile", post(auth::fetch_profile))
        .route("/api/auth/state", get(auth::session_state))
        .route("/healthz", get(healthz))
        .merge(pages)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
