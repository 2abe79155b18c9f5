//! Auth routes — drive a browser's session store and report its state.
//!
//! Every handler answers `200` with the resulting `SessionSnapshot`: the
//! store never propagates failures, so the outcome lives in the snapshot's
//! `error` field rather than in the status code.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::identity::DEFAULT_PLAN;
use crate::services::session_store::{SessionSnapshot, SessionStore};
use crate::state::AppState;

pub const SID_COOKIE: &str = "agenda_sid";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

// =============================================================================
// SESSION LOOKUP
// =============================================================================

fn sid(jar: &CookieJar) -> Option<&str> {
    jar.get(SID_COOKIE).map(Cookie::value)
}

/// The store bound to this browser's cookie, if any.
pub(crate) async fn existing_store(state: &AppState, jar: &CookieJar) -> Option<Arc<SessionStore>> {
    state.sessions.get(sid(jar)?).await
}

fn build_sid_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SID_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// The browser's store, minting a new one (and its cookie) when missing.
async fn store_for(state: &AppState, jar: CookieJar) -> (CookieJar, Arc<SessionStore>) {
    if let Some(store) = existing_store(state, &jar).await {
        return (jar, store);
    }

    let (sid, store) = state.sessions.create(state.connector.as_ref()).await;
    (jar.add(build_sid_cookie(sid, state.cookie_secure)), store)
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/auth/register` — create an account and its profile.
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<RegisterRequest>,
) -> (CookieJar, Json<SessionSnapshot>) {
    let (jar, store) = store_for(&state, jar).await;
    let plan = body.plan.as_deref().unwrap_or(DEFAULT_PLAN);
    store.register(&body.email, &body.password, plan).await;
    (jar, Json(store.snapshot()))
}

/// `POST /api/auth/login` — sign in and load the profile.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> (CookieJar, Json<SessionSnapshot>) {
    let (jar, store) = store_for(&state, jar).await;
    store.login(&body.email, &body.password).await;
    (jar, Json(store.snapshot()))
}

/// `POST /api/auth/logout` — end the remote session. On success the store is
/// forgotten and the cookie expired; a browser without a store has nothing
/// to end.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<SessionSnapshot>) {
    let Some(sid) = sid(&jar).map(str::to_owned) else {
        return (jar, Json(SessionSnapshot::default()));
    };
    let Some(store) = state.sessions.get(&sid).await else {
        return (jar, Json(SessionSnapshot::default()));
    };

    store.logout().await;
    let snapshot = store.snapshot();
    if snapshot.is_authenticated() || snapshot.error.is_some() {
        return (jar, Json(snapshot));
    }

    state.sessions.remove(&sid).await;
    let mut expired = build_sid_cookie(String::new(), state.cookie_secure);
    expired.set_max_age(Duration::ZERO);
    (jar.add(expired), Json(snapshot))
}

/// `POST /api/auth/profile` — reload (or create) the current profile. A
/// browser without a store runs against a throwaway one, which reports the
/// missing identity without registering anything.
pub async fn fetch_profile(State(state): State<AppState>, jar: CookieJar) -> Json<SessionSnapshot> {
    let store = match existing_store(&state, &jar).await {
        Some(store) => store,
        None => Arc::new(SessionStore::new(state.connector.connect())),
    };
    store.fetch_profile().await;
    Json(store.snapshot())
}

/// `GET /api/auth/state` — current snapshot; empty for unknown browsers.
pub async fn session_state(State(state): State<AppState>, jar: CookieJar) -> Json<SessionSnapshot> {
    let snapshot = existing_store(&state, &jar)
        .await
        .map(|store| store.snapshot())
        .unwrap_or_default();
    Json(snapshot)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
