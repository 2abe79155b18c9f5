//! Page placeholders. Rendering belongs to the front end; these report which
//! route was reached and the caller's session.

use std::collections::HashMap;

use axum::Extension;
use axum::extract::{Path, State};
use axum::http::Uri;
use axum::response::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::auth::existing_store;
use crate::services::guard::RouteDef;
use crate::services::session_store::SessionSnapshot;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PageView {
    pub route: &'static str,
    pub path: String,
    pub params: HashMap<String, String>,
    pub authenticated: bool,
    pub session: SessionSnapshot,
}

/// `GET <page>` — any route from the route table, already resolved by the
/// navigation guard.
pub async fn page(
    State(state): State<AppState>,
    Extension(route): Extension<RouteDef>,
    jar: CookieJar,
    uri: Uri,
    params: Option<Path<HashMap<String, String>>>,
) -> Json<PageView> {
    let session = existing_store(&state, &jar)
        .await
        .map(|store| store.snapshot())
        .unwrap_or_default();

    Json(PageView {
        route: route.name,
        path: uri.path().to_owned(),
        params: params.map(|Path(p)| p).unwrap_or_default(),
        authenticated: session.is_authenticated(),
        session,
    })
}
