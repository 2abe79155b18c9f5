//! Navigation guard middleware for page routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use super::auth::existing_store;
use crate::services::guard::Navigation;
use crate::state::AppState;

/// Resolve the target page, check the live session, and either pass the
/// request on, carrying its `RouteDef` as an extension, or redirect to the
/// login page. Unknown paths pass untouched.
pub async fn require_navigation(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(route) = state.routes.resolve(request.uri().path()).cloned() else {
        return next.run(request).await;
    };

    let service = existing_store(&state, &jar)
        .await
        .map(|store| store.service());

    match state.guard.navigate(&route, service.as_deref()).await {
        Navigation::Redirected { to } => Redirect::temporary(&to).into_response(),
        Navigation::Allowed | Navigation::Pending => {
            request.extensions_mut().insert(route);
            next.run(request).await
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
