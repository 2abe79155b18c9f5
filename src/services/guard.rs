//! Route authorization guard.
//!
//! DESIGN
//! ======
//! Each navigation starts `Pending` and resolves once to `Allowed` or
//! `Redirected`. The guard asks the remote authority for a live session on
//! every navigation, public routes included, and never consults a session
//! store's cached identity. Nothing is memoized between navigations.
//!
//! The session check is bounded by a timeout; a timeout or remote failure
//! counts as "no live session".

use std::time::Duration;

use serde::Serialize;

use crate::error::ErrorCode;
use crate::identity::IdentityService;

/// Where unauthenticated navigation to a protected route is sent.
pub const LOGIN_PATH: &str = "/login";

// =============================================================================
// ROUTE TABLE
// =============================================================================

/// A page route and its authorization requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDef {
    pub name: &'static str,
    /// Axum-style pattern; `{param}` matches one non-empty segment.
    pub path: &'static str,
    pub requires_auth: bool,
}

impl RouteDef {
    #[must_use]
    pub const fn public(name: &'static str, path: &'static str) -> Self {
        Self { name, path, requires_auth: false }
    }

    #[must_use]
    pub const fn protected(name: &'static str, path: &'static str) -> Self {
        Self { name, path, requires_auth: true }
    }

    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        let mut pattern = segments(self.path);
        let mut actual = segments(path);
        loop {
            match (pattern.next(), actual.next()) {
                (None, None) => return true,
                (Some(p), Some(_)) if p.starts_with('{') && p.ends_with('}') => {}
                (Some(p), Some(a)) if p == a => {}
                _ => return false,
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteDef>,
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<RouteDef>) -> Self {
        Self { routes }
    }

    /// The application's page routes.
    #[must_use]
    pub fn agenda() -> Self {
        Self::new(vec![
            RouteDef::public("home", "/"),
            RouteDef::public("login", LOGIN_PATH),
            RouteDef::public("register", "/register"),
            RouteDef::protected("dashboard", "/dashboard"),
            RouteDef::public("public-schedule", "/schedule/{id}"),
            RouteDef::protected("schedule-manager", "/schedule-manager"),
            RouteDef::protected("service-manager", "/service-manager"),
            RouteDef::protected("appointments", "/appointments"),
        ])
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteDef] {
        &self.routes
    }

    /// First route whose pattern matches `path`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Option<&RouteDef> {
        self.routes.iter().find(|r| r.matches(path))
    }
}

// =============================================================================
// NAVIGATION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Pending,
    Allowed,
    Redirected { to: String },
}

impl Navigation {
    /// Resolve a pending navigation. Resolved navigations are terminal.
    #[must_use]
    pub fn resolve(self, requires_auth: bool, live_session: bool, login_path: &str) -> Self {
        match self {
            Self::Pending if requires_auth && !live_session => Self::Redirected { to: login_path.to_owned() },
            Self::Pending => Self::Allowed,
            resolved => resolved,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

// =============================================================================
// GUARD
// =============================================================================

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    session_timeout: Duration,
}

impl RouteGuard {
    #[must_use]
    pub fn new(session_timeout: Duration) -> Self {
        Self { login_path: LOGIN_PATH.to_owned(), session_timeout }
    }

    /// Ask the remote authority whether a session is live. A browser without
    /// a service handle has never authenticated.
    pub async fn has_live_session(&self, service: Option<&dyn IdentityService>) -> bool {
        let Some(service) = service else {
            return false;
        };

        match tokio::time::timeout(self.session_timeout, service.get_session()).await {
            Ok(Ok(session)) => session.is_some(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, code = e.error_code(), retryable = e.retryable(), "session check failed");
                false
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.session_timeout, "session check timed out");
                false
            }
        }
    }

    /// Run one navigation to `route` through the guard.
    pub async fn navigate(&self, route: &RouteDef, service: Option<&dyn IdentityService>) -> Navigation {
        let pending = Navigation::Pending;
        let live = self.has_live_session(service).await;
        let outcome = pending.resolve(route.requires_auth, live, &self.login_path);
        debug_assert!(outcome.is_resolved());
        tracing::debug!(route = route.name, live, ?outcome, "navigation resolved");
        outcome
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
