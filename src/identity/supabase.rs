//! Supabase adapter — GoTrue for auth, PostgREST for the `profiles` table.
//!
//! Thin HTTP wrapper over the REST endpoints. Response and error parsing are
//! pure functions for testability.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use super::types::{AuthResponse, AuthSession, Identity, IdentityError, NewProfile, Profile};
use super::{IdentityConnector, IdentityService};

const PROFILES_TABLE: &str = "profiles";

/// Returned by PostgREST when a single-row request matches zero or many rows.
const PGRST_SINGULAR: &str = "PGRST116";

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

/// Project URL, anon key, and HTTP timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    pub timeouts: IdentityTimeouts,
}

// =============================================================================
// CLIENT
// =============================================================================

/// One browser's view of Supabase: a shared HTTP client plus that browser's
/// session tokens.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
    session: RwLock<Option<AuthSession>>,
}

impl SupabaseClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: Arc::from(config.url.trim_end_matches('/')),
            anon_key: Arc::from(config.anon_key.as_str()),
            session: RwLock::new(None),
        })
    }

    /// A new handle sharing the connection pool, with no session.
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            http: self.http.clone(),
            base_url: Arc::clone(&self.base_url),
            anon_key: Arc::clone(&self.anon_key),
            session: RwLock::new(None),
        }
    }

    fn stored_session(&self) -> Option<AuthSession> {
        self.session
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    fn store_session(&self, session: Option<AuthSession>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn access_token(&self) -> Option<String> {
        self.stored_session().map(|s| s.access_token)
    }

    /// Build a request with the project key and the caller's bearer token
    /// (the anon key when signed out).
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let bearer = self
            .access_token()
            .unwrap_or_else(|| self.anon_key.to_string());
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("apikey", &*self.anon_key)
            .bearer_auth(bearer)
    }
}

async fn send(builder: RequestBuilder) -> Result<(StatusCode, String), IdentityError> {
    let response = builder
        .send()
        .await
        .map_err(|e| IdentityError::Request(e.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| IdentityError::Request(e.to_string()))?;
    Ok((status, body))
}

#[async_trait::async_trait]
impl IdentityService for SupabaseClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError> {
        let builder = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = send(builder).await?;
        if !status.is_success() {
            return Err(auth_error(status, &body));
        }

        let response = parse_auth_response(&body)?;
        if response.session.is_some() {
            self.store_session(response.session.clone());
        }
        Ok(response)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError> {
        let builder = self
            .request(Method::POST, "/auth/v1/token?grant_type=password")
            .json(&serde_json::json!({ "email": email, "password": password }));
        let (status, body) = send(builder).await?;
        if !status.is_success() {
            return Err(auth_error(status, &body));
        }

        let response = parse_auth_response(&body)?;
        self.store_session(response.session.clone());
        Ok(response)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if self.access_token().is_none() {
            return Ok(());
        }

        let (status, body) = send(self.request(Method::POST, "/auth/v1/logout")).await?;
        // An already-revoked token still means the session is gone.
        if status.is_success() || status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            self.store_session(None);
            return Ok(());
        }
        Err(auth_error(status, &body))
    }

    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };

        let (status, body) = send(self.request(Method::GET, "/auth/v1/user")).await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.store_session(None);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(auth_error(status, &body));
        }

        let user: Identity = serde_json::from_str(&body).map_err(|e| IdentityError::Parse(e.to_string()))?;
        let live = AuthSession { user, ..session };
        self.store_session(Some(live.clone()));
        Ok(Some(live))
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, IdentityError> {
        let path = format!("/rest/v1/{PROFILES_TABLE}?id=eq.{id}&select=*");
        let (status, body) = send(self.request(Method::GET, &path)).await?;
        if !status.is_success() {
            return Err(data_error(status, &body));
        }
        maybe_single(parse_profile_rows(&body)?)
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, IdentityError> {
        let builder = self
            .request(Method::POST, &format!("/rest/v1/{PROFILES_TABLE}"))
            .header("Prefer", "return=representation")
            .json(&[profile]);
        let (status, body) = send(builder).await?;
        if !status.is_success() {
            return Err(data_error(status, &body));
        }
        single(parse_profile_rows(&body)?)
    }
}

impl IdentityConnector for SupabaseClient {
    fn connect(&self) -> Arc<dyn IdentityService> {
        Arc::new(self.fork())
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Sign-up answers with either a session (auto-confirm) or a bare user
/// (confirmation pending); sign-in answers with a session.
fn parse_auth_response(json: &str) -> Result<AuthResponse, IdentityError> {
    let value: Value = serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))?;

    if value.get("access_token").is_some_and(|t| !t.is_null()) {
        let user_present = value.get("user").is_some_and(|u| !u.is_null());
        if !user_present {
            return Ok(AuthResponse::default());
        }
        let session: AuthSession = serde_json::from_value(value).map_err(|e| IdentityError::Parse(e.to_string()))?;
        return Ok(AuthResponse { user: Some(session.user.clone()), session: Some(session) });
    }

    let user_value = value.get("user").cloned().unwrap_or(value);
    if user_value.get("id").is_none_or(Value::is_null) {
        return Ok(AuthResponse::default());
    }
    let user: Identity = serde_json::from_value(user_value).map_err(|e| IdentityError::Parse(e.to_string()))?;
    Ok(AuthResponse { user: Some(user), session: None })
}

fn parse_profile_rows(json: &str) -> Result<Vec<Profile>, IdentityError> {
    serde_json::from_str(json).map_err(|e| IdentityError::Parse(e.to_string()))
}

fn maybe_single(mut rows: Vec<Profile>) -> Result<Option<Profile>, IdentityError> {
    match rows.len() {
        0 => Ok(None),
        1 => Ok(rows.pop()),
        n => Err(singular_error(n)),
    }
}

fn single(mut rows: Vec<Profile>) -> Result<Profile, IdentityError> {
    match rows.len() {
        1 => rows.pop().ok_or_else(|| singular_error(0)),
        n => Err(singular_error(n)),
    }
}

fn singular_error(rows: usize) -> IdentityError {
    IdentityError::Data {
        status: StatusCode::NOT_ACCEPTABLE.as_u16(),
        code: Some(PGRST_SINGULAR.to_owned()),
        message: format!("JSON object requested, {rows} rows returned"),
    }
}

/// Pull `(code, message)` out of a GoTrue or PostgREST error body.
///
/// GoTrue uses `msg`/`error_description` with `error_code`/`error`;
/// PostgREST uses `message` with a string `code`.
fn extract_error(status: StatusCode, body: &str) -> (Option<String>, String) {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        let message = if body.trim().is_empty() { status.to_string() } else { body.trim().to_owned() };
        return (None, message);
    };

    let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);

    let message = text("msg")
        .or_else(|| text("message"))
        .or_else(|| text("error_description"))
        .or_else(|| text("error"))
        .unwrap_or_else(|| status.to_string());
    let code = text("error_code")
        .or_else(|| text("code"))
        .or_else(|| if value.get("error_description").is_some() { text("error") } else { None });
    (code, message)
}

fn auth_error(status: StatusCode, body: &str) -> IdentityError {
    let (code, message) = extract_error(status, body);
    IdentityError::Auth { status: status.as_u16(), code, message }
}

fn data_error(status: StatusCode, body: &str) -> IdentityError {
    let (code, message) = extract_error(status, body);
    IdentityError::Data { status: status.as_u16(), code, message }
}

#[cfg(test)]
#[path = "supabase_test.rs"]
mod tests;
