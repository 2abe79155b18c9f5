//! Identity types — principal, session, profile rows, and errors.
//!
//! Provider-neutral shapes shared by the Supabase adapter and in-memory
//! fakes. Timestamps travel as RFC 3339 strings.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ErrorCode;

/// Plan assigned to a profile created on first fetch.
pub const DEFAULT_PLAN: &str = "free";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by identity service operations.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The auth endpoint rejected the call (bad credentials, duplicate email).
    #[error("{message}")]
    Auth { status: u16, code: Option<String>, message: String },

    /// The row endpoint rejected the call or returned an unexpected row count.
    #[error("{message}")]
    Data { status: u16, code: Option<String>, message: String },

    /// The HTTP request could not be completed.
    #[error("request failed: {0}")]
    Request(String),

    /// A response body could not be deserialized.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl IdentityError {
    /// Code reported by the remote service, if any.
    #[must_use]
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Auth { code, .. } | Self::Data { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl ErrorCode for IdentityError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "E_AUTH",
            Self::Data { .. } => "E_DATA",
            Self::Request(_) => "E_REQUEST",
            Self::Parse(_) => "E_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::Auth { status: 429 | 500..=599, .. } | Self::Data { status: 429 | 500..=599, .. }
        )
    }
}

// =============================================================================
// PRINCIPAL + SESSION
// =============================================================================

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Server-issued proof that an identity is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

/// Result of sign-up or sign-in. Both fields may be absent on a malformed
/// success response; sign-up without a session means confirmation is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResponse {
    pub user: Option<Identity>,
    pub session: Option<AuthSession>,
}

// =============================================================================
// PROFILE ROWS
// =============================================================================

/// Application record attached to an identity. Mirrors the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub plan: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub trial_ends_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Insert payload for the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub plan: String,
}

impl NewProfile {
    #[must_use]
    pub fn new(id: Uuid, plan: impl Into<String>) -> Self {
        Self { id, plan: plan.into() }
    }
}
