//! Error codes and the session error surfaced to consumers.
//!
//! DESIGN
//! ======
//! Remote failures arrive as `IdentityError` and are reduced at the session
//! store boundary to a `SessionError`: a tagged value with a kind, a grepable
//! code, and the remote message. Consumers branch on `kind`/`code` instead
//! of matching message text.

use serde::{Deserialize, Serialize};

use crate::identity::IdentityError;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Login returned neither a user nor an error.
pub const E_NO_USER: &str = "E_NO_USER";

/// Profile lookup requested without an authenticated identity.
pub const E_NO_IDENTITY: &str = "E_NO_IDENTITY";

// =============================================================================
// SESSION ERROR
// =============================================================================

/// Last failure recorded by a session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionError {
    /// Remote authentication failure (bad credentials, duplicate account).
    #[error("{message}")]
    Auth { code: String, message: String },

    /// Remote row failure (profile lookup or insert).
    #[error("{message}")]
    Data { code: String, message: String },

    /// A logical precondition did not hold.
    #[error("{message}")]
    InvariantViolation { code: String, message: String },
}

impl SessionError {
    /// Wrap a failure from an authentication call.
    #[must_use]
    pub fn auth(err: &IdentityError) -> Self {
        Self::Auth { code: remote_code(err), message: err.to_string() }
    }

    /// Wrap a failure from a profile row call, prefixing `context`.
    #[must_use]
    pub fn data(context: &str, err: &IdentityError) -> Self {
        Self::Data { code: remote_code(err), message: format!("{context}: {err}") }
    }

    #[must_use]
    pub fn invariant(code: &str, message: impl Into<String>) -> Self {
        Self::InvariantViolation { code: code.to_owned(), message: message.into() }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Auth { code, .. } | Self::Data { code, .. } | Self::InvariantViolation { code, .. } => code,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Auth { message, .. } | Self::Data { message, .. } | Self::InvariantViolation { message, .. } => {
                message
            }
        }
    }
}

/// Prefer the code the remote service reported; fall back to our own.
fn remote_code(err: &IdentityError) -> String {
    err.remote_code()
        .map_or_else(|| err.error_code().to_owned(), str::to_owned)
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
