//! Identity — remote authentication and profile rows.
//!
//! DESIGN
//! ======
//! `IdentityService` is the seam between the session store / route guard and
//! the backend-as-a-service. Each browser gets its own service handle from an
//! `IdentityConnector`, so auth tokens are never shared between sessions.
//! `SupabaseClient` is the production adapter; tests use in-memory fakes.

#[cfg(test)]
pub mod memory;
pub mod supabase;
pub mod types;

pub use supabase::{SupabaseClient, SupabaseConfig};
pub use types::{AuthResponse, AuthSession, DEFAULT_PLAN, Identity, IdentityError, NewProfile, Profile};

use std::sync::Arc;

use uuid::Uuid;

/// Remote identity and data authority.
///
/// Implementations hold the caller's auth tokens; `get_session` re-checks
/// them against the remote authority rather than trusting a local copy.
#[async_trait::async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Return the live session, or `None` when there is none or it expired.
    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError>;

    /// Look up a profile row by identity id. Zero rows is `Ok(None)`.
    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, IdentityError>;

    /// Insert a profile row and return exactly the created row.
    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, IdentityError>;
}

/// Hands out a fresh, unauthenticated service handle per browser session.
pub trait IdentityConnector: Send + Sync {
    fn connect(&self) -> Arc<dyn IdentityService>;
}
