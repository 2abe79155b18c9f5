//! Session store — the current identity, its profile, and status flags.
//!
//! ARCHITECTURE
//! ============
//! One store per browser session, each owning its own `IdentityService`
//! handle. State lives in a `watch` channel: the sender is the single source
//! of truth and every consumer subscribes for changes.
//!
//! CONTRACT
//! ========
//! - Operations never return errors. Each failure is reduced to a
//!   `SessionError` and stored in `error`; the last error wins.
//! - `error` is cleared and `loading` raised when an operation starts;
//!   `loading` drops when it ends, whatever the outcome.
//! - Login succeeds once an identity is returned. A failed profile fetch
//!   afterwards records an error but keeps the identity.
//! - Operations on one store run one at a time (single flight).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{E_NO_IDENTITY, E_NO_USER, SessionError};
use crate::identity::{DEFAULT_PLAN, Identity, IdentityService, NewProfile, Profile};

/// Point-in-time copy of a store's state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub profile: Option<Profile>,
    pub loading: bool,
    pub error: Option<SessionError>,
}

impl SessionSnapshot {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

pub struct SessionStore {
    service: Arc<dyn IdentityService>,
    state: watch::Sender<SessionSnapshot>,
    flight: Mutex<()>,
}

impl SessionStore {
    #[must_use]
    pub fn new(service: Arc<dyn IdentityService>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self { service, state, flight: Mutex::new(()) }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receive every state change from now on.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Log sign-in and sign-out transitions under `tag` until the store is
    /// dropped.
    pub fn spawn_transition_log(&self, tag: String) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            let mut authenticated = rx.borrow_and_update().is_authenticated();
            while rx.changed().await.is_ok() {
                let now = rx.borrow_and_update().is_authenticated();
                if now != authenticated {
                    tracing::info!(session = %tag, authenticated = now, "session transition");
                    authenticated = now;
                }
            }
            tracing::debug!(session = %tag, "session store dropped");
        })
    }

    /// The remote authority this store talks to.
    #[must_use]
    pub fn service(&self) -> Arc<dyn IdentityService> {
        Arc::clone(&self.service)
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Create an account and its profile row tagged with `plan`.
    pub async fn register(&self, email: &str, password: &str, plan: &str) {
        let _flight = self.flight.lock().await;
        self.begin();
        let outcome = self.register_inner(email, password, plan).await;
        self.finish("register", outcome);
    }

    /// Verify credentials, then load (or create) the profile.
    pub async fn login(&self, email: &str, password: &str) {
        let _flight = self.flight.lock().await;
        self.begin();
        let outcome = self.login_inner(email, password).await;
        self.finish("login", outcome);
    }

    /// End the remote session. Local state is cleared only on success.
    pub async fn logout(&self) {
        let _flight = self.flight.lock().await;
        self.begin();
        let outcome = self.logout_inner().await;
        self.finish("logout", outcome);
    }

    /// Load the profile for the current identity, creating a default one if
    /// the row is missing.
    pub async fn fetch_profile(&self) {
        let _flight = self.flight.lock().await;
        self.begin();
        let outcome = self.fetch_profile_inner().await;
        self.finish("fetch_profile", outcome);
    }

    // =========================================================================
    // STEPS
    // =========================================================================

    async fn register_inner(&self, email: &str, password: &str, plan: &str) -> Result<(), SessionError> {
        let response = self
            .service
            .sign_up(email, password)
            .await
            .map_err(|e| SessionError::auth(&e))?;

        let Some(user) = response.user else {
            tracing::info!("sign-up accepted without a user; confirmation pending");
            return Ok(());
        };

        let profile = self
            .service
            .insert_profile(&NewProfile::new(user.id, plan))
            .await
            .map_err(|e| SessionError::data("Failed to create profile", &e))?;

        tracing::info!(user_id = %user.id, plan, "registered");
        self.state.send_modify(|s| {
            s.identity = Some(user);
            s.profile = Some(profile);
        });
        Ok(())
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let response = self
            .service
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| SessionError::auth(&e))?;

        let Some(user) = response.user else {
            return Err(SessionError::invariant(E_NO_USER, "No user data returned from authentication"));
        };

        tracing::info!(user_id = %user.id, "signed in");
        self.state.send_modify(|s| {
            if s.identity.as_ref().is_none_or(|current| current.id != user.id) {
                s.profile = None;
            }
            s.identity = Some(user);
        });

        // Identity stays valid even when the profile cannot be loaded.
        if let Err(err) = self.fetch_profile_inner().await {
            self.record("login.fetch_profile", err);
        }
        Ok(())
    }

    async fn logout_inner(&self) -> Result<(), SessionError> {
        self.service
            .sign_out()
            .await
            .map_err(|e| SessionError::auth(&e))?;

        self.state.send_modify(|s| {
            s.identity = None;
            s.profile = None;
        });
        Ok(())
    }

    async fn fetch_profile_inner(&self) -> Result<(), SessionError> {
        let Some(id) = self.identity_id() else {
            return Err(SessionError::invariant(E_NO_IDENTITY, "No user found when trying to fetch profile"));
        };

        tracing::debug!(user_id = %id, "fetching profile");
        let found = self
            .service
            .find_profile(id)
            .await
            .map_err(|e| SessionError::data("Failed to fetch profile", &e))?;

        let profile = match found {
            Some(profile) => profile,
            None => {
                tracing::info!(user_id = %id, plan = DEFAULT_PLAN, "profile missing; creating");
                self.service
                    .insert_profile(&NewProfile::new(id, DEFAULT_PLAN))
                    .await
                    .map_err(|e| SessionError::data("Failed to create profile", &e))?
            }
        };

        self.state.send_modify(|s| s.profile = Some(profile));
        Ok(())
    }

    // =========================================================================
    // FLAGS
    // =========================================================================

    fn identity_id(&self) -> Option<Uuid> {
        self.state.borrow().identity.as_ref().map(|i| i.id)
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.error = None;
        });
    }

    fn finish(&self, op: &'static str, outcome: Result<(), SessionError>) {
        if let Err(err) = outcome {
            self.record(op, err);
        }
        self.state.send_modify(|s| s.loading = false);
    }

    fn record(&self, op: &'static str, err: SessionError) {
        tracing::warn!(op, code = err.code(), message = err.message(), "session operation failed");
        self.state.send_modify(|s| s.error = Some(err));
    }
}

#[cfg(test)]
#[path = "session_store_test.rs"]
mod tests;
