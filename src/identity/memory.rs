//! In-memory identity service for tests.
//!
//! Behaves like an auto-confirming Supabase project: sign-up signs the caller
//! in. Failures and latency are scripted through [`Failures`]; every call is
//! counted so tests can assert that no network round trip happened.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{AuthResponse, AuthSession, Identity, IdentityError, NewProfile, Profile};
use super::{IdentityConnector, IdentityService};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub sign_up: usize,
    pub sign_in: usize,
    pub sign_out: usize,
    pub get_session: usize,
    pub find_profile: usize,
    pub insert_profile: usize,
}

impl Calls {
    #[must_use]
    pub fn total(&self) -> usize {
        self.sign_up + self.sign_in + self.sign_out + self.get_session + self.find_profile + self.insert_profile
    }
}

#[derive(Debug, Default, Clone)]
pub struct Failures {
    pub sign_out: bool,
    pub find_profile: bool,
    pub insert_profile: bool,
    /// Sign-in succeeds without an error but returns no user.
    pub sign_in_without_user: bool,
    pub sign_up_delay: Option<Duration>,
    pub sign_in_delay: Option<Duration>,
    pub session_delay: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, (String, Identity)>,
    profiles: HashMap<Uuid, Profile>,
    session: Option<AuthSession>,
    calls: Calls,
    failures: Failures,
    sign_ins_in_flight: usize,
    max_sign_ins_in_flight: usize,
}

#[derive(Default)]
pub struct MemoryIdentity {
    inner: Mutex<Inner>,
}

impl MemoryIdentity {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn set_failures(&self, failures: Failures) {
        self.lock().failures = failures;
    }

    #[must_use]
    pub fn calls(&self) -> Calls {
        self.lock().calls
    }

    #[must_use]
    pub fn profile_rows(&self) -> Vec<Profile> {
        self.lock().profiles.values().cloned().collect()
    }

    #[must_use]
    pub fn max_sign_ins_in_flight(&self) -> usize {
        self.lock().max_sign_ins_in_flight
    }

    /// Revoke the session server-side, as token expiry would.
    pub fn expire_session(&self) {
        self.lock().session = None;
    }

    /// Create an account with no profile row and no session.
    pub fn seed_user(&self, email: &str, password: &str) -> Identity {
        let identity = new_identity(email);
        self.lock()
            .users
            .insert(email.to_owned(), (password.to_owned(), identity.clone()));
        identity
    }
}

fn new_identity(email: &str) -> Identity {
    Identity { id: Uuid::new_v4(), email: Some(email.to_owned()), created_at: Some(OffsetDateTime::now_utc()) }
}

fn session_for(user: &Identity) -> AuthSession {
    AuthSession {
        access_token: format!("at-{}", Uuid::new_v4()),
        refresh_token: Some(format!("rt-{}", Uuid::new_v4())),
        expires_at: Some(OffsetDateTime::now_utc().unix_timestamp() + 3600),
        user: user.clone(),
    }
}

fn auth_error(status: u16, code: &str, message: &str) -> IdentityError {
    IdentityError::Auth { status, code: Some(code.to_owned()), message: message.to_owned() }
}

fn data_error(status: u16, code: &str, message: &str) -> IdentityError {
    IdentityError::Data { status, code: Some(code.to_owned()), message: message.to_owned() }
}

#[async_trait::async_trait]
impl IdentityService for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError> {
        let delay = {
            let mut inner = self.lock();
            inner.calls.sign_up += 1;
            inner.failures.sign_up_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if inner.users.contains_key(email) {
            return Err(auth_error(422, "user_already_exists", "User already registered"));
        }
        if password.len() < 6 {
            return Err(auth_error(422, "weak_password", "Password should be at least 6 characters."));
        }

        let identity = new_identity(email);
        inner
            .users
            .insert(email.to_owned(), (password.to_owned(), identity.clone()));
        let session = session_for(&identity);
        inner.session = Some(session.clone());
        Ok(AuthResponse { user: Some(identity), session: Some(session) })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse, IdentityError> {
        let delay = {
            let mut inner = self.lock();
            inner.calls.sign_in += 1;
            inner.sign_ins_in_flight += 1;
            inner.max_sign_ins_in_flight = inner.max_sign_ins_in_flight.max(inner.sign_ins_in_flight);
            inner.failures.sign_in_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        inner.sign_ins_in_flight -= 1;
        if inner.failures.sign_in_without_user {
            return Ok(AuthResponse::default());
        }
        let identity = match inner.users.get(email) {
            Some((stored, identity)) if stored == password => identity.clone(),
            _ => return Err(auth_error(400, "invalid_credentials", "Invalid login credentials")),
        };
        let session = session_for(&identity);
        inner.session = Some(session.clone());
        Ok(AuthResponse { user: Some(identity), session: Some(session) })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let mut inner = self.lock();
        inner.calls.sign_out += 1;
        if inner.failures.sign_out {
            return Err(IdentityError::Request("connection reset by peer".into()));
        }
        inner.session = None;
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<AuthSession>, IdentityError> {
        let delay = {
            let mut inner = self.lock();
            inner.calls.get_session += 1;
            inner.failures.session_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.lock().session.clone())
    }

    async fn find_profile(&self, id: Uuid) -> Result<Option<Profile>, IdentityError> {
        let mut inner = self.lock();
        inner.calls.find_profile += 1;
        if inner.failures.find_profile {
            return Err(data_error(500, "XX000", "relation lookup failed"));
        }
        Ok(inner.profiles.get(&id).cloned())
    }

    async fn insert_profile(&self, profile: &NewProfile) -> Result<Profile, IdentityError> {
        let mut inner = self.lock();
        inner.calls.insert_profile += 1;
        if inner.failures.insert_profile {
            return Err(data_error(403, "42501", "new row violates row-level security policy"));
        }
        if inner.profiles.contains_key(&profile.id) {
            return Err(data_error(409, "23505", "duplicate key value violates unique constraint \"profiles_pkey\""));
        }

        let now = OffsetDateTime::now_utc();
        let row = Profile {
            id: profile.id,
            plan: profile.plan.clone(),
            trial_ends_at: Some(now + time::Duration::days(14)),
            created_at: now,
            updated_at: now,
        };
        inner.profiles.insert(row.id, row.clone());
        Ok(row)
    }
}

/// Connector that hands every browser the same shared fake.
pub struct MemoryConnector(pub Arc<MemoryIdentity>);

impl IdentityConnector for MemoryConnector {
    fn connect(&self) -> Arc<dyn IdentityService> {
        self.0.clone()
    }
}
