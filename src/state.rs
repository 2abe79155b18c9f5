//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the identity connector, the route table and guard, and a registry of
//! session stores keyed by the opaque id in each browser's `agenda_sid`
//! cookie. Stores are explicit context objects; there is no global session.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::RwLock;

use crate::identity::IdentityConnector;
use crate::services::guard::{RouteGuard, RouteTable};
use crate::services::session_store::SessionStore;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex session id.
#[must_use]
pub fn generate_sid() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

// =============================================================================
// SESSION REGISTRY
// =============================================================================

struct Entry {
    store: Arc<SessionStore>,
    touched: Instant,
}

/// Session stores keyed by browser session id. A store left untouched for
/// longer than the idle TTL is treated as gone and pruned on the next create.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(idle_ttl: Duration) -> Self {
        Self { inner: Arc::default(), idle_ttl }
    }

    /// Look up a live store and mark it used.
    pub async fn get(&self, sid: &str) -> Option<Arc<SessionStore>> {
        let mut map = self.inner.write().await;
        if map.get(sid)?.touched.elapsed() > self.idle_ttl {
            map.remove(sid);
            tracing::debug!("idle session store expired");
            return None;
        }
        let entry = map.get_mut(sid)?;
        entry.touched = Instant::now();
        Some(Arc::clone(&entry.store))
    }

    /// Register a fresh store under a new id, pruning idle ones first.
    pub async fn create(&self, connector: &dyn IdentityConnector) -> (String, Arc<SessionStore>) {
        let sid = generate_sid();
        let store = Arc::new(SessionStore::new(connector.connect()));
        store.spawn_transition_log(sid[..8].to_owned());

        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, entry| entry.touched.elapsed() <= self.idle_ttl);
        let pruned = before - map.len();
        map.insert(sid.clone(), Entry { store: Arc::clone(&store), touched: Instant::now() });
        tracing::debug!(pruned, sessions = map.len(), "session store created");
        (sid, store)
    }

    /// Forget a store, e.g. after its browser signed out.
    pub async fn remove(&self, sid: &str) {
        self.inner.write().await.remove(sid);
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum — all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn IdentityConnector>,
    pub sessions: SessionRegistry,
    pub routes: Arc<RouteTable>,
    pub guard: Arc<RouteGuard>,
    pub cookie_secure: bool,
}

impl AppState {
    #[must_use]
    pub fn new(
        connector: Arc<dyn IdentityConnector>,
        guard: RouteGuard,
        session_idle_ttl: Duration,
        cookie_secure: bool,
    ) -> Self {
        Self {
            connector,
            sessions: SessionRegistry::new(session_idle_ttl),
            routes: Arc::new(RouteTable::agenda()),
            guard: Arc::new(guard),
            cookie_secure,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
