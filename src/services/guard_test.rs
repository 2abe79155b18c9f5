use super::*;
use crate::identity::memory::{Failures, MemoryIdentity};
use crate::services::session_store::SessionStore;

fn guard() -> RouteGuard {
    RouteGuard::new(Duration::from_secs(1))
}

fn svc(fake: &MemoryIdentity) -> Option<&dyn IdentityService> {
    Some(fake)
}

fn route(name: &str) -> RouteDef {
    RouteTable::agenda()
        .routes()
        .iter()
        .find(|r| r.name == name)
        .cloned()
        .unwrap()
}

// =============================================================================
// RouteTable
// =============================================================================

#[test]
fn agenda_protects_management_pages() {
    let table = RouteTable::agenda();
    let protected: Vec<_> = table
        .routes()
        .iter()
        .filter(|r| r.requires_auth)
        .map(|r| r.name)
        .collect();
    assert_eq!(protected, ["dashboard", "schedule-manager", "service-manager", "appointments"]);
}

#[test]
fn resolve_literal_and_root() {
    let table = RouteTable::agenda();
    assert_eq!(table.resolve("/").unwrap().name, "home");
    assert_eq!(table.resolve("/dashboard").unwrap().name, "dashboard");
    assert_eq!(table.resolve("/dashboard/").unwrap().name, "dashboard");
    assert_eq!(table.resolve("/login").unwrap().name, "login");
}

#[test]
fn resolve_param_segment() {
    let table = RouteTable::agenda();
    assert_eq!(table.resolve("/schedule/abc-123").unwrap().name, "public-schedule");
    assert!(table.resolve("/schedule").is_none());
    assert!(table.resolve("/schedule/abc/extra").is_none());
}

#[test]
fn resolve_unknown_is_none() {
    assert!(RouteTable::agenda().resolve("/nope").is_none());
    assert!(RouteTable::agenda().resolve("/api/auth/state").is_none());
}

// =============================================================================
// Navigation state machine
// =============================================================================

#[test]
fn pending_resolves_to_redirect_without_session() {
    let nav = Navigation::Pending.resolve(true, false, LOGIN_PATH);
    assert_eq!(nav, Navigation::Redirected { to: LOGIN_PATH.into() });
    assert!(nav.is_resolved());
}

#[test]
fn pending_resolves_to_allowed() {
    assert_eq!(Navigation::Pending.resolve(true, true, LOGIN_PATH), Navigation::Allowed);
    assert_eq!(Navigation::Pending.resolve(false, false, LOGIN_PATH), Navigation::Allowed);
    assert_eq!(Navigation::Pending.resolve(false, true, LOGIN_PATH), Navigation::Allowed);
}

#[test]
fn resolved_navigation_is_terminal() {
    assert_eq!(Navigation::Allowed.resolve(true, false, LOGIN_PATH), Navigation::Allowed);
    let redirected = Navigation::Redirected { to: "/elsewhere".into() };
    assert_eq!(redirected.clone().resolve(false, true, LOGIN_PATH), redirected);
    assert!(!Navigation::Pending.is_resolved());
}

// =============================================================================
// RouteGuard
// =============================================================================

#[tokio::test]
async fn protected_route_without_service_redirects() {
    let nav = guard().navigate(&route("dashboard"), None).await;
    assert_eq!(nav, Navigation::Redirected { to: LOGIN_PATH.into() });
}

#[tokio::test]
async fn protected_route_with_live_session_is_allowed() {
    let fake = MemoryIdentity::new();
    let store = SessionStore::new(fake.clone());
    store.register("ana@example.com", "hunter22", "free").await;

    let nav = guard().navigate(&route("appointments"), svc(&fake)).await;
    assert_eq!(nav, Navigation::Allowed);
}

#[tokio::test]
async fn expired_server_session_redirects_despite_cached_identity() {
    let fake = MemoryIdentity::new();
    let store = SessionStore::new(fake.clone());
    store.register("ana@example.com", "hunter22", "free").await;
    fake.expire_session();
    assert!(store.snapshot().is_authenticated(), "local cache still holds the identity");

    let nav = guard().navigate(&route("dashboard"), svc(&fake)).await;
    assert_eq!(nav, Navigation::Redirected { to: LOGIN_PATH.into() });
}

#[tokio::test]
async fn public_routes_never_redirect() {
    let fake = MemoryIdentity::new();
    for name in ["home", "login", "register", "public-schedule"] {
        assert_eq!(guard().navigate(&route(name), None).await, Navigation::Allowed);
        assert_eq!(guard().navigate(&route(name), svc(&fake)).await, Navigation::Allowed);
    }
}

#[tokio::test]
async fn every_navigation_checks_the_session() {
    let fake = MemoryIdentity::new();
    let guard = guard();

    guard.navigate(&route("home"), svc(&fake)).await;
    guard.navigate(&route("home"), svc(&fake)).await;
    guard.navigate(&route("dashboard"), svc(&fake)).await;

    assert_eq!(fake.calls().get_session, 3);
}

#[tokio::test]
async fn slow_session_check_times_out_to_redirect() {
    let fake = MemoryIdentity::new();
    let store = SessionStore::new(fake.clone());
    store.register("ana@example.com", "hunter22", "free").await;
    fake.set_failures(Failures { session_delay: Some(Duration::from_millis(500)), ..Failures::default() });

    let guard = RouteGuard::new(Duration::from_millis(20));
    let nav = guard.navigate(&route("service-manager"), svc(&fake)).await;
    assert_eq!(nav, Navigation::Redirected { to: LOGIN_PATH.into() });

    let public = guard.navigate(&route("home"), svc(&fake)).await;
    assert_eq!(public, Navigation::Allowed);
}
