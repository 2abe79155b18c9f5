mod config;
mod error;
mod identity;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use identity::SupabaseClient;
use services::guard::RouteGuard;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let supabase = SupabaseClient::new(&config.supabase).expect("identity client init failed");

    tracing::info!(
        url = %config.supabase.url,
        env = ?config.env,
        guard_timeout = ?config.guard_timeout,
        "identity service configured"
    );

    let state = state::AppState::new(
        Arc::new(supabase),
        RouteGuard::new(config.guard_timeout),
        config.session_idle_ttl,
        config.cookie_secure,
    );

    let app = routes::app(state);
    let port = config.port;
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "agendapro listening");
    axum::serve(listener, app).await.expect("server failed");
}
