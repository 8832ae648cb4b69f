mod auth;
mod config;
mod errors;
mod models;
mod routes;
mod session;
mod state;
mod storage;
#[cfg(test)]
mod testing;
mod upload;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::auth::GoogleIdentityProvider;
use crate::config::Config;
use crate::routes::build_router;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::storage::S3ObjectStore;
use crate::upload::UploadCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Botfolio API v{}", env!("CARGO_PKG_VERSION"));

    // Google sign-in
    let identity = Arc::new(GoogleIdentityProvider::new(config.google_client_id.clone())?);
    info!("Google identity provider initialized");

    // S3 / MinIO document store
    let store = Arc::new(S3ObjectStore::from_config(&config).await);
    info!(
        "Object store initialized (bucket: {}, endpoint: {})",
        config.s3_bucket,
        config.s3_endpoint.as_deref().unwrap_or("aws")
    );

    // Idle sessions are swept in the background
    let sessions = SessionStore::new();
    sessions.spawn_reaper(Duration::from_secs(config.session_idle_ttl_secs));
    info!("Session idle TTL: {}s", config.session_idle_ttl_secs);

    let state = AppState {
        config: config.clone(),
        sessions,
        identity,
        coordinator: UploadCoordinator::new(store),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
