//! Process entry point: resolves configuration, wires the store/auth/blob/multiplexer
//! components, and serves the HTTP + live-channel surface.

use phoenixstore::auth::{AuthCore, AuthSettings, JwtSecret};
use phoenixstore::blob::BlobStore;
use phoenixstore::config::Config;
use phoenixstore::http::{router, AppState};
use phoenixstore::multiplexer::{Multiplexer, MultiplexerSettings};
use phoenixstore::store::memory::MemoryStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter.clone()))
        .init();

    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(AuthCore::new(
        store.clone(),
        JwtSecret::new(config.jwt_secret.clone()),
        AuthSettings {
            access_ttl: config.jwt_access_ttl,
            refresh_ttl: config.jwt_refresh_ttl,
            blocklist_deadline: config.blocklist_deadline,
        },
    ));
    let blobs = Arc::new(BlobStore::new());
    let multiplexer = Arc::new(Multiplexer::new(
        store.clone(),
        auth.clone(),
        config.max_channels,
        MultiplexerSettings {
            heartbeat_interval: config.heartbeat_interval,
            ping_timeout: config.ping_timeout,
        },
    ));

    let state = AppState {
        store,
        auth,
        blobs,
        multiplexer,
    };

    let app = router(state);
    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
