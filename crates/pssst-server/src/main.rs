use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use pssst_api::config::env_or;
use pssst_api::{AppStateInner, RelayConfig};
use pssst_crypto::{CryptoContext, Verifier};
use pssst_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pssst=debug,pssst_api=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("PSSST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = env_or("PSSST_PORT", 62421)?;
    let db_path = std::env::var("PSSST_DB_PATH").unwrap_or_else(|_| "pssst.db".into());
    let key_dir = std::env::var("PSSST_KEY_DIR").unwrap_or_else(|_| ".".into());
    let key_bits: usize = env_or("PSSST_KEY_BITS", 4096)?;
    let config = RelayConfig::from_env()?;

    // Init store and relay keys
    let db = Database::open(&PathBuf::from(&db_path))
        .with_context(|| format!("opening database {}", db_path))?;
    let crypto = CryptoContext::load_or_generate(
        &PathBuf::from(&key_dir),
        key_bits,
        Verifier::new(config.grace_secs),
    )?;

    let state = AppStateInner::new(Arc::new(db), crypto, config)?;
    let app = pssst_api::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", host, port))?;
    info!("Pssst relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Pssst relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
