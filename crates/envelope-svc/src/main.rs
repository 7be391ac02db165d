//! `envelope-svc` — HTTP envelope encryption service.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (JSON logs, optional OTLP spans).
//! 3. Build the key-encrypting-key provider (local master key or KMS).
//! 4. Build the Axum router and start the HTTP server.

mod config;
mod keys;
mod server;
mod telemetry;

use anyhow::Result;
use envelope::Encryptor;
use tracing::{info, warn};

use config::Config;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        "envelope-svc starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key encryption key
    // -----------------------------------------------------------------------
    let provider = keys::build_provider(&cfg).await?;
    let encryptor = Encryptor::from_arc(provider).accept_legacy(cfg.accept_legacy_envelopes);

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(AppState::new(encryptor), cfg.request_timeout());

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry::shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
