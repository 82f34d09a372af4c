//! NMOS auth gate
//!
//! Serves example NMOS registration, query and connection APIs, each
//! protected by an authorization gate.

use nmos_auth::auth::resolver::ReqwestHttpClient;
use nmos_auth::config::Config;
use nmos_auth::discovery::StaticDiscovery;
use nmos_auth::routes::{self, build_auth_context, init_metrics_recorder, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nmos_auth=debug,auth=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting NMOS auth gate");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        auth_enabled = config.auth_enabled,
        auth_service_name = %config.auth_service_name,
        key_mode = config.key_mode.as_str(),
        jwt_clock_skew_seconds = config.jwt_clock_skew_seconds,
        "Configuration loaded successfully"
    );

    if !config.auth_enabled {
        warn!("Authorization is DISABLED; all NMOS API requests will be served");
    }

    // Initialize Prometheus metrics recorder
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Static discovery: the configured authorization server under its service name
    let mut discovery = StaticDiscovery::new();
    if let Some(href) = &config.auth_server_url {
        discovery = discovery.with_service(&config.auth_service_name, href)?;
    }

    let http = ReqwestHttpClient::new(Duration::from_secs(config.key_fetch_timeout_seconds))?;
    let auth = build_auth_context(&config, Arc::new(discovery), Arc::new(http));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState { config, auth });
    let app = routes::build_routes(state, metrics_handle);

    info!("NMOS auth gate listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("NMOS auth gate shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
