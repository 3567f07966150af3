use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use scratchpad_api::{build_router, handlers::well_known::ResourceMetadata, AppState};
use scratchpad_core::clock::SystemClock;
use scratchpad_core::repositories::InMemoryScratchpadRepository;
use scratchpad_core::services::{
    spawn_sweeper, ScratchpadService, SessionStore, ToolChannelFactory, ToolDispatcher,
};
use scratchpad_security::{HttpKeySource, IdentityVerifier, VerifierConfig};
use scratchpad_shared::config::LoggingSettings;
use scratchpad_shared::constants::SERVICE_NAME;
use scratchpad_shared::telemetry::init_telemetry;
use scratchpad_shared::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (.env, config/settings.*, SCRATCHPAD_* variables)
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            init_telemetry(&LoggingSettings::default());
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_telemetry(&settings.logging);

    info!(
        service = SERVICE_NAME,
        version = env!("CARGO_PKG_VERSION"),
        base_url = %settings.server.base_url,
        "MCP Scratchpad server starting"
    );

    // Identity verification
    let key_source = HttpKeySource::new(
        settings.authority.jwks_uri(),
        Duration::from_secs(settings.authority.jwks_fetch_timeout_secs),
    )?;
    let verifier = Arc::new(IdentityVerifier::new(
        VerifierConfig::from_settings(&settings.authority),
        Arc::new(key_source),
    ));

    // Scratchpad storage and per-session tool channels
    let repo = Arc::new(InMemoryScratchpadRepository::new());
    let dispatcher = Arc::new(ToolDispatcher::new(Arc::new(ScratchpadService::new(repo))));
    let sessions = Arc::new(SessionStore::new(
        Arc::new(ToolChannelFactory::new(dispatcher)),
        Arc::new(SystemClock),
        settings.session.enforce_owner,
    ));

    let shutdown = CancellationToken::new();
    let sweeper = settings
        .session
        .ttl()
        .map(|ttl| spawn_sweeper(sessions.clone(), ttl, shutdown.clone()));

    let state = AppState::new(
        verifier,
        sessions.clone(),
        ResourceMetadata::from_settings(&settings),
    );
    let app = build_router(state);

    // Bind address
    let host: IpAddr = settings.server.host.parse()?;
    let addr = SocketAddr::from((host, settings.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain
    shutdown.cancel();
    if let Some(handle) = sweeper {
        if let Err(e) = handle.await {
            warn!("Session sweeper did not stop cleanly: {}", e);
        }
    }
    let drained = sessions.drain();
    info!(count = drained, "Sessions drained, process terminated");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        _ = ctrl_c => info!("SIGINT received, shutting down gracefully"),
        _ = terminate => info!("SIGTERM received, shutting down gracefully"),
    }
}
