//! Keyline identity provider server.
//!
//! Wires the in-memory repositories, the key service, the OIDC engine and
//! the background scheduler into one Axum server.

mod bootstrap;
mod config;
mod logging;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use config::{Config, KeyStoreBackend};
use keyline_core::{Clock, SystemClock};
use keyline_db::{
    ApplicationRepository, CredentialRepository, MemoryApplicationRepository,
    MemoryCredentialRepository, MemoryRoleAssignmentRepository, MemorySessionRepository,
    MemoryUserRepository, MemoryVirtualServerRepository, RoleAssignmentRepository,
    SessionRepository, UserRepository, VirtualServerRepository,
};
use keyline_jobs::{KeyRotationJob, NoLeaderElection, Scheduler};
use keyline_keys::{DirectoryKeyStore, KeyService, KeyStore, MemoryKeyStore};
use keyline_oidc::{login_router, oidc_router, OidcState, OidcStateConfig};
use keyline_store::{KvStore, MemoryKvStore};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.log_filter, config.environment);
    info!(
        external_url = %config.external_url,
        environment = ?config.environment,
        "Starting keyline-idp"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let key_store: Arc<dyn KeyStore> = match &config.key_store {
        KeyStoreBackend::Memory => Arc::new(MemoryKeyStore::new()),
        KeyStoreBackend::Directory(dir) => Arc::new(DirectoryKeyStore::new(dir.clone())),
    };
    let key_service = Arc::new(KeyService::new(key_store, clock.clone()));

    let virtual_servers: Arc<dyn VirtualServerRepository> =
        Arc::new(MemoryVirtualServerRepository::new());
    let users: Arc<dyn UserRepository> = Arc::new(MemoryUserRepository::new());
    let applications: Arc<dyn ApplicationRepository> = Arc::new(MemoryApplicationRepository::new());
    let credentials: Arc<dyn CredentialRepository> = Arc::new(MemoryCredentialRepository::new());
    let role_assignments: Arc<dyn RoleAssignmentRepository> =
        Arc::new(MemoryRoleAssignmentRepository::new());
    let session_repository: Arc<dyn SessionRepository> = Arc::new(MemorySessionRepository::new());
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new(clock.clone()));

    match bootstrap::run_bootstrap(&virtual_servers, &users, &credentials, &key_service).await {
        Ok(result) => info!(
            virtual_server = %result.virtual_server_id,
            issuer = %format!("{}/oidc/{}", config.external_url, bootstrap::DEFAULT_VIRTUAL_SERVER),
            "Bootstrap complete"
        ),
        Err(e) => {
            tracing::error!("Bootstrap failed: {e}");
            std::process::exit(1);
        }
    }

    let state = OidcState::new(OidcStateConfig {
        virtual_servers: virtual_servers.clone(),
        users,
        applications,
        credentials,
        role_assignments,
        session_repository,
        key_service: key_service.clone(),
        kv,
        clock,
        external_url: config.external_url.clone(),
        frontend_url: config.frontend_url.clone(),
    });

    let app = Router::new()
        .route("/health", get(health_handler))
        .nest("/oidc", oidc_router(state.clone()))
        .nest("/login-sessions", login_router(state))
        .layer(TraceLayer::new_for_http());

    let shutdown = CancellationToken::new();
    let mut scheduler = Scheduler::new(Arc::new(NoLeaderElection));
    scheduler.queue(Arc::new(KeyRotationJob::new(virtual_servers, key_service)));
    let job_handles = scheduler.start(shutdown.clone());

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, "Failed to bind: {e}");
            std::process::exit(1);
        }
    };
    info!(addr = %config.listen_addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }

    shutdown.cancel();
    for handle in job_handles {
        let _ = handle.await;
    }
    info!("Server shutdown complete");
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
