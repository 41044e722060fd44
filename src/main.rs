//! Gatehouse server: authentication front door assembled from plugins.
//!
//! Loads configuration, initializes every enabled compiled-in plugin, and
//! serves the merged router until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinError;
use tracing_subscriber::{EnvFilter, fmt};

use gatehouse_api::{AuthContext, AxumHost, build_router};
use gatehouse_core::config::AppConfig;
use gatehouse_core::error::AppError;
use gatehouse_plugin::{Plugin, PluginManager};
use plugin_audit::AuditPlugin;
use plugin_rate_limit::RateLimitPlugin;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration for the environment named by `GATEHOUSE_ENV`
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("GATEHOUSE_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Every plugin compiled into this binary, in registration order.
fn compiled_plugins() -> Vec<Arc<dyn Plugin<AxumHost>>> {
    vec![
        Arc::new(RateLimitPlugin::new()) as Arc<dyn Plugin<AxumHost>>,
        Arc::new(AuditPlugin::new()),
    ]
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    // ── Step 1: Select plugins ───────────────────────────────────
    let plugins: Vec<_> = compiled_plugins()
        .into_iter()
        .filter(|plugin| {
            let disabled = config.plugins.is_disabled(plugin.id());
            if disabled {
                tracing::info!(plugin_id = %plugin.id(), "Plugin disabled by configuration");
            }
            !disabled
        })
        .collect();

    // ── Step 2: Initialize plugin manager ────────────────────────
    let mut manager = if config.plugins.enforce_unique_ids {
        PluginManager::with_unique_ids(plugins)?
    } else {
        PluginManager::new(plugins)
    };
    manager
        .initialize(&AuthContext::new(Arc::clone(&config)))
        .await?;

    for path in manager.endpoint_table().paths() {
        tracing::info!(
            path = %path,
            plugin_id = ?manager.endpoint_owner(path),
            "Endpoint mounted"
        );
    }

    // ── Step 3: Build and start HTTP server ──────────────────────
    let app = build_router(&manager, &config.server);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("Gatehouse listening on {}", addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
        })
        .await
    });

    // ── Step 4: Graceful shutdown ────────────────────────────────
    tokio::select! {
        result = &mut server => return server_result(result),
        _ = shutdown_signal() => {}
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => server_result(result)?,
        Err(_) => {
            tracing::warn!(
                grace_seconds = config.server.shutdown_grace_seconds,
                "Grace period elapsed, dropping open connections"
            );
            server.abort();
        }
    }

    tracing::info!("Gatehouse shut down gracefully");
    Ok(())
}

fn server_result(result: Result<std::io::Result<()>, JoinError>) -> Result<(), AppError> {
    result
        .map_err(|e| AppError::internal(format!("Server task failed: {}", e)))?
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
