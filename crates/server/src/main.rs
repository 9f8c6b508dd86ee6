use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orderflow_core::{
    load_config, load_config_from_env, spawn_sweeper, validate_config, Config, EntityIdCache,
    InMemorySessionStore, Marketplace, OrderDispatcher, SessionStore, SqliteOrderStore,
};
use orderflow_server::api::create_router;
use orderflow_server::metrics::REGISTRY;
use orderflow_server::state::AppState;

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration. An explicit ORDERFLOW_CONFIG must exist; without
    // it, config.toml is optional and the environment alone is enough.
    let config = match std::env::var_os("ORDERFLOW_CONFIG").map(PathBuf::from) {
        Some(config_path) => load_from_file(&config_path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => load_from_file(Path::new(DEFAULT_CONFIG))?,
        None => {
            info!("No {} found, loading configuration from environment", DEFAULT_CONFIG);
            load_config_from_env().context("Failed to load config from environment")?
        }
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Work directory: {:?}", config.dispatch.work_dir);
    info!(
        parallel = config.dispatch.parallel,
        max_concurrency = config.dispatch.max_concurrency,
        timeout_secs = config.supervisor.timeout_secs,
        skip_execution = config.supervisor.skip_execution,
        "Dispatch settings"
    );
    for marketplace in Marketplace::ALL {
        let settings = config.marketplace(marketplace);
        info!(
            %marketplace,
            enabled = settings.enabled,
            base_dir = %settings.base_dir.display(),
            executable = settings.executable.as_deref().unwrap_or("-"),
            "Marketplace configured"
        );
    }

    // Create entity id cache, backed by the order store when configured
    let entity_cache = match &config.order_store {
        Some(store_config) => {
            let store = SqliteOrderStore::new(&store_config.path).with_context(|| {
                format!("Failed to open order store at {:?}", store_config.path)
            })?;
            info!("Order store initialized at {:?}", store_config.path);
            EntityIdCache::new(Arc::new(store))
        }
        None => {
            info!("No order store configured; entity ids fall back to system ref ids");
            EntityIdCache::without_store()
        }
    };

    // Create session store and its expiry loop
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sweeper_handle = spawn_sweeper(
        Arc::clone(&sessions),
        Duration::from_secs(config.dispatch.sweep_interval_secs),
        Duration::from_secs(config.dispatch.session_grace_secs),
        shutdown_rx,
    );

    let addr = SocketAddr::new(config.server.host, config.server.port);

    let dispatcher = Arc::new(OrderDispatcher::new(
        config,
        sessions,
        Arc::new(entity_cache),
    ));
    let state = Arc::new(AppState::new(dispatcher));

    // Register metrics before the first scrape
    once_cell::sync::Lazy::force(&REGISTRY);

    // Create router
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the session sweeper
    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    let _ = sweeper_handle.await;
    info!("Session sweeper stopped");

    Ok(())
}

fn load_from_file(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", config_path);
    load_config(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
