use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use taskboard::{
    auth::jwt::JwtService,
    config::{AppConfig, StoreBackend},
    db,
    routes::create_router,
    state::AppState,
    store::{MemoryStore, PgStore, TaskStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        store_backend = config.store_backend.as_str(),
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        store_timeout_secs = config.store_timeout_secs,
        "loaded backend configuration"
    );

    let store = build_store(&config)?;
    let jwt = JwtService::from_config(&config);
    let addr = format!("{}:{}", config.server_host, config.server_port);

    let state = AppState::new(store, config, jwt);
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn build_store(config: &AppConfig) -> Result<Arc<dyn TaskStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set when STORE_BACKEND is postgres")?;
            let pool = db::init_pool_with_size(database_url, config.database_max_pool_size)?;
            let applied = db::run_migrations(&pool)?;
            tracing::info!(applied, "database migrations up to date");
            Ok(Arc::new(PgStore::new(pool, config.store_timeout())))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("server received shutdown signal");
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
