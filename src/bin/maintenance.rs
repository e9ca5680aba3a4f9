use std::env;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

use taskboard::{
    config::AppConfig,
    db::{self, PgPool},
    store::{PgStore, TaskStore},
};

const USAGE: &str = "Usage: maintenance <purge-reset-tokens|migrate>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("purge-reset-tokens") => purge_reset_tokens().await?,
        Some("migrate") => migrate()?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn purge_reset_tokens() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = connect(&config)?;
    let store = PgStore::new(pool, config.store_timeout());

    let purged = store
        .purge_reset_tokens(Utc::now())
        .await
        .context("failed to purge reset tokens")?;

    println!("Purged {purged} used or expired reset tokens.");
    Ok(())
}

fn migrate() -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = connect(&config)?;
    let applied = db::run_migrations(&pool)?;
    println!("Applied {applied} pending migrations.");
    Ok(())
}

fn connect(config: &AppConfig) -> Result<PgPool> {
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set for maintenance commands")?;
    db::init_pool_with_size(database_url, 1)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
