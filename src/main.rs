use qms_backend::config::{AppConfig, StorageBackend};
use qms_backend::run_server;
use qms_backend::store::{MemoryStore, PostgresStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}, storage={:?}",
        config.server_address(),
        config.storage.backend
    );

    let load_seed = std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true";

    match config.storage.backend {
        StorageBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url()?;
            let store = PostgresStore::new(&database_url, config.max_connections()).await?;

            log::info!("Running database migrations...");
            store.migrate().await?;

            run_server(Arc::new(store), &config, load_seed).await
        }
        StorageBackend::Memory => {
            log::warn!("Using the in-memory store; data is lost on shutdown");
            run_server(Arc::new(MemoryStore::new()), &config, load_seed).await
        }
    }
}
