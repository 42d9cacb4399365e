pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod seed;
pub mod store;

pub use api::handlers;
pub use api::routes;

pub use error::{FieldError, QmsError, QmsResult};
pub use logic::{Clock, DeleteSummary, EntityService, ManualClock, ServiceSettings, SystemClock};
pub use model::*;
pub use store::{MemoryStore, PostgresStore, Store};

use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// The full HTTP application: routes, state and the CORS layer.
pub fn build_app<S: Store + 'static>(
    service: Arc<EntityService<S>>,
    cors_origins: &[String],
) -> anyhow::Result<Router> {
    let origins = cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin '{}'", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(routes::create_router::<S>()
        .with_state(service)
        .layer(ServiceBuilder::new().layer(cors)))
}

/// Wraps `store` in the entity service, optionally seeds it and serves the
/// API until the process is stopped.
pub async fn run_server<S: Store + 'static>(
    store: Arc<S>,
    config: &config::AppConfig,
    load_seed: bool,
) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    let service = Arc::new(EntityService::new(
        store,
        Arc::new(SystemClock),
        config.service_settings(),
    ));

    if load_seed {
        log::info!("Loading seed data...");
        seed::load_seed_data(&service).await?;
    }

    let app = build_app(service, &config.server.cors_origins)?;

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    log::info!("QMS backend listening on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
