use axum::{routing::get, Router};

use crate::api::handlers::{self, AppState};
use crate::store::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Catalog metadata
        .route("/meta/catalog", get(handlers::list_entities))
        .route("/meta/catalog/:entity", get(handlers::describe_entity))
        .route("/meta/severity-matrix", get(handlers::get_severity_matrix))
        // Dashboards
        .route(
            "/analytics/counts/:entity/:field",
            get(handlers::count_by_field::<S>),
        )
        .route("/analytics/risk-heatmap", get(handlers::get_risk_heatmap::<S>))
        .route(
            "/analytics/indicator-trend/:id",
            get(handlers::get_indicator_trend::<S>),
        )
        // Generic entity endpoints
        .route(
            "/api/v1/:entity",
            get(handlers::list_records::<S>).post(handlers::create_record::<S>),
        )
        .route(
            "/api/v1/:entity/:id",
            get(handlers::get_record::<S>)
                .put(handlers::update_record::<S>)
                .patch(handlers::update_record::<S>)
                .delete(handlers::delete_record::<S>),
        )
        .route(
            "/api/v1/:entity/:id/:related",
            get(handlers::list_related::<S>),
        )
}
