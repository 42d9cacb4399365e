use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FieldError, QmsError};
use crate::logic::analytics::{self, FieldCounts, IndicatorTrend, RiskHeatmap};
use crate::logic::{DeleteSummary, EntityService};
use crate::model::{
    catalog, definition, severity_matrix, Actor, EntityDef, EntityKind, EntitySummary, Id, Page,
    Record, SeverityMatrix,
};
use crate::store::Store;

pub type AppState<S> = Arc<EntityService<S>>;

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: message.to_string(),
            code: code.to_string(),
            details: Vec::new(),
        }
    }
}

pub fn status_for(error: &QmsError) -> StatusCode {
    match error {
        QmsError::Validation(_) | QmsError::Reference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        QmsError::UniquenessConflict { .. } | QmsError::DependencyConflict { .. } => {
            StatusCode::CONFLICT
        }
        QmsError::NotFound { .. } => StatusCode::NOT_FOUND,
        QmsError::ReadOnly(_) => StatusCode::METHOD_NOT_ALLOWED,
        QmsError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_response(error: QmsError) -> (StatusCode, Json<ErrorResponse>) {
    let status = status_for(&error);
    let mut details = error.field_errors().to_vec();
    if let QmsError::Reference { field, target, id } = &error {
        details.push(FieldError::new(
            field.as_str(),
            format!("references missing {} {}", target, id),
        ));
    }
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
            details,
        }),
    )
}

fn resolve_entity(name: &str) -> ApiResult<&'static EntityDef> {
    catalog().resolve(name).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                &format!("Unknown entity '{}'", name),
            )),
        )
    })
}

/// An id that is not a UUID cannot name an existing row.
fn parse_id(def: &EntityDef, raw: &str) -> ApiResult<Id> {
    Id::parse_str(raw).map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "not_found",
                &format!("{} {} not found", def.kind, raw),
            )),
        )
    })
}

fn into_object(body: Value) -> ApiResult<Map<String, Value>> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(error_response(QmsError::invalid(
            "body",
            "must be a JSON object",
        ))),
    }
}

pub async fn list_entities() -> Json<Vec<EntitySummary>> {
    Json(catalog().summaries())
}

pub async fn describe_entity(Path(entity): Path<String>) -> ApiResult<Json<EntityDef>> {
    let def = resolve_entity(&entity)?;
    Ok(Json(def.clone()))
}

pub async fn get_severity_matrix() -> Json<SeverityMatrix> {
    Json(severity_matrix())
}

pub async fn list_records<S: Store>(
    State(service): State<AppState<S>>,
    Path(entity): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<Record>>> {
    let def = resolve_entity(&entity)?;
    service
        .list(def.kind, &params)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn create_record<S: Store>(
    State(service): State<AppState<S>>,
    Path(entity): Path<String>,
    actor: Actor,
    RequestJson(body): RequestJson<Value>,
) -> ApiResult<(StatusCode, Json<Record>)> {
    let def = resolve_entity(&entity)?;
    let fields = into_object(body)?;
    let record = service
        .create(def.kind, fields, &actor)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn get_record<S: Store>(
    State(service): State<AppState<S>>,
    Path((entity, id)): Path<(String, String)>,
) -> ApiResult<Json<Record>> {
    let def = resolve_entity(&entity)?;
    let id = parse_id(def, &id)?;
    service
        .get(def.kind, id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// Serves both PUT and PATCH: either way only the supplied fields change.
pub async fn update_record<S: Store>(
    State(service): State<AppState<S>>,
    Path((entity, id)): Path<(String, String)>,
    actor: Actor,
    RequestJson(body): RequestJson<Value>,
) -> ApiResult<Json<Record>> {
    let def = resolve_entity(&entity)?;
    let id = parse_id(def, &id)?;
    let patch = into_object(body)?;
    service
        .update(def.kind, id, patch, &actor)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn delete_record<S: Store>(
    State(service): State<AppState<S>>,
    Path((entity, id)): Path<(String, String)>,
    actor: Actor,
) -> ApiResult<Json<DeleteSummary>> {
    let def = resolve_entity(&entity)?;
    let id = parse_id(def, &id)?;
    service
        .delete(def.kind, id, &actor)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn list_related<S: Store>(
    State(service): State<AppState<S>>,
    Path((entity, id, related)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Page<Record>>> {
    let parent = resolve_entity(&entity)?;
    let id = parse_id(parent, &id)?;
    let child = resolve_entity(&related)?;
    service
        .list_children(parent.kind, id, child.kind, &params)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn count_by_field<S: Store>(
    State(service): State<AppState<S>>,
    Path((entity, field)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<FieldCounts>> {
    let def = resolve_entity(&entity)?;
    analytics::field_counts(
        service.store().as_ref(),
        def.kind,
        &field,
        &params,
        service.settings().limits,
    )
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn get_risk_heatmap<S: Store>(
    State(service): State<AppState<S>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<RiskHeatmap>> {
    analytics::risk_heatmap(service.store().as_ref(), &params, service.settings().limits)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_indicator_trend<S: Store>(
    State(service): State<AppState<S>>,
    Path(id): Path<String>,
) -> ApiResult<Json<IndicatorTrend>> {
    let id = parse_id(definition(EntityKind::Indicator), &id)?;
    analytics::indicator_trend(service.store().as_ref(), id)
        .await
        .map(Json)
        .map_err(error_response)
}
