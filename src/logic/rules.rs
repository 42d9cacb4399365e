use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::error::{QmsError, QmsResult};
use crate::model::{generate_id, severity, Actor, EntityKind, Id, Record, RetiredCode, Timestamp};
use crate::store::RecordStore;

/// Recomputes derived fields in place. Runs on every write and every read.
pub fn apply_derived(kind: EntityKind, fields: &mut Map<String, Value>) {
    match kind {
        EntityKind::Risk => {
            let level = match (
                fields.get("probability").and_then(Value::as_i64),
                fields.get("impact").and_then(Value::as_i64),
            ) {
                (Some(probability), Some(impact)) => severity(probability, impact)
                    .map(|severity| Value::String(severity.as_str().to_string()))
                    .unwrap_or(Value::Null),
                _ => Value::Null,
            };
            fields.insert("severity".to_string(), level);
        }
        EntityKind::IndicatorMeasurement => {
            let meets = match (
                fields.get("value").and_then(Value::as_f64),
                fields.get("target").and_then(Value::as_f64),
            ) {
                (Some(value), Some(target)) => Value::Bool(value >= target),
                _ => Value::Null,
            };
            fields.insert("meets_target".to_string(), meets);
        }
        _ => {}
    }
}

/// Read-side counterpart of [`apply_derived`].
pub fn decorate(mut record: Record) -> Record {
    apply_derived(record.kind, &mut record.fields);
    record
}

const VERSION_NUMBER: &str = "number";

/// Reservation key of a document version number. Numbers are unique per
/// document, so the document id is part of the key.
fn version_key(document_id: &Id, number: i64) -> String {
    format!("{}#{}", document_id, number)
}

/// Version numbers freed by a delete, reserved so they are never handed out
/// again for the same document.
pub fn retired_numbers(deleted: &[Record], now: Timestamp) -> Vec<RetiredCode> {
    deleted
        .iter()
        .filter(|record| record.kind == EntityKind::DocumentVersion)
        .filter_map(|record| {
            let document_id = record.get_id("document_id")?;
            let number = record.get_i64(VERSION_NUMBER)?;
            Some(RetiredCode {
                kind: EntityKind::DocumentVersion,
                field: VERSION_NUMBER,
                value: version_key(&document_id, number),
                retired_at: now,
            })
        })
        .collect()
}

/// Fills fields the service assigns on create.
pub async fn assign_generated<S: RecordStore + ?Sized>(
    store: &S,
    kind: EntityKind,
    fields: &mut Map<String, Value>,
) -> QmsResult<()> {
    match kind {
        EntityKind::DocumentVersion => {
            let Some(document_id) = fields
                .get("document_id")
                .and_then(Value::as_str)
                .and_then(|raw| Id::parse_str(raw).ok())
            else {
                return Ok(());
            };
            let latest = store
                .find_referencing(EntityKind::DocumentVersion, "document_id", &document_id)
                .await?
                .iter()
                .filter_map(|version| version.get_i64("number"))
                .max()
                .unwrap_or(0);
            // numbers of deleted versions above the survivors stay taken
            let mut next = latest + 1;
            while store
                .is_code_retired(
                    EntityKind::DocumentVersion,
                    VERSION_NUMBER,
                    &version_key(&document_id, next),
                    false,
                )
                .await?
            {
                next += 1;
            }
            fields.insert(VERSION_NUMBER.to_string(), Value::from(next));
        }
        EntityKind::IndicatorMeasurement => {
            // a measurement without its own target is judged against the
            // indicator's
            let inherit = fields.get("target").map_or(true, Value::is_null);
            let indicator_id = fields
                .get("indicator_id")
                .and_then(Value::as_str)
                .and_then(|raw| Id::parse_str(raw).ok());
            if let (true, Some(indicator_id)) = (inherit, indicator_id) {
                if let Some(indicator) = store
                    .get_record(EntityKind::Indicator, &indicator_id)
                    .await?
                {
                    let target = indicator.get("target").cloned().unwrap_or(Value::Null);
                    fields.insert("target".to_string(), target);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Cross-row rules checked against the state a write would produce.
/// `before` is `None` on create.
pub async fn check_rules<S: RecordStore + ?Sized>(
    store: &S,
    before: Option<&Record>,
    after: &Record,
) -> QmsResult<()> {
    if after.kind == EntityKind::Risk {
        let closing = after.get_str("state") == Some("closed")
            && before.and_then(|record| record.get_str("state")) != Some("closed");
        if closing {
            let controls = store
                .find_referencing(EntityKind::RiskControl, "risk_id", &after.id)
                .await?;
            if !controls
                .iter()
                .any(|control| control.get_bool("active") == Some(true))
            {
                return Err(QmsError::invalid(
                    "state",
                    "a risk cannot be closed without at least one active control",
                ));
            }
        }
    }

    if matches!(after.kind, EntityKind::Process | EntityKind::ProcessStage) {
        if let Some(owner_id) = after.get_id("owner_id") {
            let reassigned = before.and_then(|record| record.get_id("owner_id")) != Some(owner_id);
            if reassigned {
                let owner = store.get_record(EntityKind::User, &owner_id).await?;
                if owner.and_then(|user| user.get_bool("active")) == Some(false) {
                    return Err(QmsError::invalid("owner_id", "must reference an active user"));
                }
            }
        }
    }
    Ok(())
}

/// Rows that stay attached to a process stage while they are live. The
/// stage cannot be removed until they are settled or moved.
const STAGE_BLOCKERS: [(EntityKind, &str); 2] =
    [(EntityKind::Risk, "active"), (EntityKind::Finding, "open")];

/// Delete rules beyond the per-reference policies: a process stage with
/// active risks or open findings that survive the delete is kept.
pub async fn check_delete<S: RecordStore + ?Sized>(store: &S, deletes: &[Record]) -> QmsResult<()> {
    let deleting: HashSet<(EntityKind, Id)> =
        deletes.iter().map(|record| (record.kind, record.id)).collect();
    for stage in deletes.iter().filter(|record| record.kind == EntityKind::ProcessStage) {
        for (dependent, live_state) in STAGE_BLOCKERS {
            let count = store
                .find_referencing(dependent, "stage_id", &stage.id)
                .await?
                .iter()
                .filter(|row| !deleting.contains(&(row.kind, row.id)))
                .filter(|row| row.get_str("state") == Some(live_state))
                .count();
            if count > 0 {
                return Err(QmsError::DependencyConflict {
                    entity: EntityKind::ProcessStage,
                    id: stage.id,
                    dependent,
                    field: "stage_id".to_string(),
                    count,
                });
            }
        }
    }
    Ok(())
}

/// History row appended when a risk is assessed: on create, and whenever
/// probability or impact change.
pub fn risk_evaluation(
    before: Option<&Record>,
    after: &Record,
    actor: &Actor,
    now: Timestamp,
) -> Option<Record> {
    if after.kind != EntityKind::Risk {
        return None;
    }
    let reassessed = match before {
        None => true,
        Some(before) => {
            before.get("probability") != after.get("probability")
                || before.get("impact") != after.get("impact")
        }
    };
    if !reassessed {
        return None;
    }

    let field = |record: Option<&Record>, name: &str| {
        record
            .and_then(|record| record.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    };
    let mut fields = Map::new();
    fields.insert("risk_id".to_string(), Value::String(after.id.to_string()));
    fields.insert("previous_probability".to_string(), field(before, "probability"));
    fields.insert("previous_impact".to_string(), field(before, "impact"));
    fields.insert("previous_severity".to_string(), field(before, "severity"));
    fields.insert("new_probability".to_string(), field(Some(after), "probability"));
    fields.insert("new_impact".to_string(), field(Some(after), "impact"));
    fields.insert("new_severity".to_string(), field(Some(after), "severity"));
    fields.insert("justification".to_string(), Value::Null);
    fields.insert(
        "evaluated_by".to_string(),
        actor.user.clone().map(Value::String).unwrap_or(Value::Null),
    );
    fields.insert(
        "evaluated_at".to_string(),
        Value::String(crate::model::format_timestamp(&now)),
    );
    Some(Record::new(EntityKind::RiskEvaluation, generate_id(), fields, now))
}
