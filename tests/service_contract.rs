use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use qms_backend::logic::analytics::{self, Direction};
use qms_backend::logic::{EntityService, ManualClock, QueryLimits, ServiceSettings};
use qms_backend::model::{generate_id, severity, Actor, EntityKind, Id, Record};
use qms_backend::store::MemoryStore;
use qms_backend::QmsError;

struct Harness {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    service: EntityService<MemoryStore>,
    actor: Actor,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(ServiceSettings::default())
    }

    fn with_settings(settings: ServiceSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ));
        let service = EntityService::new(store.clone(), clock.clone(), settings);
        Self {
            store,
            clock,
            service,
            actor: Actor::named("tester"),
        }
    }

    async fn create(&self, kind: EntityKind, fields: Value) -> Result<Record, QmsError> {
        self.service.create(kind, object(fields), &self.actor).await
    }

    async fn update(&self, kind: EntityKind, id: Id, patch: Value) -> Result<Record, QmsError> {
        self.service.update(kind, id, object(patch), &self.actor).await
    }

    async fn area(&self, code: &str) -> Record {
        self.create(EntityKind::Area, json!({"code": code, "name": format!("Area {}", code)}))
            .await
            .unwrap()
    }

    async fn user(&self, username: &str, number: i64, area: Option<Id>) -> Record {
        self.create(
            EntityKind::User,
            json!({
                "document_number": number,
                "first_name": "Juan",
                "last_name": "Perez",
                "email": format!("{}@example.com", username),
                "username": username,
                "area_id": area,
            }),
        )
        .await
        .unwrap()
    }

    async fn process(&self, code: &str, area: Id) -> Record {
        self.create(
            EntityKind::Process,
            json!({"code": code, "name": "Document control", "area_id": area}),
        )
        .await
        .unwrap()
    }

    async fn stage(&self, process: Id, sequence: i64) -> Record {
        self.create(
            EntityKind::ProcessStage,
            json!({"process_id": process, "name": format!("Stage {}", sequence), "sequence": sequence}),
        )
        .await
        .unwrap()
    }

    async fn risk(&self, code: &str, process: Id, probability: i64, impact: i64) -> Record {
        self.create(
            EntityKind::Risk,
            json!({
                "process_id": process,
                "code": code,
                "description": "Supplier delay",
                "probability": probability,
                "impact": impact,
            }),
        )
        .await
        .unwrap()
    }

    async fn journal(&self, kind: EntityKind, record: Id) -> Vec<Record> {
        let params = params(&[("record_id", record.to_string().as_str())]);
        self.service.list(kind, &params).await.unwrap().items
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(fields) => fields,
        other => panic!("expected a JSON object, got {}", other),
    }
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn error_fields(err: &QmsError) -> Vec<&str> {
    err.field_errors().iter().map(|e| e.field.as_str()).collect()
}

#[tokio::test]
async fn test_duplicate_and_retired_codes_conflict() {
    let h = Harness::new();
    let area = h.area("QUA").await;

    let err = h.create(EntityKind::Area, json!({"code": "QUA", "name": "Again"})).await.unwrap_err();
    assert!(matches!(err, QmsError::UniquenessConflict { retired: false, .. }), "{}", err);

    // case-sensitive by default
    h.create(EntityKind::Area, json!({"code": "qua", "name": "Lower"})).await.unwrap();

    h.service.delete(EntityKind::Area, area.id, &h.actor).await.unwrap();
    let err = h.create(EntityKind::Area, json!({"code": "QUA", "name": "Reborn"})).await.unwrap_err();
    assert!(matches!(err, QmsError::UniquenessConflict { retired: true, .. }), "{}", err);
}

#[tokio::test]
async fn test_case_insensitive_codes() {
    let h = Harness::with_settings(ServiceSettings {
        case_sensitive_codes: false,
        ..ServiceSettings::default()
    });
    h.area("QUA").await;
    let err = h.create(EntityKind::Area, json!({"code": "qua", "name": "Lower"})).await.unwrap_err();
    assert_eq!(err.code(), "uniqueness_conflict");
}

#[tokio::test]
async fn test_references_must_exist() {
    let h = Harness::new();
    let missing = generate_id();
    let err = h
        .create(
            EntityKind::User,
            json!({
                "document_number": 1,
                "first_name": "Ana",
                "last_name": "Diaz",
                "email": "ana@example.com",
                "username": "ana",
                "area_id": missing,
            }),
        )
        .await
        .unwrap_err();
    match err {
        QmsError::Reference { field, target, id } => {
            assert_eq!(field, "area_id");
            assert_eq!(target, EntityKind::Area);
            assert_eq!(id, missing);
        }
        other => panic!("expected a reference error, got {}", other),
    }

    let area = h.area("QUA").await;
    let user = h.user("ana", 1, Some(area.id)).await;
    assert_eq!(user.get_id("area_id"), Some(area.id));
    assert_eq!(h.store.count(EntityKind::User), 1);
}

#[tokio::test]
async fn test_validation_lists_every_offending_field() {
    let h = Harness::new();
    let err = h
        .create(
            EntityKind::User,
            json!({"document_number": "abc", "email": "nope", "nickname": "x"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
    let fields = error_fields(&err);
    for expected in ["document_number", "email", "first_name", "last_name", "nickname", "username"] {
        assert!(fields.contains(&expected), "missing {} in {:?}", expected, fields);
    }
}

#[tokio::test]
async fn test_partial_update_touches_only_patched_fields() {
    let h = Harness::new();
    let area = h.create(
        EntityKind::Area,
        json!({"code": "QUA", "name": "Quality", "description": "Original"}),
    )
    .await
    .unwrap();

    h.clock.advance(Duration::seconds(30));
    let updated = h.update(EntityKind::Area, area.id, json!({"name": "Quality Assurance"})).await.unwrap();

    assert_eq!(updated.get_str("name"), Some("Quality Assurance"));
    assert_eq!(updated.get_str("code"), Some("QUA"));
    assert_eq!(updated.get_str("description"), Some("Original"));
    assert_eq!(updated.created_at, area.created_at);
    assert_eq!(updated.updated_at, area.updated_at + Duration::seconds(30));

    // the clock did not move, the timestamp still does
    let again = h.update(EntityKind::Area, area.id, json!({"description": "Changed"})).await.unwrap();
    assert!(again.updated_at > updated.updated_at);
    assert_eq!(h.service.get(EntityKind::Area, area.id).await.unwrap(), again);
}

#[tokio::test]
async fn test_noop_update_changes_nothing() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    h.clock.advance(Duration::seconds(5));

    let same = h.update(EntityKind::Area, area.id, json!({"name": "Area QUA"})).await.unwrap();
    assert_eq!(same.updated_at, area.updated_at);
    assert_eq!(h.journal(EntityKind::ChangeLog, area.id).await.len(), 1);
}

#[tokio::test]
async fn test_required_and_create_only_fields_on_update() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    let other = h.process("PR-2", area.id).await;
    let stage = h.stage(process.id, 1).await;

    let err = h.update(EntityKind::Area, area.id, json!({"name": null})).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["name"]);

    let err = h
        .update(EntityKind::ProcessStage, stage.id, json!({"process_id": other.id}))
        .await
        .unwrap_err();
    assert_eq!(err.field_errors()[0].message, "cannot be changed after creation");

    // sending the current value back is accepted
    h.update(EntityKind::ProcessStage, stage.id, json!({"process_id": process.id, "name": "Plan"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cascade_delete_and_rollback() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-QUA-001", area.id).await;
    for sequence in 1..=4 {
        h.stage(process.id, sequence).await;
    }
    assert_eq!(h.store.count(EntityKind::ProcessStage), 4);

    h.store.fail_after(3);
    let err = h.service.delete(EntityKind::Process, process.id, &h.actor).await.unwrap_err();
    assert_eq!(err.code(), "storage_error");
    assert_eq!(h.store.count(EntityKind::ProcessStage), 4);
    assert_eq!(h.store.count(EntityKind::Process), 1);

    let summary = h.service.delete(EntityKind::Process, process.id, &h.actor).await.unwrap();
    assert_eq!(summary.deleted.len(), 5);
    assert_eq!(summary.deleted.last().unwrap().id, process.id);
    assert_eq!(h.store.count(EntityKind::ProcessStage), 0);
    assert_eq!(h.store.count(EntityKind::Process), 0);

    let err = h.service.get(EntityKind::Process, process.id).await.unwrap_err();
    assert!(matches!(err, QmsError::NotFound { .. }));
}

#[tokio::test]
async fn test_set_null_advances_dependent_timestamp() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let owner = h.user("jperez", 10, None).await;
    let process = h
        .create(
            EntityKind::Process,
            json!({"code": "PR-1", "name": "Audits", "area_id": area.id, "owner_id": owner.id}),
        )
        .await
        .unwrap();

    h.clock.advance(Duration::minutes(1));
    let summary = h.service.delete(EntityKind::User, owner.id, &h.actor).await.unwrap();
    assert_eq!(summary.nullified.len(), 1);
    assert_eq!(summary.nullified[0].id, process.id);

    let after = h.service.get(EntityKind::Process, process.id).await.unwrap();
    assert_eq!(after.get("owner_id"), None);
    assert!(after.updated_at > process.updated_at);
}

#[tokio::test]
async fn test_area_with_users_cannot_be_deleted() {
    let h = Harness::new();
    let quality = h
        .create(EntityKind::Area, json!({"code": "QUA", "name": "Quality"}))
        .await
        .unwrap();
    let jperez = h.user("jperez", 1_020_304_050, Some(quality.id)).await;

    let err = h.service.delete(EntityKind::Area, quality.id, &h.actor).await.unwrap_err();
    match &err {
        QmsError::DependencyConflict { dependent, field, count, .. } => {
            assert_eq!(*dependent, EntityKind::User);
            assert_eq!(field, "area_id");
            assert_eq!(*count, 1);
        }
        other => panic!("expected a dependency conflict, got {}", other),
    }
    assert_eq!(h.store.count(EntityKind::Area), 1);

    h.service.delete(EntityKind::User, jperez.id, &h.actor).await.unwrap();
    h.service.delete(EntityKind::Area, quality.id, &h.actor).await.unwrap();
    assert_eq!(h.store.count(EntityKind::Area), 0);
}

#[tokio::test]
async fn test_area_hierarchy_rejects_cycles() {
    let h = Harness::new();
    let root = h.area("ROOT").await;
    let child = h
        .create(EntityKind::Area, json!({"code": "CHILD", "name": "Child", "parent_id": root.id}))
        .await
        .unwrap();
    let grandchild = h
        .create(EntityKind::Area, json!({"code": "GRAND", "name": "Grand", "parent_id": child.id}))
        .await
        .unwrap();

    let err = h.update(EntityKind::Area, root.id, json!({"parent_id": grandchild.id})).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["parent_id"]);
    let err = h.update(EntityKind::Area, root.id, json!({"parent_id": root.id})).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["parent_id"]);

    // moving a subtree elsewhere is fine
    let other = h.area("OTHER").await;
    h.update(EntityKind::Area, child.id, json!({"parent_id": other.id})).await.unwrap();
}

#[tokio::test]
async fn test_pagination_covers_every_row_once() {
    let h = Harness::new();
    let mut created = Vec::new();
    for n in 0..25 {
        created.push(h.area(&format!("A{:02}", n)).await.id);
    }

    let mut seen = Vec::new();
    for (offset, expected) in [(0, 10), (10, 10), (20, 5)] {
        let page = h
            .service
            .list(EntityKind::Area, &params(&[("offset", offset.to_string().as_str()), ("limit", "10")]))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), expected);
        seen.extend(page.items.iter().map(|record| record.id));
    }
    assert_eq!(seen, created);
    assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 25);

    let err = h.service.list(EntityKind::Area, &params(&[("limit", "0")])).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["limit"]);
    let clamped = h.service.list(EntityKind::Area, &params(&[("limit", "100000")])).await.unwrap();
    assert_eq!(clamped.limit, 500);
    let err = h.service.list(EntityKind::Area, &params(&[("name", "x")])).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["name"]);
}

#[tokio::test]
async fn test_severity_follows_the_matrix() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;

    for probability in 1..=5 {
        for impact in 1..=5 {
            let risk = h
                .risk(&format!("R-{}-{}", probability, impact), process.id, probability, impact)
                .await;
            let expected = severity(probability, impact).unwrap();
            assert_eq!(risk.get_str("severity"), Some(expected.as_str()));
        }
    }

    let critical = h
        .service
        .list(EntityKind::Risk, &params(&[("severity", "critical")]))
        .await
        .unwrap();
    assert_eq!(critical.total, 3);

    let err = h
        .create(
            EntityKind::Risk,
            json!({
                "process_id": process.id,
                "code": "R-X",
                "description": "Manual severity",
                "probability": 1,
                "impact": 1,
                "severity": "critical",
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["severity"]);

    let risk = h.risk("R-Y", process.id, 1, 1).await;
    let err = h.update(EntityKind::Risk, risk.id, json!({"severity": "critical"})).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["severity"]);

    let raised = h.update(EntityKind::Risk, risk.id, json!({"impact": 5, "probability": 4})).await.unwrap();
    assert_eq!(raised.get_str("severity"), Some("critical"));
}

#[tokio::test]
async fn test_risk_evaluations_and_closing_rule() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    let risk = h.risk("R-1", process.id, 2, 3).await;

    let evaluations = h
        .service
        .list_children(EntityKind::Risk, risk.id, EntityKind::RiskEvaluation, &HashMap::new())
        .await
        .unwrap();
    assert_eq!(evaluations.total, 1);
    assert_eq!(evaluations.items[0].get_str("new_severity"), Some("medium"));

    h.update(EntityKind::Risk, risk.id, json!({"probability": 4})).await.unwrap();
    let evaluations = h
        .service
        .list_children(EntityKind::Risk, risk.id, EntityKind::RiskEvaluation, &HashMap::new())
        .await
        .unwrap();
    assert_eq!(evaluations.total, 2);

    let err = h.update(EntityKind::Risk, risk.id, json!({"state": "closed"})).await.unwrap_err();
    assert_eq!(error_fields(&err), vec!["state"]);

    let control = h
        .create(
            EntityKind::RiskControl,
            json!({"risk_id": risk.id, "description": "Second supplier", "control_type": "preventive"}),
        )
        .await
        .unwrap();
    h.update(EntityKind::RiskControl, control.id, json!({"active": false})).await.unwrap();
    assert!(h.update(EntityKind::Risk, risk.id, json!({"state": "closed"})).await.is_err());

    h.update(EntityKind::RiskControl, control.id, json!({"active": true})).await.unwrap();
    let closed = h.update(EntityKind::Risk, risk.id, json!({"state": "closed"})).await.unwrap();
    assert_eq!(closed.get_str("state"), Some("closed"));

    let history = h.journal(EntityKind::StateHistory, risk.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].get_str("previous_state"), Some("active"));
    assert_eq!(history[0].get_str("new_state"), Some("closed"));
    assert_eq!(history[0].get_str("changed_by"), Some("tester"));
}

#[tokio::test]
async fn test_document_versions_are_numbered() {
    let h = Harness::new();
    let document = h
        .create(
            EntityKind::Document,
            json!({"code": "DOC-1", "name": "Quality manual", "document_type": "manual"}),
        )
        .await
        .unwrap();

    let mut versions = Vec::new();
    for expected in 1..=3 {
        let version = h
            .create(EntityKind::DocumentVersion, json!({"document_id": document.id}))
            .await
            .unwrap();
        assert_eq!(version.get_i64("number"), Some(expected));
        versions.push(version);
    }

    // deleted numbers are never handed out again
    h.service
        .delete(EntityKind::DocumentVersion, versions[2].id, &h.actor)
        .await
        .unwrap();
    let fourth = h
        .create(EntityKind::DocumentVersion, json!({"document_id": document.id}))
        .await
        .unwrap();
    assert_eq!(fourth.get_i64("number"), Some(4));

    h.service.delete(EntityKind::DocumentVersion, fourth.id, &h.actor).await.unwrap();
    h.service
        .delete(EntityKind::DocumentVersion, versions[1].id, &h.actor)
        .await
        .unwrap();
    let fifth = h
        .create(EntityKind::DocumentVersion, json!({"document_id": document.id}))
        .await
        .unwrap();
    assert_eq!(fifth.get_i64("number"), Some(5));

    // numbering is per document
    let other = h
        .create(
            EntityKind::Document,
            json!({"code": "DOC-2", "name": "Procedure", "document_type": "procedure"}),
        )
        .await
        .unwrap();
    let first = h
        .create(EntityKind::DocumentVersion, json!({"document_id": other.id}))
        .await
        .unwrap();
    assert_eq!(first.get_i64("number"), Some(1));

    let err = h
        .create(EntityKind::DocumentVersion, json!({"document_id": document.id, "number": 9}))
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["number"]);
}

#[tokio::test]
async fn test_journal_is_written_and_read_only() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    h.update(EntityKind::Area, area.id, json!({"name": "Quality"})).await.unwrap();
    h.service.delete(EntityKind::Area, area.id, &h.actor).await.unwrap();

    let entries = h.journal(EntityKind::ChangeLog, area.id).await;
    let actions: Vec<_> = entries.iter().filter_map(|entry| entry.get_str("action")).collect();
    assert_eq!(actions, vec!["create", "update", "delete"]);
    assert!(entries.iter().all(|entry| entry.get_str("actor") == Some("tester")));
    assert_eq!(
        entries[1].fields["changes"],
        json!({"name": {"from": "Area QUA", "to": "Quality"}})
    );

    let err = h
        .create(EntityKind::ChangeLog, json!({"entity": "area", "action": "create"}))
        .await
        .unwrap_err();
    assert!(matches!(err, QmsError::ReadOnly(EntityKind::ChangeLog)));
    let err = h.service.delete(EntityKind::ChangeLog, entries[0].id, &h.actor).await.unwrap_err();
    assert_eq!(err.code(), "read_only");
}

#[tokio::test]
async fn test_nested_listing_follows_the_single_reference() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    for sequence in [3, 1, 2] {
        h.stage(process.id, sequence).await;
    }

    let stages = h
        .service
        .list_children(EntityKind::Process, process.id, EntityKind::ProcessStage, &HashMap::new())
        .await
        .unwrap();
    let sequences: Vec<_> = stages.items.iter().filter_map(|stage| stage.get_i64("sequence")).collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    let missing = generate_id();
    let err = h
        .service
        .list_children(EntityKind::Process, missing, EntityKind::ProcessStage, &HashMap::new())
        .await
        .unwrap_err();
    assert!(matches!(err, QmsError::NotFound { .. }));

    let err = h
        .service
        .list_children(EntityKind::Area, area.id, EntityKind::Role, &HashMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[tokio::test]
async fn test_transition_enforcement_is_opt_in() {
    let permissive = Harness::new();
    let area = permissive.area("QUA").await;
    let process = permissive.process("PR-1", area.id).await;
    permissive
        .update(EntityKind::Process, process.id, json!({"state": "active"}))
        .await
        .unwrap();

    let strict = Harness::with_settings(ServiceSettings {
        enforce_transitions: true,
        ..ServiceSettings::default()
    });
    let area = strict.area("QUA").await;
    let process = strict.process("PR-1", area.id).await;
    let err = strict
        .update(EntityKind::Process, process.id, json!({"state": "active"}))
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["state"]);
    strict
        .update(EntityKind::Process, process.id, json!({"state": "review"}))
        .await
        .unwrap();

    let err = strict
        .update(EntityKind::Process, process.id, json!({"state": "archived"}))
        .await
        .unwrap_err();
    assert_eq!(err.field_errors()[0].field, "state");
}

#[tokio::test]
async fn test_seed_data_loads_once() {
    let h = Harness::new();
    assert!(qms_backend::seed::load_seed_data(&h.service).await.unwrap());
    assert!(!qms_backend::seed::load_seed_data(&h.service).await.unwrap());

    assert_eq!(h.store.count(EntityKind::ProcessStage), 4);
    assert_eq!(h.store.count(EntityKind::RiskControl), 1);
    let quality = h
        .service
        .list(EntityKind::Area, &params(&[("code", "QUA")]))
        .await
        .unwrap();
    assert_eq!(quality.total, 1);
}

#[tokio::test]
async fn test_update_rejects_duplicate_and_retired_codes() {
    let h = Harness::new();
    h.area("QUA").await;
    let operations = h.area("OPE").await;
    let retired = h.area("OLD").await;
    h.service.delete(EntityKind::Area, retired.id, &h.actor).await.unwrap();

    let err = h
        .update(EntityKind::Area, operations.id, json!({"code": "QUA"}))
        .await
        .unwrap_err();
    match &err {
        QmsError::UniquenessConflict { fields, retired, .. } => {
            assert_eq!(fields, &vec!["code".to_string()]);
            assert!(!retired);
        }
        other => panic!("expected a uniqueness conflict, got {}", other),
    }

    let err = h
        .update(EntityKind::Area, operations.id, json!({"code": "OLD"}))
        .await
        .unwrap_err();
    assert!(matches!(err, QmsError::UniquenessConflict { retired: true, .. }), "{}", err);

    let unchanged = h.service.get(EntityKind::Area, operations.id).await.unwrap();
    assert_eq!(unchanged, operations);
}

#[tokio::test]
async fn test_update_rejects_dangling_reference() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let user = h.user("ana", 1, Some(area.id)).await;
    let missing = generate_id();

    let err = h
        .update(EntityKind::User, user.id, json!({"area_id": missing}))
        .await
        .unwrap_err();
    match err {
        QmsError::Reference { field, target, id } => {
            assert_eq!(field, "area_id");
            assert_eq!(target, EntityKind::Area);
            assert_eq!(id, missing);
        }
        other => panic!("expected a reference error, got {}", other),
    }
    let stored = h.service.get(EntityKind::User, user.id).await.unwrap();
    assert_eq!(stored.get_id("area_id"), Some(area.id));
}

#[tokio::test]
async fn test_filters_and_pagination_combine() {
    let h = Harness::new();
    let root = h.area("ROOT").await;
    let mut children = Vec::new();
    for n in 0..7 {
        let child = h
            .create(
                EntityKind::Area,
                json!({"code": format!("C{}", n), "name": "Child", "parent_id": root.id}),
            )
            .await
            .unwrap();
        children.push(child.id);
    }
    for n in 0..3 {
        h.area(&format!("X{}", n)).await;
    }

    let parent = root.id.to_string();
    let page = h
        .service
        .list(
            EntityKind::Area,
            &params(&[("parent_id", parent.as_str()), ("offset", "5"), ("limit", "5")]),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 7);
    assert_eq!(page.offset, 5);
    assert_eq!(page.limit, 5);
    let ids: Vec<Id> = page.items.iter().map(|record| record.id).collect();
    assert_eq!(ids, children[5..].to_vec());

    let err = h
        .service
        .list(EntityKind::Area, &params(&[("offset", "5"), ("skip", "5")]))
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["skip"]);
}

#[tokio::test]
async fn test_audit_codes_and_finding_references() {
    let h = Harness::new();
    let audit = h
        .create(
            EntityKind::Audit,
            json!({"code": "AUD-2024-01", "name": "Internal audit", "audit_type": "internal"}),
        )
        .await
        .unwrap();
    let err = h
        .create(
            EntityKind::Audit,
            json!({"code": "AUD-2024-01", "name": "Again", "audit_type": "external"}),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, QmsError::UniquenessConflict { entity: EntityKind::Audit, .. }), "{}", err);

    let finding = json!({
        "audit_id": audit.id,
        "code": "H-1",
        "description": "Outdated procedure in use",
        "finding_type": "minor_nonconformity",
    });
    h.create(EntityKind::Finding, finding.clone()).await.unwrap();
    let err = h.create(EntityKind::Finding, finding).await.unwrap_err();
    match &err {
        QmsError::UniquenessConflict { entity, fields, .. } => {
            assert_eq!(*entity, EntityKind::Finding);
            assert_eq!(fields, &vec!["audit_id".to_string(), "code".to_string()]);
        }
        other => panic!("expected a uniqueness conflict, got {}", other),
    }

    let missing = generate_id();
    let err = h
        .create(
            EntityKind::Finding,
            json!({
                "audit_id": missing,
                "code": "H-2",
                "description": "Orphan",
                "finding_type": "observation",
            }),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, QmsError::Reference { target: EntityKind::Audit, id, .. } if id == missing),
        "{}",
        err
    );

    let ticket = json!({
        "code": "TCK-1",
        "title": "Printer",
        "description": "Out of toner",
        "category": "support",
    });
    h.create(EntityKind::Ticket, ticket.clone()).await.unwrap();
    let err = h.create(EntityKind::Ticket, ticket).await.unwrap_err();
    assert!(matches!(err, QmsError::UniquenessConflict { entity: EntityKind::Ticket, .. }), "{}", err);
}

#[tokio::test]
async fn test_measurements_are_judged_against_the_target() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    let indicator = h
        .create(
            EntityKind::Indicator,
            json!({"process_id": process.id, "code": "IND-1", "name": "On-time delivery", "target": 95}),
        )
        .await
        .unwrap();

    let inherited = h
        .create(
            EntityKind::IndicatorMeasurement,
            json!({"indicator_id": indicator.id, "period": "2024-01", "value": 97}),
        )
        .await
        .unwrap();
    assert_eq!(inherited.get("target").and_then(Value::as_f64), Some(95.0));
    assert_eq!(inherited.get_bool("meets_target"), Some(true));

    let own_target = h
        .create(
            EntityKind::IndicatorMeasurement,
            json!({"indicator_id": indicator.id, "period": "2024-02", "value": 97, "target": 99}),
        )
        .await
        .unwrap();
    assert_eq!(own_target.get_bool("meets_target"), Some(false));

    let raised = h
        .update(EntityKind::IndicatorMeasurement, own_target.id, json!({"value": 99.5}))
        .await
        .unwrap();
    assert_eq!(raised.get_bool("meets_target"), Some(true));

    let err = h
        .create(
            EntityKind::IndicatorMeasurement,
            json!({"indicator_id": indicator.id, "period": "2024-03", "value": 1, "meets_target": true}),
        )
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["meets_target"]);

    let met = h
        .service
        .list(EntityKind::IndicatorMeasurement, &params(&[("meets_target", "true")]))
        .await
        .unwrap();
    assert_eq!(met.total, 2);

    let trend = analytics::indicator_trend(h.store.as_ref(), indicator.id).await.unwrap();
    assert_eq!(trend.measurements, 2);
    assert_eq!(trend.average, Some(98.25));
    assert_eq!(trend.last_value, Some(99.5));
    assert_eq!(trend.last_period.as_deref(), Some("2024-02"));
    assert_eq!(trend.direction, Direction::Rising);

    let err = analytics::indicator_trend(h.store.as_ref(), area.id).await.unwrap_err();
    assert!(matches!(err, QmsError::NotFound { entity: EntityKind::Indicator, .. }));
}

#[tokio::test]
async fn test_stage_with_live_work_cannot_be_deleted() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    let stage = h.stage(process.id, 1).await;
    let risk = h
        .create(
            EntityKind::Risk,
            json!({
                "process_id": process.id,
                "stage_id": stage.id,
                "code": "RSK-1",
                "description": "Supplier delay",
                "probability": 2,
                "impact": 2,
            }),
        )
        .await
        .unwrap();

    let err = h.service.delete(EntityKind::ProcessStage, stage.id, &h.actor).await.unwrap_err();
    match &err {
        QmsError::DependencyConflict { dependent, field, count, .. } => {
            assert_eq!(*dependent, EntityKind::Risk);
            assert_eq!(field, "stage_id");
            assert_eq!(*count, 1);
        }
        other => panic!("expected a dependency conflict, got {}", other),
    }

    h.update(EntityKind::Risk, risk.id, json!({"state": "mitigated"})).await.unwrap();
    let audit = h
        .create(
            EntityKind::Audit,
            json!({"code": "AUD-1", "name": "Internal audit", "audit_type": "internal"}),
        )
        .await
        .unwrap();
    let finding = h
        .create(
            EntityKind::Finding,
            json!({
                "audit_id": audit.id,
                "stage_id": stage.id,
                "code": "H-1",
                "description": "Stage skipped",
                "finding_type": "observation",
            }),
        )
        .await
        .unwrap();
    let err = h.service.delete(EntityKind::ProcessStage, stage.id, &h.actor).await.unwrap_err();
    assert!(
        matches!(err, QmsError::DependencyConflict { dependent: EntityKind::Finding, .. }),
        "{}",
        err
    );

    h.update(EntityKind::Finding, finding.id, json!({"state": "answered"})).await.unwrap();
    let summary = h.service.delete(EntityKind::ProcessStage, stage.id, &h.actor).await.unwrap();
    let nullified: HashSet<Id> = summary.nullified.iter().map(|row| row.id).collect();
    assert_eq!(nullified, HashSet::from([risk.id, finding.id]));
}

#[tokio::test]
async fn test_stage_risks_deleted_with_the_process_do_not_block() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    let stage = h.stage(process.id, 1).await;
    h.create(
        EntityKind::Risk,
        json!({
            "process_id": process.id,
            "stage_id": stage.id,
            "code": "RSK-1",
            "description": "Supplier delay",
            "probability": 4,
            "impact": 4,
        }),
    )
    .await
    .unwrap();

    h.service.delete(EntityKind::Process, process.id, &h.actor).await.unwrap();
    assert_eq!(h.store.count(EntityKind::ProcessStage), 0);
    assert_eq!(h.store.count(EntityKind::Risk), 0);
}

#[tokio::test]
async fn test_process_owners_must_be_active() {
    let h = Harness::new();
    let area = h.area("QUA").await;
    let active = h.user("jperez", 1, Some(area.id)).await;
    let inactive = h.user("mgomez", 2, Some(area.id)).await;
    h.update(EntityKind::User, inactive.id, json!({"active": false})).await.unwrap();

    let err = h
        .create(
            EntityKind::Process,
            json!({"code": "PR-1", "name": "Audits", "area_id": area.id, "owner_id": inactive.id}),
        )
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["owner_id"]);

    let process = h
        .create(
            EntityKind::Process,
            json!({"code": "PR-1", "name": "Audits", "area_id": area.id, "owner_id": active.id}),
        )
        .await
        .unwrap();
    let stage = h.stage(process.id, 1).await;
    let err = h
        .update(EntityKind::ProcessStage, stage.id, json!({"owner_id": inactive.id}))
        .await
        .unwrap_err();
    assert_eq!(error_fields(&err), vec!["owner_id"]);

    // an owner deactivated later does not freeze the process
    h.update(EntityKind::User, active.id, json!({"active": false})).await.unwrap();
    let renamed = h
        .update(EntityKind::Process, process.id, json!({"name": "Internal audits"}))
        .await
        .unwrap();
    assert_eq!(renamed.get_id("owner_id"), Some(active.id));
}

#[tokio::test]
async fn test_state_counts_and_risk_heatmap() {
    let h = Harness::new();
    for (code, state) in [("NC-1", "open"), ("NC-2", "open"), ("NC-3", "in_analysis")] {
        let nc = h
            .create(EntityKind::Nonconformity, json!({"code": code, "description": "Late delivery"}))
            .await
            .unwrap();
        if state != "open" {
            h.update(EntityKind::Nonconformity, nc.id, json!({"state": state})).await.unwrap();
        }
    }

    let counts = analytics::field_counts(
        h.store.as_ref(),
        EntityKind::Nonconformity,
        "state",
        &HashMap::new(),
        QueryLimits::default(),
    )
    .await
    .unwrap();
    assert_eq!(counts.total, 3);
    let by_state: Vec<(Value, u64)> = counts
        .groups
        .iter()
        .map(|group| (group.value.clone(), group.count))
        .collect();
    assert_eq!(
        by_state,
        vec![
            (json!("open"), 2),
            (json!("in_analysis"), 1),
            (json!("action_assigned"), 0),
            (json!("closed"), 0),
        ]
    );

    let err = analytics::field_counts(
        h.store.as_ref(),
        EntityKind::Nonconformity,
        "description",
        &HashMap::new(),
        QueryLimits::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(error_fields(&err), vec!["description"]);

    let area = h.area("QUA").await;
    let process = h.process("PR-1", area.id).await;
    h.risk("R-1", process.id, 3, 4).await;
    h.risk("R-2", process.id, 3, 4).await;
    h.risk("R-3", process.id, 5, 5).await;

    let heatmap = analytics::risk_heatmap(h.store.as_ref(), &HashMap::new(), QueryLimits::default())
        .await
        .unwrap();
    assert_eq!(heatmap.cells.len(), 25);
    assert_eq!(heatmap.total, 3);
    let cell = heatmap
        .cells
        .iter()
        .find(|cell| cell.probability == 3 && cell.impact == 4)
        .unwrap();
    assert_eq!(cell.count, 2);
    assert_eq!(Some(cell.severity), severity(3, 4));

    let critical = analytics::risk_heatmap(
        h.store.as_ref(),
        &params(&[("severity", "critical")]),
        QueryLimits::default(),
    )
    .await
    .unwrap();
    assert_eq!(critical.total, 1);
}
