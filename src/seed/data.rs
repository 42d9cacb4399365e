use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::logic::EntityService;
use crate::model::{catalog::PHVA_STAGES, Actor, EntityKind, Record};
use crate::store::Store;

/// Code of the seeded quality area. Its presence marks the dataset as loaded.
pub const SEED_AREA_CODE: &str = "QUA";

/// Loads a small demonstration dataset through the service, so every row
/// passes the same validation and journaling as API writes. Running it
/// twice is a no-op.
pub async fn load_seed_data<S: Store>(service: &EntityService<S>) -> Result<bool> {
    let params = HashMap::from([("code".to_string(), SEED_AREA_CODE.to_string())]);
    let existing = service
        .list(EntityKind::Area, &params)
        .await
        .context("Failed to check for existing seed data")?;
    if existing.total > 0 {
        log::info!("Seed data already present, skipping");
        return Ok(false);
    }

    let actor = Actor::system();
    let seeder = Seeder { service, actor: &actor };

    let quality = seeder
        .create(
            EntityKind::Area,
            json!({
                "code": SEED_AREA_CODE,
                "name": "Quality",
                "description": "Quality management and continuous improvement",
            }),
        )
        .await?;
    let operations = seeder
        .create(
            EntityKind::Area,
            json!({"code": "OPE", "name": "Operations", "parent_id": quality.id}),
        )
        .await?;

    let jperez = seeder
        .create(
            EntityKind::User,
            json!({
                "document_number": 1_020_304_050i64,
                "first_name": "Juan",
                "last_name": "Perez",
                "email": "jperez@example.com",
                "username": "jperez",
                "area_id": quality.id,
            }),
        )
        .await?;
    seeder
        .create(
            EntityKind::User,
            json!({
                "document_number": 1_020_304_051i64,
                "first_name": "Maria",
                "last_name": "Gomez",
                "email": "mgomez@example.com",
                "username": "mgomez",
                "area_id": operations.id,
            }),
        )
        .await?;

    let admin = seeder
        .create(
            EntityKind::Role,
            json!({"name": "admin", "description": "Full access to the system"}),
        )
        .await?;
    seeder
        .create(
            EntityKind::Role,
            json!({"name": "auditor", "description": "Plans and runs audits"}),
        )
        .await?;
    seeder
        .create(
            EntityKind::UserRole,
            json!({"user_id": jperez.id, "role_id": admin.id}),
        )
        .await?;

    let process = seeder
        .create(
            EntityKind::Process,
            json!({
                "code": "PR-QUA-001",
                "name": "Document control",
                "area_id": quality.id,
                "owner_id": jperez.id,
                "process_type": "support",
                "objective": "Keep controlled documents current and available",
            }),
        )
        .await?;
    for (index, stage) in PHVA_STAGES.iter().enumerate() {
        seeder
            .create(
                EntityKind::ProcessStage,
                json!({
                    "process_id": process.id,
                    "name": stage_name(stage),
                    "sequence": index + 1,
                    "phva_stage": stage,
                }),
            )
            .await?;
    }

    let document = seeder
        .create(
            EntityKind::Document,
            json!({
                "code": "DOC-QUA-001",
                "name": "Quality manual",
                "document_type": "manual",
                "created_by": jperez.id,
            }),
        )
        .await?;
    seeder
        .create(
            EntityKind::DocumentVersion,
            json!({
                "document_id": document.id,
                "version_label": "1.0",
                "change_summary": "Initial issue",
                "created_by": jperez.id,
            }),
        )
        .await?;
    seeder
        .create(
            EntityKind::DocumentProcess,
            json!({"document_id": document.id, "process_id": process.id}),
        )
        .await?;

    let risk = seeder
        .create(
            EntityKind::Risk,
            json!({
                "process_id": process.id,
                "code": "RSK-QUA-001",
                "description": "Obsolete document versions in use",
                "category": "quality",
                "probability": 3,
                "impact": 4,
                "owner_id": jperez.id,
            }),
        )
        .await?;
    seeder
        .create(
            EntityKind::RiskControl,
            json!({
                "risk_id": risk.id,
                "description": "Monthly review of the master document list",
                "control_type": "preventive",
                "frequency": "monthly",
                "owner_id": jperez.id,
            }),
        )
        .await?;

    log::info!("Seed data loaded (process {}, risk {})", process.id, risk.id);
    Ok(true)
}

fn stage_name(stage: &str) -> &'static str {
    match stage {
        "plan" => "Plan document changes",
        "do" => "Issue and distribute",
        "check" => "Verify document use",
        _ => "Improve the control",
    }
}

struct Seeder<'a, S: Store> {
    service: &'a EntityService<S>,
    actor: &'a Actor,
}

impl<S: Store> Seeder<'_, S> {
    async fn create(&self, kind: EntityKind, fields: Value) -> Result<Record> {
        let fields = match fields {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        self.service
            .create(kind, fields, self.actor)
            .await
            .with_context(|| format!("Failed to seed {}", kind))
    }
}
