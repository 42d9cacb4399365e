use super::EntityDef;
use crate::model::{lifecycle, EntityKind, FieldDef, OnDelete};

const MODALITIES: &[&str] = &["in_person", "virtual", "blended"];
const TRAINING_TYPES: &[&str] = &["induction", "technical", "regulatory", "awareness", "other"];
const LEVELS: &[&str] = &["basic", "intermediate", "advanced", "expert"];
const EVALUATION_STATES: &[&str] = &["pending", "in_development", "reinforced", "developed"];
const RISK_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Training, "trainings", "trainings")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::enumeration("training_type", TRAINING_TYPES))
            .field(FieldDef::enumeration("modality", MODALITIES).default_text("in_person"))
            .field(FieldDef::bounded_decimal("duration_hours", 0.0, 10_000.0))
            .field(FieldDef::text("instructor", 200))
            .field(FieldDef::timestamp("scheduled_at"))
            .field(FieldDef::timestamp("starts_at"))
            .field(FieldDef::timestamp("ends_at"))
            .field(FieldDef::timestamp("attendance_closes_at"))
            .field(FieldDef::text("location", 200))
            .field(FieldDef::long_text("objective"))
            .field(FieldDef::long_text("content"))
            .field(FieldDef::reference("area_id", EntityKind::Area, OnDelete::SetNull))
            .field(FieldDef::boolean("all_areas").default_bool(false))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::SetNull))
            .field(FieldDef::reference("finding_id", EntityKind::Finding, OnDelete::SetNull))
            .field(FieldDef::reference("risk_id", EntityKind::Risk, OnDelete::SetNull))
            .field(FieldDef::text("evidence_path", 500))
            .unique_code("code")
            .lifecycle(lifecycle::TRAINING)
            .filters(&[
                "modality",
                "training_type",
                "area_id",
                "owner_id",
                "process_id",
                "finding_id",
                "risk_id",
            ]),
        EntityDef::new(
            EntityKind::TrainingAttendance,
            "training_attendances",
            "training-attendances",
        )
        .field(FieldDef::reference("training_id", EntityKind::Training, OnDelete::Cascade).required())
        .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
        .field(FieldDef::boolean("attended").default_bool(false))
        .field(FieldDef::bounded_decimal("score", 0.0, 100.0))
        .field(FieldDef::long_text("notes"))
        .field(FieldDef::boolean("certified").default_bool(false))
        .field(FieldDef::timestamp("registered_at").default_now())
        .field(FieldDef::timestamp("attended_at"))
        .field(FieldDef::boolean("passed"))
        .unique(&["training_id", "user_id"])
        .filters(&["training_id", "user_id", "attended", "passed"]),
        EntityDef::new(EntityKind::Competency, "competencies", "competencies")
            .field(FieldDef::text("name", 100).required())
            .field(FieldDef::long_text("description"))
            .unique(&["name"])
            .filters(&["name"]),
        EntityDef::new(
            EntityKind::CompetencyEvaluation,
            "competency_evaluations",
            "competency-evaluations",
        )
        .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
        .field(
            FieldDef::reference("competency_id", EntityKind::Competency, OnDelete::Cascade)
                .required(),
        )
        .field(FieldDef::enumeration("level", LEVELS).required())
        .field(FieldDef::enumeration("state", EVALUATION_STATES).default_text("pending"))
        .field(FieldDef::timestamp("evaluated_at").default_now())
        .field(FieldDef::reference("evaluator_id", EntityKind::User, OnDelete::SetNull))
        .field(FieldDef::long_text("notes"))
        .order_by(&["evaluated_at"])
        .filters(&["user_id", "competency_id", "level", "state", "evaluator_id"]),
        EntityDef::new(EntityKind::CompetencyGap, "competency_gaps", "competency-gaps")
            .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
            .field(
                FieldDef::reference("competency_id", EntityKind::Competency, OnDelete::Cascade)
                    .required(),
            )
            .field(FieldDef::reference("stage_id", EntityKind::ProcessStage, OnDelete::SetNull))
            .field(FieldDef::reference("risk_id", EntityKind::Risk, OnDelete::SetNull))
            .field(FieldDef::reference("training_id", EntityKind::Training, OnDelete::SetNull))
            .field(FieldDef::enumeration("required_level", LEVELS).required())
            .field(FieldDef::enumeration("current_level", LEVELS))
            .field(FieldDef::enumeration("risk_level", RISK_LEVELS))
            .field(FieldDef::timestamp("detected_at").default_now())
            .field(FieldDef::timestamp("resolved_at"))
            .lifecycle(lifecycle::COMPETENCY_GAP)
            .filters(&[
                "user_id",
                "competency_id",
                "stage_id",
                "risk_id",
                "training_id",
                "risk_level",
            ]),
    ]
}
