use super::EntityDef;
use crate::model::{lifecycle, EntityKind, FieldDef, OnDelete};

pub const PHVA_STAGES: &[&str] = &["plan", "do", "check", "act"];

const PROCESS_TYPES: &[&str] = &["strategic", "operational", "support", "measurement"];
const STAGE_TYPES: &[&str] = &["input", "transformation", "verification", "decision", "output"];
const ACTION_TYPES: &[&str] = &["corrective", "preventive", "improvement"];

const MAX_SEQUENCE: i64 = i32::MAX as i64;

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Process, "processes", "processes")
            .field(FieldDef::text("code", 20).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::reference("area_id", EntityKind::Area, OnDelete::Restrict).required())
            .field(FieldDef::long_text("objective"))
            .field(FieldDef::long_text("scope"))
            .field(FieldDef::enumeration("phva_stage", PHVA_STAGES))
            .field(FieldDef::enumeration("process_type", PROCESS_TYPES))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("created_by", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::text("version", 20).default_text("1.0"))
            .field(FieldDef::date("approved_on"))
            .field(FieldDef::date("next_review_on"))
            .field(FieldDef::boolean("restricted").default_bool(false))
            .field(FieldDef::long_text("inputs"))
            .field(FieldDef::long_text("outputs"))
            .field(FieldDef::long_text("required_resources"))
            .field(FieldDef::long_text("performance_criteria"))
            .unique_code("code")
            .lifecycle(lifecycle::PROCESS)
            .filters(&["code", "area_id", "phva_stage", "process_type", "owner_id"]),
        EntityDef::new(EntityKind::ProcessStage, "process_stages", "process-stages")
            .field(
                FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade)
                    .required()
                    .create_only(),
            )
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::ordinal("sequence", 1, MAX_SEQUENCE).required())
            .field(FieldDef::enumeration("stage_type", STAGE_TYPES))
            .field(FieldDef::enumeration("phva_stage", PHVA_STAGES))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::ordinal("estimated_minutes", 0, MAX_SEQUENCE))
            .field(FieldDef::boolean("active").default_bool(true))
            .field(FieldDef::long_text("acceptance_criteria"))
            .field(FieldDef::long_text("required_documents"))
            .unique(&["process_id", "sequence"])
            .order_by(&["sequence"])
            .filters(&["process_id", "phva_stage", "stage_type", "active"]),
        EntityDef::new(EntityKind::ProcessInstance, "process_instances", "process-instances")
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade).required())
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::timestamp("started_at").default_now())
            .field(FieldDef::timestamp("finished_at"))
            .field(FieldDef::reference("started_by", EntityKind::User, OnDelete::SetNull))
            .unique_code("code")
            .lifecycle(lifecycle::PROCESS_INSTANCE)
            .filters(&["process_id", "started_by"]),
        EntityDef::new(
            EntityKind::ProcessParticipant,
            "process_participants",
            "process-participants",
        )
        .field(
            FieldDef::reference("instance_id", EntityKind::ProcessInstance, OnDelete::Cascade)
                .required(),
        )
        .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
        .field(FieldDef::text("participation_role", 50))
        .field(FieldDef::timestamp("assigned_at").default_now())
        .field(FieldDef::boolean("active").default_bool(true))
        .unique(&["instance_id", "user_id"])
        .filters(&["instance_id", "user_id", "active"]),
        EntityDef::new(EntityKind::ProcessAction, "process_actions", "process-actions")
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade).required())
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::enumeration("action_type", ACTION_TYPES).required())
            .field(FieldDef::text("origin", 100))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::date("planned_on"))
            .field(FieldDef::date("implemented_on"))
            .field(FieldDef::date("verified_on"))
            .field(FieldDef::long_text("effectiveness"))
            .field(FieldDef::long_text("notes"))
            .unique_code("code")
            .lifecycle(lifecycle::IMPROVEMENT_ACTION)
            .filters(&["process_id", "action_type", "owner_id"]),
    ]
}
