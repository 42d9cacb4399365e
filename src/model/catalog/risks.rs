use super::EntityDef;
use crate::model::{lifecycle, risk, EntityKind, FieldDef, OnDelete, Severity};

const RISK_CATEGORIES: &[&str] = &["strategic", "operational", "compliance", "financial", "quality"];
const RISK_TYPES: &[&str] = &["threat", "opportunity"];
const CONTROL_TYPES: &[&str] = &["preventive", "detective", "corrective"];
const EFFECTIVENESS: &[&str] = &["effective", "partially_effective", "ineffective", "not_evaluated"];

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Risk, "risks", "risks")
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade).required())
            .field(FieldDef::reference("stage_id", EntityKind::ProcessStage, OnDelete::SetNull))
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::enumeration("category", RISK_CATEGORIES))
            .field(FieldDef::enumeration("risk_type", RISK_TYPES).default_text("threat"))
            .field(FieldDef::ordinal("probability", risk::MIN_LEVEL, risk::MAX_LEVEL).required())
            .field(FieldDef::ordinal("impact", risk::MIN_LEVEL, risk::MAX_LEVEL).required())
            .field(FieldDef::enumeration("severity", Severity::NAMES).derived())
            .field(FieldDef::long_text("causes"))
            .field(FieldDef::long_text("consequences"))
            .field(FieldDef::long_text("treatment"))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::date("identified_on"))
            .field(FieldDef::date("reviewed_on"))
            .unique_code("code")
            .lifecycle(lifecycle::RISK)
            .filters(&[
                "process_id",
                "stage_id",
                "category",
                "risk_type",
                "severity",
                "owner_id",
            ]),
        EntityDef::new(EntityKind::RiskControl, "risk_controls", "risk-controls")
            .field(
                FieldDef::reference("risk_id", EntityKind::Risk, OnDelete::Cascade)
                    .required()
                    .create_only(),
            )
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::enumeration("control_type", CONTROL_TYPES).required())
            .field(FieldDef::text("frequency", 50))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::enumeration("effectiveness", EFFECTIVENESS).default_text("not_evaluated"))
            .field(FieldDef::boolean("active").default_bool(true))
            .filters(&["risk_id", "control_type", "owner_id", "active"]),
        EntityDef::new(EntityKind::RiskEvaluation, "risk_evaluations", "risk-evaluations")
            .field(FieldDef::reference("risk_id", EntityKind::Risk, OnDelete::Cascade).required())
            .field(FieldDef::ordinal("previous_probability", risk::MIN_LEVEL, risk::MAX_LEVEL))
            .field(FieldDef::ordinal("previous_impact", risk::MIN_LEVEL, risk::MAX_LEVEL))
            .field(FieldDef::enumeration("previous_severity", Severity::NAMES))
            .field(FieldDef::ordinal("new_probability", risk::MIN_LEVEL, risk::MAX_LEVEL).required())
            .field(FieldDef::ordinal("new_impact", risk::MIN_LEVEL, risk::MAX_LEVEL).required())
            .field(FieldDef::enumeration("new_severity", Severity::NAMES).required())
            .field(FieldDef::long_text("justification"))
            .field(FieldDef::text("evaluated_by", 100))
            .field(FieldDef::timestamp("evaluated_at").default_now())
            .order_by(&["evaluated_at"])
            .filters(&["risk_id", "new_severity"])
            .read_only(),
    ]
}
