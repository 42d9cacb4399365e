use super::EntityDef;
use crate::model::{lifecycle, EntityKind, FieldDef, OnDelete};

const FREQUENCIES: &[&str] = &["daily", "weekly", "monthly", "quarterly", "semiannual", "annual"];
const NC_SEVERITIES: &[&str] = &["minor", "major", "critical"];
const NC_SOURCES: &[&str] = &["audit", "customer", "process", "supplier", "other"];
const CORRECTIVE_TYPES: &[&str] = &["corrective", "preventive", "improvement"];
const CORRECTIVE_STATES: &[&str] = &["pending", "in_progress", "implemented", "verified", "closed"];

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Indicator, "indicators", "indicators")
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade).required())
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::long_text("formula"))
            .field(FieldDef::text("unit", 50))
            .field(FieldDef::decimal("target"))
            .field(FieldDef::enumeration("frequency", FREQUENCIES).default_text("monthly"))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .unique_code("code")
            .lifecycle(lifecycle::INDICATOR)
            .filters(&["process_id", "frequency", "owner_id"]),
        EntityDef::new(
            EntityKind::IndicatorMeasurement,
            "indicator_measurements",
            "indicator-measurements",
        )
        .field(
            FieldDef::reference("indicator_id", EntityKind::Indicator, OnDelete::Cascade)
                .required()
                .create_only(),
        )
        .field(FieldDef::text("period", 20).required())
        .field(FieldDef::decimal("value").required())
        .field(FieldDef::decimal("target"))
        .field(FieldDef::boolean("meets_target").derived())
        .field(FieldDef::long_text("notes"))
        .field(FieldDef::reference("recorded_by", EntityKind::User, OnDelete::SetNull))
        .unique(&["indicator_id", "period"])
        .order_by(&["period"])
        .filters(&["indicator_id", "period", "meets_target"]),
        EntityDef::new(EntityKind::Nonconformity, "nonconformities", "nonconformities")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::SetNull))
            .field(FieldDef::text("nc_type", 50))
            .field(FieldDef::enumeration("source", NC_SOURCES))
            .field(FieldDef::enumeration("severity", NC_SEVERITIES).default_text("minor"))
            .field(FieldDef::reference("detected_by", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::timestamp("detected_at").default_now())
            .field(FieldDef::long_text("cause_analysis"))
            .field(FieldDef::long_text("action_plan"))
            .field(FieldDef::timestamp("closed_at"))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .unique_code("code")
            .lifecycle(lifecycle::NONCONFORMITY)
            .filters(&["code", "process_id", "source", "severity", "owner_id"]),
        EntityDef::new(EntityKind::CorrectiveAction, "corrective_actions", "corrective-actions")
            .field(FieldDef::reference(
                "nonconformity_id",
                EntityKind::Nonconformity,
                OnDelete::Cascade,
            ))
            .field(FieldDef::reference("finding_id", EntityKind::Finding, OnDelete::SetNull))
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::enumeration("action_type", CORRECTIVE_TYPES).default_text("corrective"))
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::long_text("root_cause_analysis"))
            .field(FieldDef::long_text("action_plan"))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::date("due_on"))
            .field(FieldDef::date("implemented_on"))
            .field(FieldDef::enumeration("state", CORRECTIVE_STATES).default_text("pending"))
            .field(FieldDef::boolean("effectiveness_verified").default_bool(false))
            .field(FieldDef::reference("verified_by", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::date("verified_on"))
            .field(FieldDef::long_text("notes"))
            .unique_code("code")
            .filters(&[
                "nonconformity_id",
                "finding_id",
                "action_type",
                "owner_id",
                "state",
            ]),
        EntityDef::new(EntityKind::QualityObjective, "quality_objectives", "quality-objectives")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::reference("area_id", EntityKind::Area, OnDelete::SetNull))
            .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::timestamp("starts_at").required())
            .field(FieldDef::timestamp("ends_at").required())
            .field(FieldDef::bounded_decimal("progress", 0.0, 100.0).default_int(0))
            .unique_code("code")
            .lifecycle(lifecycle::QUALITY_OBJECTIVE)
            .filters(&["area_id", "owner_id"]),
        EntityDef::new(
            EntityKind::ObjectiveFollowUp,
            "objective_follow_ups",
            "objective-follow-ups",
        )
        .field(
            FieldDef::reference("objective_id", EntityKind::QualityObjective, OnDelete::Cascade)
                .required(),
        )
        .field(FieldDef::timestamp("followed_up_at").default_now())
        .field(FieldDef::decimal("current_value"))
        .field(FieldDef::long_text("notes"))
        .field(FieldDef::reference("owner_id", EntityKind::User, OnDelete::SetNull))
        .order_by(&["followed_up_at"])
        .filters(&["objective_id", "owner_id"]),
    ]
}
