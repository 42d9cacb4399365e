use super::EntityDef;
use crate::model::{lifecycle, EntityKind, FieldDef, OnDelete};

const AUDIT_TYPES: &[&str] = &["internal", "external", "certification", "follow_up"];
const FINDING_TYPES: &[&str] = &[
    "major_nonconformity",
    "minor_nonconformity",
    "observation",
    "improvement_opportunity",
];

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::AuditProgram, "audit_programs", "audit-programs")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::ordinal("year", 1900, 9999).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::long_text("objective"))
            .field(FieldDef::long_text("scope"))
            .field(FieldDef::reference("approved_by", EntityKind::User, OnDelete::SetNull))
            .unique_code("code")
            .lifecycle(lifecycle::AUDIT_PROGRAM)
            .filters(&["year"]),
        EntityDef::new(EntityKind::Audit, "audits", "audits")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::enumeration("audit_type", AUDIT_TYPES).required())
            .field(FieldDef::reference("program_id", EntityKind::AuditProgram, OnDelete::Restrict))
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::SetNull))
            .field(FieldDef::long_text("scope"))
            .field(FieldDef::long_text("objective"))
            .field(FieldDef::timestamp("planned_at"))
            .field(FieldDef::timestamp("started_at"))
            .field(FieldDef::timestamp("finished_at"))
            .field(FieldDef::text("reference_standard", 100))
            .field(FieldDef::long_text("audit_team"))
            .field(FieldDef::reference("lead_auditor_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("created_by", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::long_text("final_report"))
            .unique_code("code")
            .lifecycle(lifecycle::AUDIT)
            .filters(&["audit_type", "program_id", "process_id", "lead_auditor_id"]),
        EntityDef::new(EntityKind::Finding, "findings", "findings")
            .field(
                FieldDef::reference("audit_id", EntityKind::Audit, OnDelete::Cascade)
                    .required()
                    .create_only(),
            )
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::enumeration("finding_type", FINDING_TYPES).required())
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::SetNull))
            .field(FieldDef::reference("stage_id", EntityKind::ProcessStage, OnDelete::SetNull))
            .field(FieldDef::text("standard_clause", 50))
            .field(FieldDef::long_text("evidence"))
            .field(FieldDef::reference("response_owner_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::timestamp("responded_at"))
            .unique(&["audit_id", "code"])
            .lifecycle(lifecycle::FINDING)
            .order_by(&["code"])
            .filters(&[
                "audit_id",
                "finding_type",
                "process_id",
                "stage_id",
                "response_owner_id",
            ]),
    ]
}
