use super::EntityDef;
use crate::model::{lifecycle, EntityKind, FieldDef, OnDelete};

const DOCUMENT_TYPES: &[&str] = &[
    "manual",
    "procedure",
    "instruction",
    "format",
    "record",
    "policy",
    "plan",
    "external",
];

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Document, "documents", "documents")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::text("name", 200).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::enumeration("document_type", DOCUMENT_TYPES).required())
            .field(FieldDef::text("file_path", 500))
            .field(FieldDef::text("current_version", 20).default_text("1.0"))
            .field(FieldDef::timestamp("approved_at"))
            .field(FieldDef::timestamp("effective_at"))
            .field(FieldDef::reference("created_by", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("reviewed_by", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("approved_by", EntityKind::User, OnDelete::SetNull))
            .unique_code("code")
            .lifecycle(lifecycle::DOCUMENT)
            .filters(&["code", "document_type", "created_by"]),
        EntityDef::new(EntityKind::DocumentVersion, "document_versions", "document-versions")
            .field(
                FieldDef::reference("document_id", EntityKind::Document, OnDelete::Cascade)
                    .required()
                    .create_only(),
            )
            .field(FieldDef::integer("number").generated())
            .field(FieldDef::text("version_label", 20))
            .field(FieldDef::long_text("change_summary"))
            .field(FieldDef::text("file_path", 500))
            .field(FieldDef::reference("created_by", EntityKind::User, OnDelete::SetNull))
            .unique(&["document_id", "number"])
            .order_by(&["number"])
            .filters(&["document_id", "number"]),
        EntityDef::new(EntityKind::DocumentProcess, "document_processes", "document-processes")
            .field(FieldDef::reference("document_id", EntityKind::Document, OnDelete::Cascade).required())
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade).required())
            .field(FieldDef::text("relation_type", 50).default_text("associated"))
            .unique(&["document_id", "process_id"])
            .filters(&["document_id", "process_id", "relation_type"]),
    ]
}
