use super::EntityDef;
use crate::model::{lifecycle, EntityKind, FieldDef, OnDelete};

const TICKET_CATEGORIES: &[&str] = &["support", "inquiry", "improvement", "document_request"];
const PRIORITIES: &[&str] = &["low", "medium", "high", "critical"];
const SETTING_TYPES: &[&str] = &["string", "integer", "decimal", "boolean", "json"];
const FORM_FIELD_TYPES: &[&str] = &["text", "number", "select", "date", "checkbox", "textarea", "file"];
pub const CHANGE_ACTIONS: &[&str] = &["create", "update", "delete"];

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Ticket, "tickets", "tickets")
            .field(FieldDef::text("code", 50).required())
            .field(FieldDef::text("title", 200).required())
            .field(FieldDef::long_text("description").required())
            .field(FieldDef::enumeration("category", TICKET_CATEGORIES).required())
            .field(FieldDef::enumeration("priority", PRIORITIES).default_text("medium"))
            .field(FieldDef::reference("requester_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("assignee_id", EntityKind::User, OnDelete::SetNull))
            .field(FieldDef::reference("target_area_id", EntityKind::Area, OnDelete::SetNull))
            .field(FieldDef::timestamp("due_at"))
            .field(FieldDef::timestamp("resolved_at"))
            .field(FieldDef::long_text("resolution"))
            .field(FieldDef::ordinal("resolution_minutes", 0, i64::from(i32::MAX)))
            .field(FieldDef::ordinal("satisfaction", 1, 5))
            .unique_code("code")
            .lifecycle(lifecycle::TICKET)
            .filters(&[
                "category",
                "priority",
                "requester_id",
                "assignee_id",
                "target_area_id",
            ]),
        EntityDef::new(EntityKind::Notification, "notifications", "notifications")
            .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
            .field(FieldDef::text("title", 200).required())
            .field(FieldDef::long_text("message").required())
            .field(FieldDef::text("notification_type", 50))
            .field(FieldDef::boolean("read").default_bool(false))
            .field(FieldDef::timestamp("read_at"))
            .field(FieldDef::text("reference_type", 50))
            .field(FieldDef::uuid("reference_id"))
            .filters(&["user_id", "read", "notification_type", "reference_type"]),
        EntityDef::new(EntityKind::Setting, "settings", "settings")
            .field(FieldDef::text("key", 100).required())
            .field(FieldDef::long_text("value"))
            .field(FieldDef::long_text("description"))
            .field(FieldDef::enumeration("data_type", SETTING_TYPES).default_text("string"))
            .field(FieldDef::text("category", 50))
            .field(FieldDef::boolean("active").default_bool(true))
            .unique(&["key"])
            .filters(&["key", "category", "active"]),
        EntityDef::new(EntityKind::FormField, "form_fields", "form-fields")
            .field(FieldDef::reference("process_id", EntityKind::Process, OnDelete::Cascade))
            .field(FieldDef::text("name", 100).required())
            .field(FieldDef::text("label", 200).required())
            .field(FieldDef::enumeration("field_type", FORM_FIELD_TYPES).required())
            .field(FieldDef::boolean("required").default_bool(false))
            .field(FieldDef::json("options"))
            .field(FieldDef::ordinal("sequence", 0, i64::from(i32::MAX)).default_int(0))
            .field(FieldDef::boolean("active").default_bool(true))
            .field(FieldDef::json("validations"))
            .order_by(&["sequence"])
            .filters(&["process_id", "field_type", "active"]),
        EntityDef::new(EntityKind::FormResponse, "form_responses", "form-responses")
            .field(FieldDef::reference("field_id", EntityKind::FormField, OnDelete::Cascade).required())
            .field(
                FieldDef::reference("instance_id", EntityKind::ProcessInstance, OnDelete::Cascade)
                    .required(),
            )
            .field(FieldDef::long_text("value"))
            .field(FieldDef::text("attachment_path", 500))
            .field(FieldDef::reference("responded_by", EntityKind::User, OnDelete::SetNull))
            .filters(&["field_id", "instance_id", "responded_by"]),
        EntityDef::new(EntityKind::StateHistory, "state_history", "state-history")
            .field(FieldDef::enumeration("entity", entity_names()).required())
            .field(FieldDef::uuid("record_id").required())
            .field(FieldDef::text("field", 64).required())
            .field(FieldDef::text("previous_state", 64))
            .field(FieldDef::text("new_state", 64).required())
            .field(FieldDef::text("changed_by", 100))
            .field(FieldDef::long_text("comment"))
            .filters(&["entity", "record_id", "new_state"])
            .read_only(),
        EntityDef::new(EntityKind::ChangeLog, "change_log", "change-log")
            .field(FieldDef::enumeration("entity", entity_names()).required())
            .field(FieldDef::uuid("record_id").required())
            .field(FieldDef::enumeration("action", CHANGE_ACTIONS).required())
            .field(FieldDef::text("actor", 100))
            .field(FieldDef::json("changes"))
            .filters(&["entity", "record_id", "action", "actor"])
            .read_only(),
    ]
}

fn entity_names() -> &'static [&'static str] {
    static NAMES: std::sync::OnceLock<Vec<&'static str>> = std::sync::OnceLock::new();
    NAMES
        .get_or_init(|| EntityKind::ALL.iter().map(|kind| kind.as_str()).collect())
        .as_slice()
}
