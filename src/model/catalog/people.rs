use super::EntityDef;
use crate::model::{EntityKind, FieldDef, OnDelete};

pub(super) fn definitions() -> Vec<EntityDef> {
    vec![
        EntityDef::new(EntityKind::Area, "areas", "areas")
            .field(FieldDef::text("code", 20).required())
            .field(FieldDef::text("name", 100).required())
            .field(FieldDef::long_text("description"))
            .field(FieldDef::reference("parent_id", EntityKind::Area, OnDelete::Restrict))
            .unique_code("code")
            .hierarchy("parent_id")
            .filters(&["code", "parent_id"]),
        EntityDef::new(EntityKind::User, "users", "users")
            .field(FieldDef::integer("document_number").required())
            .field(FieldDef::text("first_name", 100).required())
            .field(FieldDef::text("middle_name", 100))
            .field(FieldDef::text("last_name", 100).required())
            .field(FieldDef::text("second_last_name", 100))
            .field(FieldDef::email("email", 150).required())
            .field(FieldDef::text("username", 50).required())
            .field(FieldDef::reference("area_id", EntityKind::Area, OnDelete::Restrict))
            .field(FieldDef::boolean("active").default_bool(true))
            .field(FieldDef::text("photo_url", 500))
            .unique(&["document_number"])
            .unique(&["email"])
            .unique(&["username"])
            .filters(&["area_id", "active", "username", "email", "document_number"]),
        EntityDef::new(EntityKind::Role, "roles", "roles")
            .field(FieldDef::text("name", 50).required())
            .field(FieldDef::long_text("description"))
            .unique(&["name"])
            .filters(&["name"]),
        EntityDef::new(EntityKind::Permission, "permissions", "permissions")
            .field(FieldDef::text("code", 100).required())
            .field(FieldDef::text("name", 100).required())
            .field(FieldDef::long_text("description"))
            .unique_code("code")
            .filters(&["code"]),
        EntityDef::new(EntityKind::UserRole, "user_roles", "user-roles")
            .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
            .field(FieldDef::reference("role_id", EntityKind::Role, OnDelete::Cascade).required())
            .unique(&["user_id", "role_id"])
            .filters(&["user_id", "role_id"]),
        EntityDef::new(EntityKind::RolePermission, "role_permissions", "role-permissions")
            .field(FieldDef::reference("role_id", EntityKind::Role, OnDelete::Cascade).required())
            .field(
                FieldDef::reference("permission_id", EntityKind::Permission, OnDelete::Cascade)
                    .required(),
            )
            .unique(&["role_id", "permission_id"])
            .filters(&["role_id", "permission_id"]),
        EntityDef::new(EntityKind::AreaAssignment, "area_assignments", "area-assignments")
            .field(FieldDef::reference("user_id", EntityKind::User, OnDelete::Cascade).required())
            .field(FieldDef::reference("area_id", EntityKind::Area, OnDelete::Cascade).required())
            .field(FieldDef::boolean("is_primary").default_bool(false))
            .unique(&["user_id", "area_id"])
            .filters(&["user_id", "area_id", "is_primary"]),
    ]
}
