use itertools::Itertools;

use crate::model::{Catalog, EntityDef, EntityKind, FieldType};

pub const RETIRED_CODES_DDL: &str = r#"CREATE TABLE IF NOT EXISTS "retired_codes" (
    "entity" TEXT NOT NULL,
    "field" TEXT NOT NULL,
    "value" TEXT NOT NULL,
    "retired_at" TIMESTAMPTZ NOT NULL,
    PRIMARY KEY ("entity", "field", "value")
)"#;

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn sql_type(ty: &FieldType) -> &'static str {
    match ty {
        FieldType::Text { .. } | FieldType::Email { .. } | FieldType::Enumeration { .. } => "TEXT",
        FieldType::Integer { .. } => "BIGINT",
        FieldType::Decimal { .. } => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Timestamp => "TIMESTAMPTZ",
        FieldType::Date => "DATE",
        FieldType::Reference { .. } | FieldType::Uuid => "UUID",
        FieldType::Json => "JSONB",
    }
}

pub fn foreign_key_name(def: &EntityDef, field: &str) -> String {
    format!("{}_{}_fkey", def.table, field)
}

pub fn unique_key_name(def: &EntityDef, fields: &[&str]) -> String {
    format!("{}_{}_key", def.table, fields.join("_"))
}

/// Fields guarded by the unique index or primary key named `constraint`.
pub fn unique_key_fields(def: &EntityDef, constraint: &str) -> Option<Vec<&'static str>> {
    if constraint == format!("{}_pkey", def.table) {
        return Some(vec!["id"]);
    }
    def.unique_keys
        .iter()
        .find(|key| unique_key_name(def, &key.fields) == constraint)
        .map(|key| key.fields.clone())
}

/// Entity and reference field that own the foreign key named `constraint`.
pub fn foreign_key_owner(catalog: &Catalog, constraint: &str) -> Option<(EntityKind, &'static str)> {
    catalog.entities().iter().find_map(|def| {
        def.references()
            .find(|(field, _, _)| foreign_key_name(def, field.name) == constraint)
            .map(|(field, _, _)| (def.kind, field.name))
    })
}

pub fn create_table(def: &EntityDef) -> String {
    let columns = std::iter::once("    \"id\" UUID PRIMARY KEY".to_string())
        .chain(std::iter::once("    \"row_seq\" BIGSERIAL NOT NULL".to_string()))
        .chain(def.fields.iter().map(|field| {
            format!(
                "    {} {}{}",
                quote(field.name),
                sql_type(&field.ty),
                if field.required { " NOT NULL" } else { "" }
            )
        }))
        .chain([
            "    \"created_at\" TIMESTAMPTZ NOT NULL".to_string(),
            "    \"updated_at\" TIMESTAMPTZ NOT NULL".to_string(),
        ])
        .join(",\n");
    format!("CREATE TABLE IF NOT EXISTS {} (\n{}\n)", quote(def.table), columns)
}

/// Foreign keys are added once every table exists; re-running is a no-op.
pub fn foreign_keys(def: &EntityDef, catalog: &Catalog) -> Vec<String> {
    def.references()
        .filter_map(|(field, target, on_delete)| {
            let target = catalog.get(target)?;
            Some(format!(
                "DO $$ BEGIN\n    ALTER TABLE {table} ADD CONSTRAINT {name} FOREIGN KEY ({column}) REFERENCES {target} (\"id\") ON DELETE {action};\nEXCEPTION WHEN duplicate_object THEN NULL;\nEND $$",
                table = quote(def.table),
                name = quote(&foreign_key_name(def, field.name)),
                column = quote(field.name),
                target = quote(target.table),
                action = on_delete.sql(),
            ))
        })
        .collect()
}

/// Unique indexes for every unique key, plain indexes for filter and
/// reference columns that no single-column unique index covers.
pub fn indexes(def: &EntityDef) -> Vec<String> {
    let mut statements: Vec<String> = def
        .unique_keys
        .iter()
        .map(|key| {
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ({})",
                quote(&unique_key_name(def, &key.fields)),
                quote(def.table),
                key.fields.iter().map(|field| quote(field)).join(", ")
            )
        })
        .collect();

    let covered = |name: &str| {
        def.unique_keys
            .iter()
            .any(|key| key.fields.first() == Some(&name))
    };
    let indexed = def
        .filters
        .iter()
        .copied()
        .chain(def.references().map(|(field, _, _)| field.name))
        .unique()
        .filter(|name| !covered(name));
    statements.extend(indexed.map(|name| {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote(&format!("{}_{}_idx", def.table, name)),
            quote(def.table),
            quote(name)
        )
    }));
    statements
}

/// Every statement needed to bring an empty database up to the catalog.
pub fn migration_statements(catalog: &Catalog) -> Vec<String> {
    let entities = catalog.entities();
    entities
        .iter()
        .map(create_table)
        .chain(std::iter::once(RETIRED_CODES_DDL.to_string()))
        .chain(entities.iter().flat_map(|def| foreign_keys(def, catalog)))
        .chain(entities.iter().flat_map(indexes))
        .collect()
}
