mod audits;
mod documents;
mod people;
mod processes;
mod quality;
mod risks;
mod system;
mod training;

pub use processes::PHVA_STAGES;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::model::{EntityKind, FieldDef, Lifecycle, OnDelete};

/// A set of fields whose combined value must be unique across the entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueKey {
    pub fields: Vec<&'static str>,
    /// Values of a single-field key stay reserved after the row is deleted.
    pub retired_on_delete: bool,
}

/// Canonical definition of one record type.
#[derive(Debug, Clone, Serialize)]
pub struct EntityDef {
    pub kind: EntityKind,
    pub table: &'static str,
    /// Path segment used by the HTTP API.
    pub slug: &'static str,
    pub fields: Vec<FieldDef>,
    pub unique_keys: Vec<UniqueKey>,
    /// Fields accepted as equality filters on list.
    pub filters: Vec<&'static str>,
    /// Natural order, applied before creation order.
    pub order_by: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<Lifecycle>,
    /// Self-reference forming a tree that must stay acyclic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchy: Option<&'static str>,
    /// False for journal entities that only the service writes.
    pub writable: bool,
}

impl EntityDef {
    pub fn new(kind: EntityKind, table: &'static str, slug: &'static str) -> Self {
        Self {
            kind,
            table,
            slug,
            fields: Vec::new(),
            unique_keys: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            lifecycle: None,
            hierarchy: None,
            writable: true,
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// A required text code, unique for the lifetime of the entity.
    pub fn unique_code(mut self, name: &'static str) -> Self {
        self.unique_keys.push(UniqueKey {
            fields: vec![name],
            retired_on_delete: true,
        });
        self
    }

    pub fn unique(mut self, fields: &[&'static str]) -> Self {
        self.unique_keys.push(UniqueKey {
            fields: fields.to_vec(),
            retired_on_delete: false,
        });
        self
    }

    pub fn filters(mut self, fields: &[&'static str]) -> Self {
        self.filters.extend_from_slice(fields);
        self
    }

    pub fn order_by(mut self, fields: &[&'static str]) -> Self {
        self.order_by = fields.to_vec();
        self
    }

    /// Attaches a state machine; the state field is added if not yet declared.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        if self.field_def(lifecycle.field).is_none() {
            self.fields.push(
                FieldDef::enumeration(lifecycle.field, lifecycle.states)
                    .default_text(lifecycle.initial),
            );
        }
        if !self.filters.contains(&lifecycle.field) {
            self.filters.push(lifecycle.field);
        }
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn hierarchy(mut self, field: &'static str) -> Self {
        self.hierarchy = Some(field);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|field| field.name).collect()
    }

    pub fn references(&self) -> impl Iterator<Item = (&FieldDef, EntityKind, OnDelete)> {
        self.fields.iter().filter_map(|field| {
            field
                .reference_target()
                .map(|(target, on_delete)| (field, target, on_delete))
        })
    }

    /// Reference fields of this entity that point at `target`.
    pub fn references_to(&self, target: EntityKind) -> Vec<&FieldDef> {
        self.references()
            .filter(|(_, to, _)| *to == target)
            .map(|(field, _, _)| field)
            .collect()
    }

    pub fn is_filterable(&self, name: &str) -> bool {
        self.filters.iter().any(|filter| *filter == name)
    }
}

/// Compact view for `GET /meta/catalog`.
#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub entity: EntityKind,
    pub slug: &'static str,
    pub fields: usize,
    pub writable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<&'static str>,
}

/// A reference from some entity into another one, as seen from the target.
#[derive(Debug, Clone, Copy)]
pub struct Dependent {
    pub kind: EntityKind,
    pub field: &'static str,
    pub on_delete: OnDelete,
}

pub struct Catalog {
    entities: Vec<EntityDef>,
    by_kind: HashMap<EntityKind, usize>,
    by_slug: HashMap<&'static str, usize>,
    dependents: HashMap<EntityKind, Vec<Dependent>>,
}

impl Catalog {
    fn build() -> Self {
        let entities: Vec<EntityDef> = [
            people::definitions(),
            processes::definitions(),
            documents::definitions(),
            quality::definitions(),
            audits::definitions(),
            risks::definitions(),
            training::definitions(),
            system::definitions(),
        ]
        .into_iter()
        .flatten()
        .collect();

        let mut by_kind = HashMap::new();
        let mut by_slug = HashMap::new();
        let mut dependents: HashMap<EntityKind, Vec<Dependent>> = HashMap::new();
        for (index, def) in entities.iter().enumerate() {
            by_kind.insert(def.kind, index);
            by_slug.insert(def.slug, index);
            for (field, target, on_delete) in def.references() {
                dependents.entry(target).or_default().push(Dependent {
                    kind: def.kind,
                    field: field.name,
                    on_delete,
                });
            }
        }

        Self {
            entities,
            by_kind,
            by_slug,
            dependents,
        }
    }

    pub fn entities(&self) -> &[EntityDef] {
        &self.entities
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntityDef> {
        self.by_kind.get(&kind).map(|index| &self.entities[*index])
    }

    pub fn by_slug(&self, slug: &str) -> Option<&EntityDef> {
        self.by_slug.get(slug).map(|index| &self.entities[*index])
    }

    /// Resolves either a slug (`process-stages`) or an entity name
    /// (`process_stage`).
    pub fn resolve(&self, name: &str) -> Option<&EntityDef> {
        self.by_slug(name)
            .or_else(|| EntityKind::from_name(name).and_then(|kind| self.get(kind)))
    }

    /// Every reference that points at `kind`.
    pub fn dependents_of(&self, kind: EntityKind) -> &[Dependent] {
        self.dependents
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn summaries(&self) -> Vec<EntitySummary> {
        self.entities
            .iter()
            .map(|def| EntitySummary {
                entity: def.kind,
                slug: def.slug,
                fields: def.fields.len(),
                writable: def.writable,
                lifecycle: def.lifecycle.as_ref().map(|lifecycle| lifecycle.field),
            })
            .collect()
    }
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(Catalog::build)
}

/// Definition of `kind`. Every kind is registered, which the catalog tests
/// check.
pub fn definition(kind: EntityKind) -> &'static EntityDef {
    match catalog().get(kind) {
        Some(def) => def,
        None => unreachable!("entity {} missing from catalog", kind),
    }
}
