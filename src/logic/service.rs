use chrono::Duration;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QmsError, QmsResult};
use crate::logic::clock::Clock;
use crate::logic::query::{parse_list_query, QueryLimits};
use crate::logic::{integrity, journal, rules, validate};
use crate::model::{
    definition, generate_id, Actor, ChangeSet, EntityDef, EntityKind, Id, Page, Record,
    Timestamp,
};
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub limits: QueryLimits,
    /// Reject lifecycle moves along undeclared edges.
    pub enforce_transitions: bool,
    /// When false, unique text keys compare without case.
    pub case_sensitive_codes: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            limits: QueryLimits::default(),
            enforce_transitions: false,
            case_sensitive_codes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordRef {
    pub entity: EntityKind,
    pub id: Id,
}

impl From<&Record> for RecordRef {
    fn from(record: &Record) -> Self {
        Self {
            entity: record.kind,
            id: record.id,
        }
    }
}

/// What a delete removed and which surviving rows lost a reference.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteSummary {
    pub entity: EntityKind,
    pub id: Id,
    /// Every deleted row, dependents first, the requested row last.
    pub deleted: Vec<RecordRef>,
    pub nullified: Vec<RecordRef>,
}

/// Create, read, update, delete and list for every catalog entity.
pub struct EntityService<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    settings: ServiceSettings,
}

impl<S: Store> EntityService<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, settings: ServiceSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    fn case_insensitive(&self) -> bool {
        !self.settings.case_sensitive_codes
    }

    fn writable(kind: EntityKind) -> QmsResult<&'static EntityDef> {
        let def = definition(kind);
        if def.writable {
            Ok(def)
        } else {
            Err(QmsError::ReadOnly(kind))
        }
    }

    pub async fn get(&self, kind: EntityKind, id: Id) -> QmsResult<Record> {
        self.store
            .get_record(kind, &id)
            .await?
            .map(rules::decorate)
            .ok_or(QmsError::NotFound { entity: kind, id })
    }

    pub async fn list(&self, kind: EntityKind, params: &HashMap<String, String>) -> QmsResult<Page<Record>> {
        let def = definition(kind);
        let query = parse_list_query(def, params, self.settings.limits).map_err(QmsError::Validation)?;
        let (items, total) = self.store.list_records(kind, &query).await?;
        Ok(Page {
            items: items.into_iter().map(rules::decorate).collect(),
            total,
            offset: query.pagination.offset,
            limit: query.pagination.limit,
        })
    }

    /// Lists `child` rows that point at the given parent through the single
    /// reference `child` declares towards `parent`.
    pub async fn list_children(
        &self,
        parent: EntityKind,
        parent_id: Id,
        child: EntityKind,
        params: &HashMap<String, String>,
    ) -> QmsResult<Page<Record>> {
        self.get(parent, parent_id).await?;

        let child_def = definition(child);
        let link = match child_def.references_to(parent).as_slice() {
            [field] => field.name,
            [] => {
                return Err(QmsError::invalid(
                    child_def.slug,
                    format!("is not related to {}", parent),
                ))
            }
            _ => {
                return Err(QmsError::invalid(
                    child_def.slug,
                    format!("relates to {} through more than one field", parent),
                ))
            }
        };

        let mut params = params.clone();
        params.remove(link);
        let query = parse_list_query(child_def, &params, self.settings.limits)
            .map_err(QmsError::Validation)?
            .with_filter(link, Value::String(parent_id.to_string()));
        let (items, total) = self.store.list_records(child, &query).await?;
        Ok(Page {
            items: items.into_iter().map(rules::decorate).collect(),
            total,
            offset: query.pagination.offset,
            limit: query.pagination.limit,
        })
    }

    pub async fn create(&self, kind: EntityKind, input: Map<String, Value>, actor: &Actor) -> QmsResult<Record> {
        let def = Self::writable(kind)?;
        let now = self.clock.now();

        let mut fields = validate::validate_create(def, input, &now).map_err(|errors| {
            log::debug!("Rejected {} create: {} invalid field(s)", kind, errors.len());
            QmsError::Validation(errors)
        })?;
        let store = self.store.as_ref();
        rules::assign_generated(store, kind, &mut fields).await?;
        rules::apply_derived(kind, &mut fields);

        integrity::check_references(store, def, &fields).await?;
        integrity::check_uniqueness(store, def, &fields, None, None, self.case_insensitive()).await?;

        let record = Record::new(kind, generate_id(), fields, now);
        rules::check_rules(store, None, &record).await?;

        let mut changes = ChangeSet::new();
        changes.insert(record.clone());
        changes.insert(journal::created(&record, actor, now));
        if let Some(evaluation) = rules::risk_evaluation(None, &record, actor, now) {
            changes.insert(evaluation);
        }
        self.commit(kind, Operation::Write, changes).await?;

        log::info!("Created {} {}", kind, record.id);
        Ok(record)
    }

    /// Applies a partial update. A patch that changes nothing returns the row
    /// untouched.
    pub async fn update(
        &self,
        kind: EntityKind,
        id: Id,
        patch: Map<String, Value>,
        actor: &Actor,
    ) -> QmsResult<Record> {
        let def = Self::writable(kind)?;
        let store = self.store.as_ref();
        let existing = self.get(kind, id).await?;

        let requested = validate::validate_update(def, &existing, patch).map_err(|errors| {
            log::debug!("Rejected {} {} update: {} invalid field(s)", kind, id, errors.len());
            QmsError::Validation(errors)
        })?;

        if self.settings.enforce_transitions {
            if let Some(lifecycle) = &def.lifecycle {
                if let Some(to) = requested.get(lifecycle.field).and_then(Value::as_str) {
                    let from = existing.get_str(lifecycle.field).unwrap_or(lifecycle.initial);
                    if !lifecycle.allows(from, to) {
                        return Err(QmsError::invalid(
                            lifecycle.field,
                            format!("cannot move from {} to {}", from, to),
                        ));
                    }
                }
            }
        }

        let mut fields = existing.fields.clone();
        for (name, value) in &requested {
            fields.insert(name.clone(), value.clone());
        }
        rules::apply_derived(kind, &mut fields);

        let changed: Map<String, Value> = fields
            .iter()
            .filter(|(name, value)| existing.fields.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if changed.is_empty() {
            return Ok(existing);
        }

        integrity::check_references(store, def, &changed).await?;
        if let Some(parent_field) = def.hierarchy {
            if changed.contains_key(parent_field) {
                let parent = changed
                    .get(parent_field)
                    .and_then(Value::as_str)
                    .and_then(|raw| Id::parse_str(raw).ok());
                integrity::check_hierarchy(store, def, id, parent).await?;
            }
        }
        integrity::check_uniqueness(store, def, &fields, Some(&changed), Some(id), self.case_insensitive())
            .await?;

        let now = self.write_time(&existing);
        let updated = Record {
            fields,
            updated_at: now,
            ..existing.clone()
        };
        rules::check_rules(store, Some(&existing), &updated).await?;

        let mut changes = ChangeSet::new();
        changes.update(updated.clone());
        changes.insert(journal::updated(&existing, &updated, actor, now));
        if let Some(history) = journal::state_change(&existing, &updated, actor, now) {
            changes.insert(history);
        }
        if let Some(evaluation) = rules::risk_evaluation(Some(&existing), &updated, actor, now) {
            changes.insert(evaluation);
        }
        self.commit(kind, Operation::Write, changes).await?;

        log::info!("Updated {} {} ({} field(s))", kind, id, changed.len());
        Ok(updated)
    }

    /// Deletes a row together with everything that cascades from it,
    /// clearing set-null references, all in one change set.
    pub async fn delete(&self, kind: EntityKind, id: Id, actor: &Actor) -> QmsResult<DeleteSummary> {
        Self::writable(kind)?;
        let plan = integrity::plan_delete(self.store.as_ref(), kind, id)
            .await
            .map_err(|err| {
                if let QmsError::DependencyConflict { .. } = &err {
                    log::debug!("Rejected delete of {} {}: {}", kind, id, err);
                }
                err
            })?;
        rules::check_delete(self.store.as_ref(), &plan.deletes).await?;
        let now = self.clock.now();

        let mut changes = ChangeSet::new();
        let mut nullified = Vec::with_capacity(plan.nullify.len());
        for (before, fields) in &plan.nullify {
            let mut after = before.clone();
            for field in fields {
                after.fields.insert(field.to_string(), Value::Null);
            }
            after.updated_at = self.write_time(before);
            changes.update(after.clone());
            changes.insert(journal::updated(before, &after, actor, after.updated_at));
            nullified.push(RecordRef::from(&after));
        }
        for record in &plan.deletes {
            changes.delete(record.kind, record.id);
            changes.insert(journal::deleted(record, actor, now));
        }
        for code in plan
            .retired_codes(now)
            .into_iter()
            .chain(rules::retired_numbers(&plan.deletes, now))
        {
            changes.retire(code);
        }
        self.commit(kind, Operation::Delete, changes).await?;

        log::info!(
            "Deleted {} {} ({} row(s) removed, {} reference(s) cleared)",
            kind,
            id,
            plan.deletes.len(),
            nullified.len()
        );
        Ok(DeleteSummary {
            entity: kind,
            id,
            deleted: plan.deletes.iter().map(RecordRef::from).collect(),
            nullified,
        })
    }

    /// `updated_at` must move forward even when the clock has not.
    fn write_time(&self, existing: &Record) -> Timestamp {
        self.clock
            .now()
            .max(existing.updated_at + Duration::microseconds(1))
    }

    async fn commit(&self, kind: EntityKind, operation: Operation, changes: ChangeSet) -> QmsResult<()> {
        let size = changes.len();
        let Err(err) = self.store.apply(changes).await else {
            return Ok(());
        };

        let mut mapped = map_store_error(operation, err);
        if let QmsError::DependencyConflict { id, dependent, field, count, .. } = &mut mapped {
            if let Ok(rows) = self.store.find_referencing(*dependent, field.as_str(), &*id).await {
                *count = rows.len().max(1);
            }
        }
        if let QmsError::Storage(err) = &mapped {
            log::error!("Failed to apply {} change(s) for {}: {:#}", size, kind, err);
        } else {
            log::warn!("Store rejected {} change set: {}", kind, mapped);
        }
        Err(mapped)
    }
}

/// Whether a change set writes rows or removes them; a broken reference
/// means something different for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Write,
    Delete,
}

/// Constraint violations the checks above could not see (for example a
/// concurrent writer) come back from the store as [`StoreError`]s.
fn map_store_error(operation: Operation, err: anyhow::Error) -> QmsError {
    match err.downcast_ref::<StoreError>() {
        Some(StoreError::UniqueViolation { entity, fields, value }) => QmsError::UniquenessConflict {
            entity: *entity,
            fields: fields.clone(),
            value: value.clone(),
            retired: false,
        },
        Some(StoreError::ForeignKeyViolation { entity, field, target, id }) => match operation {
            Operation::Write => QmsError::Reference {
                field: field.clone(),
                target: *target,
                id: *id,
            },
            Operation::Delete => QmsError::DependencyConflict {
                entity: *target,
                id: *id,
                dependent: *entity,
                field: field.clone(),
                count: 1,
            },
        },
        _ => QmsError::Storage(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generate_id;

    fn dangling(target: Id) -> anyhow::Error {
        StoreError::ForeignKeyViolation {
            entity: EntityKind::User,
            field: "area_id".to_string(),
            target: EntityKind::Area,
            id: target,
        }
        .into()
    }

    #[test]
    fn test_broken_reference_on_write_is_a_reference_error() {
        let area = generate_id();
        match map_store_error(Operation::Write, dangling(area)) {
            QmsError::Reference { field, target, id } => {
                assert_eq!(field, "area_id");
                assert_eq!((target, id), (EntityKind::Area, area));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_broken_reference_on_delete_is_a_dependency_conflict() {
        let area = generate_id();
        match map_store_error(Operation::Delete, dangling(area)) {
            QmsError::DependencyConflict { entity, id, dependent, field, .. } => {
                assert_eq!((entity, id), (EntityKind::Area, area));
                assert_eq!((dependent, field.as_str()), (EntityKind::User, "area_id"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unique_violation_keeps_its_fields() {
        let err = StoreError::UniqueViolation {
            entity: EntityKind::ProcessStage,
            fields: vec!["process_id".to_string(), "sequence".to_string()],
            value: "p, 2".to_string(),
        };
        match map_store_error(Operation::Write, err.into()) {
            QmsError::UniquenessConflict { fields, retired, .. } => {
                assert_eq!(fields, vec!["process_id", "sequence"]);
                assert!(!retired);
            }
            other => panic!("unexpected error {:?}", other),
        }
        let other = map_store_error(Operation::Delete, anyhow::anyhow!("connection reset"));
        assert_eq!(other.code(), "storage_error");
    }
}
