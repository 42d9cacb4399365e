use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use crate::error::{QmsError, QmsResult};
use crate::model::{catalog, definition, display_value, EntityDef, EntityKind, Id, OnDelete, Record, RetiredCode, Timestamp};
use crate::store::RecordStore;

/// Every non-null reference in `values` must point at an existing row.
pub async fn check_references<S: RecordStore + ?Sized>(
    store: &S,
    def: &EntityDef,
    values: &Map<String, Value>,
) -> QmsResult<()> {
    for (field, target, _) in def.references() {
        let Some(raw) = values.get(field.name).and_then(Value::as_str) else {
            continue;
        };
        let Ok(id) = Id::parse_str(raw) else {
            return Err(QmsError::invalid(field.name, "must be a UUID"));
        };
        if store.get_record(target, &id).await?.is_none() {
            return Err(QmsError::Reference {
                field: field.name.to_string(),
                target,
                id,
            });
        }
    }
    Ok(())
}

/// Checks the unique keys of `fields`. On update only keys touching a field
/// in `changed` are checked and the row itself (`own_id`) is ignored.
pub async fn check_uniqueness<S: RecordStore + ?Sized>(
    store: &S,
    def: &EntityDef,
    fields: &Map<String, Value>,
    changed: Option<&Map<String, Value>>,
    own_id: Option<Id>,
    case_insensitive: bool,
) -> QmsResult<()> {
    for key in &def.unique_keys {
        if let Some(changed) = changed {
            if !key.fields.iter().any(|name| changed.contains_key(*name)) {
                continue;
            }
        }

        let mut criteria = Vec::with_capacity(key.fields.len());
        for name in &key.fields {
            match fields.get(*name) {
                Some(value) if !value.is_null() => criteria.push((*name, value.clone())),
                _ => break,
            }
        }
        if criteria.len() != key.fields.len() {
            continue;
        }

        let display = criteria
            .iter()
            .map(|(_, value)| display_value(value))
            .collect::<Vec<_>>()
            .join(", ");
        let conflict = |retired| QmsError::UniquenessConflict {
            entity: def.kind,
            fields: key.fields.iter().map(|name| name.to_string()).collect(),
            value: display.clone(),
            retired,
        };

        let matches = store
            .find_matching(def.kind, &criteria, case_insensitive)
            .await?;
        if matches.iter().any(|id| Some(*id) != own_id) {
            return Err(conflict(false));
        }

        if key.retired_on_delete {
            if let Some((name, Value::String(code))) = criteria.first() {
                if store
                    .is_code_retired(def.kind, name, code, case_insensitive)
                    .await?
                {
                    return Err(conflict(true));
                }
            }
        }
    }
    Ok(())
}

/// Rejects a parent assignment that would make `id` its own ancestor.
pub async fn check_hierarchy<S: RecordStore + ?Sized>(
    store: &S,
    def: &EntityDef,
    id: Id,
    parent: Option<Id>,
) -> QmsResult<()> {
    let Some(field) = def.hierarchy else {
        return Ok(());
    };
    let cycle = || QmsError::invalid(field, "would create a cycle");

    let mut visited = HashSet::new();
    let mut current = parent;
    while let Some(ancestor) = current {
        if ancestor == id {
            return Err(cycle());
        }
        if !visited.insert(ancestor) {
            break;
        }
        current = store
            .get_record(def.kind, &ancestor)
            .await?
            .and_then(|record| record.get_id(field));
    }
    Ok(())
}

/// Everything a delete has to do, computed before anything is written.
#[derive(Debug, Clone, Default)]
pub struct DeletePlan {
    /// Rows to delete, dependents before the rows they depend on. The
    /// requested row is last.
    pub deletes: Vec<Record>,
    /// Surviving rows whose references to deleted rows are cleared.
    pub nullify: Vec<(Record, Vec<&'static str>)>,
}

impl DeletePlan {
    /// Codes of deleted rows that stay reserved.
    pub fn retired_codes(&self, now: Timestamp) -> Vec<RetiredCode> {
        self.deletes
            .iter()
            .flat_map(|record| {
                definition(record.kind)
                    .unique_keys
                    .iter()
                    .filter(|key| key.retired_on_delete && key.fields.len() == 1)
                    .filter_map(move |key| {
                        record.get_str(key.fields[0]).map(|value| RetiredCode {
                            kind: record.kind,
                            field: key.fields[0],
                            value: value.to_string(),
                            retired_at: now,
                        })
                    })
            })
            .collect()
    }
}

struct Blocker {
    entity: EntityKind,
    id: Id,
    dependent: EntityKind,
    dependent_id: Id,
    field: &'static str,
}

/// Walks the dependents of `kind`/`id` following each reference's delete
/// policy. Cascades are followed transitively; a restricting reference from
/// a row that is not itself deleted aborts the plan.
pub async fn plan_delete<S: RecordStore + ?Sized>(
    store: &S,
    kind: EntityKind,
    id: Id,
) -> QmsResult<DeletePlan> {
    let root = store
        .get_record(kind, &id)
        .await?
        .ok_or(QmsError::NotFound { entity: kind, id })?;

    let mut deleting: HashSet<(EntityKind, Id)> = HashSet::from([(kind, id)]);
    let mut deletes = Vec::new();
    let mut nullify: HashMap<(EntityKind, Id), (Record, Vec<&'static str>)> = HashMap::new();
    let mut nullify_order = Vec::new();
    let mut blockers = Vec::new();

    let mut stack = vec![(root, false)];
    while let Some((record, expanded)) = stack.pop() {
        if expanded {
            deletes.push(record);
            continue;
        }
        let (record_kind, record_id) = (record.kind, record.id);
        stack.push((record, true));

        for dependent in catalog().dependents_of(record_kind) {
            let rows = store
                .find_referencing(dependent.kind, dependent.field, &record_id)
                .await?;
            for row in rows {
                let key = (row.kind, row.id);
                match dependent.on_delete {
                    OnDelete::Cascade => {
                        if deleting.insert(key) {
                            stack.push((row, false));
                        }
                    }
                    OnDelete::SetNull => {
                        let entry = nullify.entry(key).or_insert_with(|| {
                            nullify_order.push(key);
                            (row, Vec::new())
                        });
                        if !entry.1.contains(&dependent.field) {
                            entry.1.push(dependent.field);
                        }
                    }
                    OnDelete::Restrict => blockers.push(Blocker {
                        entity: record_kind,
                        id: record_id,
                        dependent: row.kind,
                        dependent_id: row.id,
                        field: dependent.field,
                    }),
                }
            }
        }
    }

    let live: Vec<&Blocker> = blockers
        .iter()
        .filter(|blocker| !deleting.contains(&(blocker.dependent, blocker.dependent_id)))
        .collect();
    if let Some(first) = live.first() {
        let count = live
            .iter()
            .filter(|b| b.entity == first.entity && b.id == first.id && b.dependent == first.dependent && b.field == first.field)
            .count();
        return Err(QmsError::DependencyConflict {
            entity: first.entity,
            id: first.id,
            dependent: first.dependent,
            field: first.field.to_string(),
            count,
        });
    }

    let nullify = nullify_order
        .into_iter()
        .filter(|key| !deleting.contains(key))
        .filter_map(|key| nullify.remove(&key))
        .collect();

    Ok(DeletePlan { deletes, nullify })
}
