use anyhow::{anyhow, Result};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::{catalog, definition, Change, ChangeSet, EntityKind, Id, ListQuery, Record, RetiredCode};
use crate::store::traits::{ChangeStore, RecordStore, Store, StoreError};

#[derive(Debug, Clone)]
struct StoredRow {
    record: Record,
    /// Insertion sequence, breaks ties between equal creation timestamps.
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tables: HashMap<EntityKind, HashMap<Id, StoredRow>>,
    retired: Vec<RetiredCode>,
    next_seq: u64,
}

impl MemoryState {
    fn table(&self, kind: EntityKind) -> impl Iterator<Item = &StoredRow> {
        self.tables.get(&kind).into_iter().flat_map(|rows| rows.values())
    }

    fn contains(&self, kind: EntityKind, id: &Id) -> bool {
        self.tables
            .get(&kind)
            .map(|rows| rows.contains_key(id))
            .unwrap_or(false)
    }

    fn insert(&mut self, record: Record) -> Result<()> {
        if self.contains(record.kind, &record.id) {
            return Err(StoreError::unique(&record, &["id"]).into());
        }
        self.check_constraints(&record)?;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tables
            .entry(record.kind)
            .or_default()
            .insert(record.id, StoredRow { record, seq });
        Ok(())
    }

    fn update(&mut self, record: Record) -> Result<()> {
        self.check_constraints(&record)?;
        let row = self
            .tables
            .get_mut(&record.kind)
            .and_then(|rows| rows.get_mut(&record.id))
            .ok_or_else(|| anyhow!("{} {} does not exist", record.kind, record.id))?;
        row.record = record;
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, id: &Id) -> Result<()> {
        self.tables
            .get_mut(&kind)
            .and_then(|rows| rows.remove(id))
            .map(|_| ())
            .ok_or_else(|| anyhow!("{} {} does not exist", kind, id))
    }

    /// Foreign keys and unique keys, the way the database would enforce
    /// them.
    fn check_constraints(&self, record: &Record) -> Result<()> {
        let def = definition(record.kind);
        for (field, target, _) in def.references() {
            if let Some(target_id) = record.get_id(field.name) {
                if !self.contains(target, &target_id) {
                    return Err(StoreError::ForeignKeyViolation {
                        entity: record.kind,
                        field: field.name.to_string(),
                        target,
                        id: target_id,
                    }
                    .into());
                }
            }
        }
        for key in &def.unique_keys {
            let Some(values) = key
                .fields
                .iter()
                .map(|name| record.get(name))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            let clash = self.table(record.kind).any(|row| {
                row.record.id != record.id
                    && key
                        .fields
                        .iter()
                        .zip(&values)
                        .all(|(name, value)| row.record.get(name) == Some(*value))
            });
            if clash {
                return Err(StoreError::unique(record, &key.fields).into());
            }
        }
        Ok(())
    }

    fn check_no_dangling(&self, deleted: &[(EntityKind, Id)]) -> Result<()> {
        for (kind, id) in deleted {
            for dependent in catalog().dependents_of(*kind) {
                if self
                    .table(dependent.kind)
                    .any(|row| row.record.get_id(dependent.field) == Some(*id))
                {
                    return Err(StoreError::ForeignKeyViolation {
                        entity: dependent.kind,
                        field: dependent.field.to_string(),
                        target: *kind,
                        id: *id,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// Process-local store. Change sets are applied to a copy of the state that
/// replaces the original only when every change succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_at: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `apply` fail right before its change number `index`
    /// (zero-based), after the earlier changes have been applied to the
    /// working copy.
    pub fn fail_after(&self, index: usize) {
        *self.fail_at.lock() = Some(index);
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.state
            .read()
            .tables
            .get(&kind)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn get_record(&self, kind: EntityKind, id: &Id) -> Result<Option<Record>> {
        Ok(self
            .state
            .read()
            .tables
            .get(&kind)
            .and_then(|rows| rows.get(id))
            .map(|row| row.record.clone()))
    }

    async fn list_records(&self, kind: EntityKind, query: &ListQuery) -> Result<(Vec<Record>, u64)> {
        let order_by = &definition(kind).order_by;
        let state = self.state.read();
        let mut rows: Vec<&StoredRow> = state
            .table(kind)
            .filter(|row| matches_filters(&row.record, query))
            .collect();

        rows.sort_by(|a, b| {
            order_by
                .iter()
                .map(|field| {
                    compare_values(
                        a.record.fields.get(*field).unwrap_or(&Value::Null),
                        b.record.fields.get(*field).unwrap_or(&Value::Null),
                    )
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
                .then(a.record.created_at.cmp(&b.record.created_at))
                .then(a.seq.cmp(&b.seq))
        });

        let total = rows.len() as u64;
        let page = rows
            .into_iter()
            .skip(query.pagination.offset as usize)
            .take(query.pagination.limit as usize)
            .map(|row| row.record.clone())
            .collect();
        Ok((page, total))
    }

    async fn find_referencing(&self, kind: EntityKind, field: &str, id: &Id) -> Result<Vec<Record>> {
        let state = self.state.read();
        let mut rows: Vec<&StoredRow> = state
            .table(kind)
            .filter(|row| row.record.get_id(field) == Some(*id))
            .collect();
        rows.sort_by_key(|row| row.seq);
        Ok(rows.into_iter().map(|row| row.record.clone()).collect())
    }

    async fn find_matching(
        &self,
        kind: EntityKind,
        criteria: &[(&str, Value)],
        case_insensitive: bool,
    ) -> Result<Vec<Id>> {
        let state = self.state.read();
        Ok(state
            .table(kind)
            .filter(|row| {
                criteria.iter().all(|(field, value)| {
                    let stored = row.record.fields.get(*field).unwrap_or(&Value::Null);
                    values_match(stored, value, case_insensitive)
                })
            })
            .map(|row| row.record.id)
            .collect())
    }

    async fn count_grouped(
        &self,
        kind: EntityKind,
        group_by: &[&str],
        query: &ListQuery,
    ) -> Result<Vec<(Vec<Value>, u64)>> {
        let state = self.state.read();
        let mut groups: Vec<(Vec<Value>, u64)> = Vec::new();
        for row in state.table(kind).filter(|row| matches_filters(&row.record, query)) {
            let key: Vec<Value> = group_by
                .iter()
                .map(|field| row.record.fields.get(*field).cloned().unwrap_or(Value::Null))
                .collect();
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, count)) => *count += 1,
                None => groups.push((key, 1)),
            }
        }
        groups.sort_by(|(a, _), (b, _)| {
            a.iter()
                .zip(b)
                .map(|(x, y)| compare_values(x, y))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(groups)
    }

    async fn is_code_retired(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
        case_insensitive: bool,
    ) -> Result<bool> {
        Ok(self.state.read().retired.iter().any(|code| {
            code.kind == kind
                && code.field == field
                && (code.value == value
                    || (case_insensitive && code.value.to_lowercase() == value.to_lowercase()))
        }))
    }
}

#[async_trait::async_trait]
impl ChangeStore for MemoryStore {
    async fn apply(&self, changes: ChangeSet) -> Result<()> {
        let fail_at = self.fail_at.lock().take();
        let mut state = self.state.write();
        let mut working = state.clone();
        let mut deleted = Vec::new();

        for (index, change) in changes.into_iter().enumerate() {
            if fail_at == Some(index) {
                log::warn!("Injected store failure before change {}", index);
                return Err(StoreError::Injected(index).into());
            }
            match change {
                Change::Insert(record) => working.insert(record)?,
                Change::Update(record) => working.update(record)?,
                Change::Delete { kind, id } => {
                    working.delete(kind, &id)?;
                    deleted.push((kind, id));
                }
                Change::RetireCode(code) => working.retired.push(code),
            }
        }
        working.check_no_dangling(&deleted)?;

        *state = working;
        Ok(())
    }
}

impl Store for MemoryStore {}

fn matches_filters(record: &Record, query: &ListQuery) -> bool {
    query
        .filters
        .iter()
        .all(|(field, value)| record.fields.get(*field).unwrap_or(&Value::Null) == value)
}

fn values_match(stored: &Value, wanted: &Value, case_insensitive: bool) -> bool {
    match (stored, wanted) {
        (Value::String(a), Value::String(b)) if case_insensitive => {
            a.to_lowercase() == b.to_lowercase()
        }
        _ => stored == wanted,
    }
}

/// Ascending order with nulls last.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}
