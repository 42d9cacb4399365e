use anyhow::Result;
use serde_json::Value;
use thiserror::Error;

use crate::model::{definition, ChangeSet, EntityKind, Id, ListQuery, Record};

/// Constraint failures a store reports while applying a change set. They
/// travel inside `anyhow::Error` and are recovered with `downcast_ref`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with ({}) = ({value}) already exists", .fields.join(", "))]
    UniqueViolation {
        entity: EntityKind,
        fields: Vec<String>,
        value: String,
    },
    /// `entity.field` points at `target` `id`, which is missing after the
    /// change set: either the write named a missing row or a delete removed
    /// a row that is still referenced.
    #[error("foreign key {entity}.{field} -> {target} {id} violated")]
    ForeignKeyViolation {
        entity: EntityKind,
        field: String,
        target: EntityKind,
        id: Id,
    },
    #[error("injected failure at change {0}")]
    Injected(usize),
}

impl StoreError {
    pub fn unique(record: &Record, fields: &[&str]) -> Self {
        StoreError::UniqueViolation {
            entity: record.kind,
            fields: fields.iter().map(|field| field.to_string()).collect(),
            value: record.describe_values(fields),
        }
    }

    /// Violation for the reference `field` of a written record, when the
    /// field holds a reference.
    pub fn missing_reference(record: &Record, field: &str) -> Option<Self> {
        let (target, _) = definition(record.kind).field_def(field)?.reference_target()?;
        Some(StoreError::ForeignKeyViolation {
            entity: record.kind,
            field: field.to_string(),
            target,
            id: record.get_id(field)?,
        })
    }
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_record(&self, kind: EntityKind, id: &Id) -> Result<Option<Record>>;

    /// One page of rows matching `query`, plus the number of matching rows
    /// ignoring the page window.
    async fn list_records(&self, kind: EntityKind, query: &ListQuery) -> Result<(Vec<Record>, u64)>;

    /// Rows of `kind` whose reference `field` points at `id`.
    async fn find_referencing(&self, kind: EntityKind, field: &str, id: &Id) -> Result<Vec<Record>>;

    /// Ids of rows whose fields equal every given value. Textual fields
    /// compare without case when `case_insensitive` is set.
    async fn find_matching(
        &self,
        kind: EntityKind,
        criteria: &[(&str, Value)],
        case_insensitive: bool,
    ) -> Result<Vec<Id>>;

    /// Row counts per distinct combination of `group_by` values among rows
    /// matching the filters of `query`, ordered by those values with nulls
    /// last. The page window is ignored.
    async fn count_grouped(
        &self,
        kind: EntityKind,
        group_by: &[&str],
        query: &ListQuery,
    ) -> Result<Vec<(Vec<Value>, u64)>>;

    async fn is_code_retired(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
        case_insensitive: bool,
    ) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait ChangeStore: Send + Sync {
    /// Applies every change or none of them.
    async fn apply(&self, changes: ChangeSet) -> Result<()>;
}

pub trait Store: RecordStore + ChangeStore + Send + Sync {}
