use anyhow::{anyhow, bail, Context, Result};
use itertools::Itertools;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

use crate::logic::validate::normalize;
use crate::model::{catalog, definition, Change, ChangeSet, EntityDef, EntityKind, FieldType, Id, ListQuery, Record};
use crate::store::schema::{self, quote, sql_type};
use crate::store::traits::{ChangeStore, RecordStore, Store, StoreError};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Creates missing tables, foreign keys and indexes for the whole catalog.
    pub async fn migrate(&self) -> Result<()> {
        let statements = schema::migration_statements(catalog());
        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to run migration statement: {}", statement))?;
        }
        log::info!("Schema up to date ({} statements)", statements.len());
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// A WHERE clause together with its positional parameters, bound as text and
/// cast to the column type inside the statement.
#[derive(Debug, Default, PartialEq)]
struct Predicate {
    clauses: Vec<String>,
    params: Vec<String>,
}

impl Predicate {
    fn push(&mut self, def: &EntityDef, field: &str, value: &Value, case_insensitive: bool) -> Result<()> {
        let field_def = def
            .field_def(field)
            .ok_or_else(|| anyhow!("{} has no field {}", def.kind, field))?;
        let column = format!("t.{}", quote(field));
        let index = self.params.len() + 1;

        let clause = match &field_def.ty {
            _ if case_insensitive && field_def.is_textual() => {
                format!("lower({}) = lower(${})", column, index)
            }
            FieldType::Json => format!("{} = ${}::jsonb", column, index),
            ty => format!("{} = ${}::{}", column, index, sql_type(ty)),
        };
        let param = match (&field_def.ty, value) {
            (FieldType::Json, value) => value.to_string(),
            (_, Value::String(text)) => text.clone(),
            (_, value) => value.to_string(),
        };

        self.clauses.push(clause);
        self.params.push(param);
        Ok(())
    }

    fn sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn bind<'q>(&'q self, mut query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        for param in &self.params {
            query = query.bind(param.as_str());
        }
        query
    }
}

fn select_sql(def: &EntityDef) -> String {
    format!("SELECT to_jsonb(t) - 'row_seq' AS data FROM {} AS t", quote(def.table))
}

fn order_sql(def: &EntityDef) -> String {
    def.order_by
        .iter()
        .map(|field| format!("t.{} ASC NULLS LAST", quote(field)))
        .chain(["t.\"created_at\" ASC".to_string(), "t.\"row_seq\" ASC".to_string()])
        .join(", ")
}

fn insert_sql(def: &EntityDef) -> String {
    let columns = std::iter::once("id")
        .chain(def.fields.iter().map(|field| field.name))
        .chain(["created_at", "updated_at"])
        .map(quote)
        .join(", ");
    format!(
        "INSERT INTO {table} ({columns}) SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1::jsonb)",
        table = quote(def.table),
        columns = columns,
    )
}

fn update_sql(def: &EntityDef) -> String {
    let columns = def
        .fields
        .iter()
        .map(|field| field.name)
        .chain(["updated_at"])
        .map(quote)
        .join(", ");
    format!(
        "UPDATE {table} SET ({columns}) = (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1::jsonb)) WHERE \"id\" = $2",
        table = quote(def.table),
        columns = columns,
    )
}

/// Rebuilds a record from `to_jsonb(row)`, bringing every value back to the
/// canonical form the service writes.
fn decode(def: &EntityDef, data: Value) -> Result<Record> {
    let mut record = Record::from_json(def.kind, &def.field_names(), data)
        .ok_or_else(|| anyhow!("Malformed {} row", def.kind))?;
    for field in &def.fields {
        if let Some(value) = record.fields.get_mut(field.name) {
            *value = normalize(field, value.take());
        }
    }
    Ok(record)
}

/// The row a failed statement was writing or deleting.
enum Subject<'a> {
    Write(&'a Record),
    Delete(EntityKind, Id),
}

/// Maps constraint violations onto [`StoreError`] so the service can report
/// them precisely. Constraint names follow [`schema`], so each one resolves
/// to catalog fields.
fn classify(err: sqlx::Error, subject: Subject<'_>, context: String) -> anyhow::Error {
    if let sqlx::Error::Database(db) = &err {
        let constraint = db.constraint().unwrap_or_default();
        let resolved = match (db.code().as_deref(), subject) {
            (Some("23505"), Subject::Write(record)) => {
                schema::unique_key_fields(definition(record.kind), constraint)
                    .map(|fields| StoreError::unique(record, &fields))
            }
            (Some("23503"), Subject::Write(record)) => {
                schema::foreign_key_owner(catalog(), constraint)
                    .filter(|(owner, _)| *owner == record.kind)
                    .and_then(|(_, field)| StoreError::missing_reference(record, field))
            }
            (Some("23503"), Subject::Delete(kind, id)) => {
                schema::foreign_key_owner(catalog(), constraint).map(|(owner, field)| {
                    StoreError::ForeignKeyViolation {
                        entity: owner,
                        field: field.to_string(),
                        target: kind,
                        id,
                    }
                })
            }
            _ => None,
        };
        if let Some(violation) = resolved {
            return violation.into();
        }
    }
    anyhow::Error::new(err).context(context)
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    async fn get_record(&self, kind: EntityKind, id: &Id) -> Result<Option<Record>> {
        let def = definition(kind);
        let sql = format!("{} WHERE t.\"id\" = $1", select_sql(def));
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch {} {}", kind, id))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(decode(def, row.try_get("data")?)?))
    }

    async fn list_records(&self, kind: EntityKind, query: &ListQuery) -> Result<(Vec<Record>, u64)> {
        let def = definition(kind);
        let mut predicate = Predicate::default();
        for (field, value) in &query.filters {
            predicate.push(def, field, value, false)?;
        }

        let count_sql = format!("SELECT COUNT(*) AS total FROM {} AS t{}", quote(def.table), predicate.sql());
        let total: i64 = predicate
            .bind(sqlx::query(&count_sql))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", kind))?
            .try_get("total")?;

        let limit = i64::try_from(query.pagination.limit).context("Limit out of range")?;
        let offset = i64::try_from(query.pagination.offset).context("Offset out of range")?;
        let limit_index = predicate.params.len() + 1;
        let page_sql = format!(
            "{}{} ORDER BY {} LIMIT ${} OFFSET ${}",
            select_sql(def),
            predicate.sql(),
            order_sql(def),
            limit_index,
            limit_index + 1
        );
        let rows = predicate
            .bind(sqlx::query(&page_sql))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list {}", kind))?;

        let records = rows
            .into_iter()
            .map(|row| decode(def, row.try_get("data")?))
            .collect::<Result<Vec<_>>>()?;
        Ok((records, total.max(0) as u64))
    }

    async fn find_referencing(&self, kind: EntityKind, field: &str, id: &Id) -> Result<Vec<Record>> {
        let def = definition(kind);
        if def.field_def(field).and_then(|f| f.reference_target()).is_none() {
            bail!("{}.{} is not a reference", kind, field);
        }
        let sql = format!(
            "{} WHERE t.{} = $1 ORDER BY t.\"row_seq\"",
            select_sql(def),
            quote(field)
        );
        let rows = sqlx::query(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to find {} referencing {}", kind, id))?;
        rows.into_iter()
            .map(|row| decode(def, row.try_get("data")?))
            .collect()
    }

    async fn find_matching(
        &self,
        kind: EntityKind,
        criteria: &[(&str, Value)],
        case_insensitive: bool,
    ) -> Result<Vec<Id>> {
        let def = definition(kind);
        let mut predicate = Predicate::default();
        for (field, value) in criteria {
            predicate.push(def, field, value, case_insensitive)?;
        }
        let sql = format!("SELECT t.\"id\" FROM {} AS t{}", quote(def.table), predicate.sql());
        let rows = predicate
            .bind(sqlx::query(&sql))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to match {}", kind))?;
        rows.into_iter()
            .map(|row| row.try_get::<Id, _>("id").map_err(Into::into))
            .collect()
    }

    async fn count_grouped(
        &self,
        kind: EntityKind,
        group_by: &[&str],
        query: &ListQuery,
    ) -> Result<Vec<(Vec<Value>, u64)>> {
        let def = definition(kind);
        let mut group_fields = Vec::with_capacity(group_by.len());
        for name in group_by {
            let field = def
                .field_def(name)
                .ok_or_else(|| anyhow!("{} has no field {}", kind, name))?;
            group_fields.push(field);
        }
        if group_fields.is_empty() {
            bail!("Grouping {} needs at least one field", kind);
        }

        let mut predicate = Predicate::default();
        for (field, value) in &query.filters {
            predicate.push(def, field, value, false)?;
        }
        let columns = group_fields
            .iter()
            .map(|field| format!("t.{}", quote(field.name)))
            .collect::<Vec<_>>();
        let sql = format!(
            "SELECT jsonb_build_array({keys}) AS key, COUNT(*) AS total FROM {table} AS t{filter} GROUP BY {columns} ORDER BY {order}",
            keys = columns.iter().map(|column| format!("to_jsonb({})", column)).join(", "),
            table = quote(def.table),
            filter = predicate.sql(),
            columns = columns.join(", "),
            order = columns.iter().map(|column| format!("{} ASC NULLS LAST", column)).join(", "),
        );
        let rows = predicate
            .bind(sqlx::query(&sql))
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to count {} by {}", kind, group_by.join(", ")))?;

        rows.into_iter()
            .map(|row| {
                let key: Value = row.try_get("key")?;
                let total: i64 = row.try_get("total")?;
                let values = match key {
                    Value::Array(values) => values,
                    other => bail!("Malformed group key {}", other),
                };
                let values = group_fields
                    .iter()
                    .zip(values)
                    .map(|(field, value)| normalize(field, value))
                    .collect();
                Ok((values, total as u64))
            })
            .collect()
    }

    async fn is_code_retired(
        &self,
        kind: EntityKind,
        field: &str,
        value: &str,
        case_insensitive: bool,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM "retired_codes"
                WHERE "entity" = $1 AND "field" = $2
                  AND ("value" = $3 OR ($4 AND lower("value") = lower($3)))
            ) AS retired
            "#,
        )
        .bind(kind.as_str())
        .bind(field)
        .bind(value)
        .bind(case_insensitive)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check retired codes")?;
        Ok(row.try_get("retired")?)
    }
}

#[async_trait::async_trait]
impl ChangeStore for PostgresStore {
    async fn apply(&self, changes: ChangeSet) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for change in changes {
            match change {
                Change::Insert(record) => {
                    let def = definition(record.kind);
                    sqlx::query(&insert_sql(def))
                        .bind(record.to_json())
                        .execute(&mut *tx)
                        .await
                        .map_err(|err| {
                            classify(
                                err,
                                Subject::Write(&record),
                                format!("Failed to insert {} {}", record.kind, record.id),
                            )
                        })?;
                }
                Change::Update(record) => {
                    let def = definition(record.kind);
                    let result = sqlx::query(&update_sql(def))
                        .bind(record.to_json())
                        .bind(record.id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|err| {
                            classify(
                                err,
                                Subject::Write(&record),
                                format!("Failed to update {} {}", record.kind, record.id),
                            )
                        })?;
                    if result.rows_affected() == 0 {
                        bail!("{} {} does not exist", record.kind, record.id);
                    }
                }
                Change::Delete { kind, id } => {
                    let sql = format!("DELETE FROM {} WHERE \"id\" = $1", quote(definition(kind).table));
                    sqlx::query(&sql)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .map_err(|err| {
                            classify(err, Subject::Delete(kind, id), format!("Failed to delete {} {}", kind, id))
                        })?;
                }
                Change::RetireCode(code) => {
                    sqlx::query(
                        r#"
                        INSERT INTO "retired_codes" ("entity", "field", "value", "retired_at")
                        VALUES ($1, $2, $3, $4)
                        ON CONFLICT DO NOTHING
                        "#,
                    )
                    .bind(code.kind.as_str())
                    .bind(code.field)
                    .bind(&code.value)
                    .bind(code.retired_at)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to retire code")?;
                }
            }
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(())
    }
}

impl Store for PostgresStore {}
