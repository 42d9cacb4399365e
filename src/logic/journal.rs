use serde_json::{json, Map, Value};

use crate::model::{definition, generate_id, Actor, EntityKind, Record, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

fn entry(action: Action, record: &Record, actor: &Actor, changes: Value, now: Timestamp) -> Record {
    let mut fields = Map::new();
    fields.insert("entity".to_string(), Value::String(record.kind.as_str().to_string()));
    fields.insert("record_id".to_string(), Value::String(record.id.to_string()));
    fields.insert("action".to_string(), Value::String(action.as_str().to_string()));
    fields.insert("actor".to_string(), actor_value(actor));
    fields.insert("changes".to_string(), changes);
    Record::new(EntityKind::ChangeLog, generate_id(), fields, now)
}

fn actor_value(actor: &Actor) -> Value {
    actor.user.clone().map(Value::String).unwrap_or(Value::Null)
}

pub fn created(record: &Record, actor: &Actor, now: Timestamp) -> Record {
    entry(Action::Create, record, actor, Value::Object(record.fields.clone()), now)
}

/// `changes` maps every modified field to `{"from": .., "to": ..}`.
pub fn updated(before: &Record, after: &Record, actor: &Actor, now: Timestamp) -> Record {
    entry(Action::Update, after, actor, Value::Object(diff(before, after)), now)
}

pub fn deleted(record: &Record, actor: &Actor, now: Timestamp) -> Record {
    entry(Action::Delete, record, actor, record.to_json(), now)
}

pub fn diff(before: &Record, after: &Record) -> Map<String, Value> {
    after
        .fields
        .iter()
        .filter_map(|(name, to)| {
            let from = before.fields.get(name).unwrap_or(&Value::Null);
            (from != to).then(|| (name.clone(), json!({ "from": from, "to": to })))
        })
        .collect()
}

/// State history row when the lifecycle field of `after` differs from
/// `before`.
pub fn state_change(before: &Record, after: &Record, actor: &Actor, now: Timestamp) -> Option<Record> {
    let lifecycle = definition(after.kind).lifecycle.as_ref()?;
    let previous = before.get_str(lifecycle.field);
    let current = after.get_str(lifecycle.field)?;
    if previous == Some(current) {
        return None;
    }

    let mut fields = Map::new();
    fields.insert("entity".to_string(), Value::String(after.kind.as_str().to_string()));
    fields.insert("record_id".to_string(), Value::String(after.id.to_string()));
    fields.insert("field".to_string(), Value::String(lifecycle.field.to_string()));
    fields.insert(
        "previous_state".to_string(),
        previous.map(|state| Value::String(state.to_string())).unwrap_or(Value::Null),
    );
    fields.insert("new_state".to_string(), Value::String(current.to_string()));
    fields.insert("changed_by".to_string(), actor_value(actor));
    fields.insert("comment".to_string(), Value::Null);
    Some(Record::new(EntityKind::StateHistory, generate_id(), fields, now))
}
