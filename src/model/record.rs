use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::model::{format_timestamp, parse_timestamp, EntityKind, Id, Timestamp};

/// One row of any catalog entity. `fields` holds every declared field of the
/// entity, with `Value::Null` standing for SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: EntityKind,
    pub id: Id,
    pub fields: Map<String, Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Record {
    pub fn new(kind: EntityKind, id: Id, fields: Map<String, Value>, now: Timestamp) -> Self {
        Self {
            kind,
            id,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Field value, treating null as absent.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|value| !value.is_null())
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn get_id(&self, field: &str) -> Option<Id> {
        self.get_str(field).and_then(|raw| Id::parse_str(raw).ok())
    }

    /// Comma-separated values of `fields`, for conflict messages.
    pub fn describe_values(&self, fields: &[&str]) -> String {
        fields
            .iter()
            .map(|name| match *name {
                "id" => self.id.to_string(),
                name => self
                    .fields
                    .get(name)
                    .map(display_value)
                    .unwrap_or_default(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Flat JSON object with the system columns included; the shape used both
    /// on the wire and in the PostgreSQL row mapping.
    pub fn to_json(&self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 3);
        object.insert("id".to_string(), Value::String(self.id.to_string()));
        for (name, value) in &self.fields {
            object.insert(name.clone(), value.clone());
        }
        object.insert(
            "created_at".to_string(),
            Value::String(format_timestamp(&self.created_at)),
        );
        object.insert(
            "updated_at".to_string(),
            Value::String(format_timestamp(&self.updated_at)),
        );
        Value::Object(object)
    }

    /// Inverse of [`Record::to_json`]. Keys not listed in `field_names` are
    /// dropped; listed keys that are missing become null.
    pub fn from_json(kind: EntityKind, field_names: &[&str], value: Value) -> Option<Self> {
        let Value::Object(mut object) = value else {
            return None;
        };
        let id = object
            .remove("id")
            .and_then(|v| v.as_str().and_then(|raw| Id::parse_str(raw).ok()))?;
        let created_at = object
            .remove("created_at")
            .and_then(|v| v.as_str().and_then(parse_timestamp))?;
        let updated_at = object
            .remove("updated_at")
            .and_then(|v| v.as_str().and_then(parse_timestamp))?;

        let mut fields = Map::with_capacity(field_names.len());
        for name in field_names {
            let value = object.remove(*name).unwrap_or(Value::Null);
            fields.insert((*name).to_string(), value);
        }

        Some(Self {
            kind,
            id,
            fields,
            created_at,
            updated_at,
        })
    }
}

/// Text as-is, anything else in its JSON form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 3))?;
        map.serialize_entry("id", &self.id)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("created_at", &format_timestamp(&self.created_at))?;
        map.serialize_entry("updated_at", &format_timestamp(&self.updated_at))?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> Record {
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let mut fields = Map::new();
        fields.insert("code".to_string(), json!("QUA"));
        fields.insert("parent_id".to_string(), Value::Null);
        Record::new(EntityKind::Area, crate::model::generate_id(), fields, now)
    }

    #[test]
    fn test_null_reads_as_absent() {
        let record = sample();
        assert_eq!(record.get_str("code"), Some("QUA"));
        assert!(record.get("parent_id").is_none());
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let record = sample();
        let json = record.to_json();
        assert_eq!(json["created_at"], "2024-05-06T07:08:09.000000Z");
        let back = Record::from_json(EntityKind::Area, &["code", "parent_id"], json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_serialize_matches_to_json() {
        let record = sample();
        assert_eq!(serde_json::to_value(&record).unwrap(), record.to_json());
    }
}
