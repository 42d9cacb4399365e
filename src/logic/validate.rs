use chrono::NaiveDate;
use serde_json::{Map, Number, Value};

use crate::error::FieldError;
use crate::model::{
    format_timestamp, parse_timestamp, EntityDef, FieldAccess, FieldDef, FieldType, Id, Record,
    Timestamp,
};

/// Columns every entity carries that clients never write.
pub const SYSTEM_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Checks a create payload and returns the complete field map: supplied
/// values coerced, missing fields defaulted, derived and generated fields
/// left null for the rules to fill.
pub fn validate_create(
    def: &EntityDef,
    input: Map<String, Value>,
    now: &Timestamp,
) -> Result<Map<String, Value>, Vec<FieldError>> {
    let mut errors = reject_foreign_keys(def, &input);
    let mut fields = Map::with_capacity(def.fields.len());

    for field in &def.fields {
        let supplied = if field.is_client_writable() {
            input.get(field.name)
        } else {
            None
        };

        let value = match supplied {
            Some(raw) => match check_value(field, raw) {
                Ok(value) => value,
                Err(message) => {
                    errors.push(FieldError::new(field.name, message));
                    continue;
                }
            },
            None => match &field.default {
                Some(default) => default.to_value(now),
                None if field.required && field.is_client_writable() => {
                    errors.push(FieldError::new(field.name, "is required"));
                    continue;
                }
                None => Value::Null,
            },
        };
        fields.insert(field.name.to_string(), value);
    }

    if errors.is_empty() {
        Ok(fields)
    } else {
        Err(errors)
    }
}

/// Checks a partial update and returns only the fields whose value actually
/// changes.
pub fn validate_update(
    def: &EntityDef,
    existing: &Record,
    patch: Map<String, Value>,
) -> Result<Map<String, Value>, Vec<FieldError>> {
    let mut errors = reject_foreign_keys(def, &patch);
    let mut changes = Map::new();

    for field in &def.fields {
        let Some(raw) = patch.get(field.name) else {
            continue;
        };
        if !field.is_client_writable() {
            continue;
        }
        let value = match check_value(field, raw) {
            Ok(value) => value,
            Err(message) => {
                errors.push(FieldError::new(field.name, message));
                continue;
            }
        };
        let current = existing.fields.get(field.name).unwrap_or(&Value::Null);
        if &value == current {
            continue;
        }
        if field.access == FieldAccess::CreateOnly {
            errors.push(FieldError::new(
                field.name,
                "cannot be changed after creation",
            ));
            continue;
        }
        changes.insert(field.name.to_string(), value);
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(errors)
    }
}

/// Errors for keys that are not client-writable fields of `def`.
fn reject_foreign_keys(def: &EntityDef, input: &Map<String, Value>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    for key in input.keys() {
        if SYSTEM_FIELDS.contains(&key.as_str()) {
            errors.push(FieldError::new(key, "is managed by the system"));
            continue;
        }
        match def.field_def(key) {
            None => errors.push(FieldError::new(
                key,
                format!("is not a field of {}", def.kind),
            )),
            Some(field) if !field.is_client_writable() => errors.push(FieldError::new(
                key,
                "is computed by the system and cannot be set",
            )),
            Some(_) => {}
        }
    }
    errors
}

/// Coerces one supplied value, including the null and blank rules for
/// required fields.
fn check_value(field: &FieldDef, raw: &Value) -> Result<Value, String> {
    if raw.is_null() {
        return if field.required {
            Err("is required".to_string())
        } else {
            Ok(Value::Null)
        };
    }
    let value = coerce_value(field, raw)?;
    if field.required && field.is_textual() {
        if let Some(text) = value.as_str() {
            if text.trim().is_empty() {
                return Err("must not be blank".to_string());
            }
        }
    }
    Ok(value)
}

/// Converts a non-null JSON value into the canonical form for the field's
/// type.
pub fn coerce_value(field: &FieldDef, raw: &Value) -> Result<Value, String> {
    match &field.ty {
        FieldType::Text { max_len } => {
            let text = raw.as_str().ok_or("must be a string")?;
            check_length(text, *max_len)?;
            Ok(Value::String(text.to_string()))
        }
        FieldType::Email { max_len } => {
            let text = raw.as_str().ok_or("must be a string")?.trim();
            check_length(text, Some(*max_len))?;
            if !is_email(text) {
                return Err("must be a valid email address".to_string());
            }
            Ok(Value::String(text.to_string()))
        }
        FieldType::Integer { min, max } => {
            let number = raw.as_i64().ok_or("must be an integer")?;
            check_range(number, *min, *max)?;
            Ok(Value::from(number))
        }
        FieldType::Decimal { min, max } => {
            let number = raw
                .as_f64()
                .filter(|n| n.is_finite())
                .ok_or("must be a number")?;
            check_range(number, *min, *max)?;
            Ok(decimal_value(number))
        }
        FieldType::Boolean => raw
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "must be a boolean".to_string()),
        FieldType::Timestamp => raw
            .as_str()
            .and_then(parse_timestamp)
            .map(|ts| Value::String(format_timestamp(&ts)))
            .ok_or_else(|| "must be an RFC 3339 timestamp".to_string()),
        FieldType::Date => raw
            .as_str()
            .and_then(|text| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| "must be a date (YYYY-MM-DD)".to_string()),
        FieldType::Enumeration { members } => {
            let text = raw.as_str().ok_or("must be a string")?;
            if members.contains(&text) {
                Ok(Value::String(text.to_string()))
            } else {
                Err(format!("must be one of: {}", members.join(", ")))
            }
        }
        FieldType::Reference { .. } | FieldType::Uuid => raw
            .as_str()
            .and_then(|text| Id::parse_str(text).ok())
            .map(|id| Value::String(id.to_string()))
            .ok_or_else(|| "must be a UUID".to_string()),
        FieldType::Json => Ok(raw.clone()),
    }
}

/// Coerces a query-string filter value into the field's canonical form.
pub fn coerce_filter(field: &FieldDef, raw: &str) -> Result<Value, String> {
    let value = match &field.ty {
        FieldType::Integer { .. } => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| "must be an integer".to_string())?,
        FieldType::Decimal { .. } => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "must be a number".to_string())?,
        FieldType::Boolean => match raw.trim() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err("must be true or false".to_string()),
        },
        FieldType::Json => return Err("cannot be used as a filter".to_string()),
        _ => Value::String(raw.to_string()),
    };
    coerce_value(field, &value)
}

/// Best-effort canonicalisation of a value read back from storage.
pub fn normalize(field: &FieldDef, raw: Value) -> Value {
    if raw.is_null() {
        return raw;
    }
    coerce_value(field, &raw).unwrap_or(raw)
}

/// Integral decimals are stored as integers so that `5` and `5.0` compare
/// equal after a round trip through storage.
fn decimal_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 9.0e15 {
        Value::from(number as i64)
    } else {
        Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn check_length(text: &str, max_len: Option<usize>) -> Result<(), String> {
    match max_len {
        Some(max) if text.chars().count() > max => {
            Err(format!("must be at most {} characters", max))
        }
        _ => Ok(()),
    }
}

fn check_range<T: PartialOrd + std::fmt::Display + Copy>(
    value: T,
    min: Option<T>,
    max: Option<T>,
) -> Result<(), String> {
    match (min, max) {
        (Some(min), Some(max)) if value < min || value > max => {
            Err(format!("must be between {} and {}", min, max))
        }
        (Some(min), None) if value < min => Err(format!("must be at least {}", min)),
        (None, Some(max)) if value > max => Err(format!("must be at most {}", max)),
        _ => Ok(()),
    }
}

fn is_email(text: &str) -> bool {
    let Some((local, domain)) = text.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !text.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .map(|(host, rest)| !host.is_empty() && !rest.is_empty() && !rest.ends_with('.'))
            .unwrap_or(false)
}
