use serde::Serialize;
use serde_json::Value;

use crate::model::{format_timestamp, EntityKind, Timestamp};

/// What happens to a referencing row when the row it points at is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    /// The referencing row is owned by the target and is deleted with it.
    Cascade,
    /// The reference is cleared on the referencing row.
    SetNull,
    /// The delete is rejected while referencing rows exist.
    Restrict,
}

impl OnDelete {
    pub fn sql(&self) -> &'static str {
        match self {
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Restrict => "RESTRICT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldType {
    Text {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_len: Option<usize>,
    },
    Email {
        max_len: usize,
    },
    Integer {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Decimal {
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Boolean,
    Timestamp,
    Date,
    Enumeration {
        members: &'static [&'static str],
    },
    Reference {
        target: EntityKind,
        on_delete: OnDelete,
    },
    /// An identifier that is stored but not checked against any table.
    Uuid,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefault {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Text(&'static str),
    Now,
}

impl FieldDefault {
    pub fn to_value(&self, now: &Timestamp) -> Value {
        match self {
            FieldDefault::Bool(value) => Value::Bool(*value),
            FieldDefault::Int(value) => Value::from(*value),
            FieldDefault::Decimal(value) => Value::from(*value),
            FieldDefault::Text(value) => Value::String((*value).to_string()),
            FieldDefault::Now => Value::String(format_timestamp(now)),
        }
    }
}

/// Who may write a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccess {
    Writable,
    /// Set on create, frozen afterwards.
    CreateOnly,
    /// Computed from other fields on every write.
    Derived,
    /// Assigned by the service when the row is created.
    Generated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<FieldDefault>,
    pub access: FieldAccess,
}

impl FieldDef {
    fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            required: false,
            default: None,
            access: FieldAccess::Writable,
        }
    }

    pub fn text(name: &'static str, max_len: usize) -> Self {
        Self::new(name, FieldType::Text { max_len: Some(max_len) })
    }

    pub fn long_text(name: &'static str) -> Self {
        Self::new(name, FieldType::Text { max_len: None })
    }

    pub fn email(name: &'static str, max_len: usize) -> Self {
        Self::new(name, FieldType::Email { max_len })
    }

    pub fn integer(name: &'static str) -> Self {
        Self::new(name, FieldType::Integer { min: None, max: None })
    }

    /// An integer restricted to `min..=max`.
    pub fn ordinal(name: &'static str, min: i64, max: i64) -> Self {
        Self::new(
            name,
            FieldType::Integer {
                min: Some(min),
                max: Some(max),
            },
        )
    }

    pub fn decimal(name: &'static str) -> Self {
        Self::new(name, FieldType::Decimal { min: None, max: None })
    }

    pub fn bounded_decimal(name: &'static str, min: f64, max: f64) -> Self {
        Self::new(
            name,
            FieldType::Decimal {
                min: Some(min),
                max: Some(max),
            },
        )
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    pub fn timestamp(name: &'static str) -> Self {
        Self::new(name, FieldType::Timestamp)
    }

    pub fn date(name: &'static str) -> Self {
        Self::new(name, FieldType::Date)
    }

    pub fn enumeration(name: &'static str, members: &'static [&'static str]) -> Self {
        Self::new(name, FieldType::Enumeration { members })
    }

    pub fn reference(name: &'static str, target: EntityKind, on_delete: OnDelete) -> Self {
        Self::new(name, FieldType::Reference { target, on_delete })
    }

    pub fn uuid(name: &'static str) -> Self {
        Self::new(name, FieldType::Uuid)
    }

    pub fn json(name: &'static str) -> Self {
        Self::new(name, FieldType::Json)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// A defaulted field is never null.
    pub fn default_to(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self.required = true;
        self
    }

    pub fn default_bool(self, value: bool) -> Self {
        self.default_to(FieldDefault::Bool(value))
    }

    pub fn default_int(self, value: i64) -> Self {
        self.default_to(FieldDefault::Int(value))
    }

    pub fn default_text(self, value: &'static str) -> Self {
        self.default_to(FieldDefault::Text(value))
    }

    pub fn default_now(self) -> Self {
        self.default_to(FieldDefault::Now)
    }

    pub fn create_only(mut self) -> Self {
        self.access = FieldAccess::CreateOnly;
        self
    }

    pub fn derived(mut self) -> Self {
        self.access = FieldAccess::Derived;
        self
    }

    pub fn generated(mut self) -> Self {
        self.access = FieldAccess::Generated;
        self
    }

    pub fn reference_target(&self) -> Option<(EntityKind, OnDelete)> {
        match self.ty {
            FieldType::Reference { target, on_delete } => Some((target, on_delete)),
            _ => None,
        }
    }

    pub fn is_client_writable(&self) -> bool {
        matches!(self.access, FieldAccess::Writable | FieldAccess::CreateOnly)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self.ty, FieldType::Text { .. } | FieldType::Email { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_default_implies_required() {
        let field = FieldDef::boolean("active").default_bool(true);
        assert!(field.required);
        assert_eq!(field.default, Some(FieldDefault::Bool(true)));
    }

    #[test]
    fn test_now_default_uses_supplied_instant() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            FieldDefault::Now.to_value(&now),
            Value::String("2025-01-02T03:04:05.000000Z".to_string())
        );
    }

    #[test]
    fn test_reference_target() {
        let field = FieldDef::reference("area_id", EntityKind::Area, OnDelete::Restrict);
        assert_eq!(
            field.reference_target(),
            Some((EntityKind::Area, OnDelete::Restrict))
        );
        assert_eq!(FieldDef::long_text("notes").reference_target(), None);
    }
}
