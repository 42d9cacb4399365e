use serde::Serialize;
use thiserror::Error;

use crate::model::{EntityKind, Id};

/// One offending field of a rejected write or list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum QmsError {
    #[error("validation failed: {}", describe(.0))]
    Validation(Vec<FieldError>),

    #[error("{entity} with {} = {value} already exists{}", .fields.join(", "), retired_suffix(.retired))]
    UniquenessConflict {
        entity: EntityKind,
        fields: Vec<String>,
        value: String,
        retired: bool,
    },

    #[error("{field} references missing {target} {id}")]
    Reference {
        field: String,
        target: EntityKind,
        id: Id,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: Id },

    #[error("{entity} {id} is still referenced by {count} {dependent} row(s) through {field}")]
    DependencyConflict {
        entity: EntityKind,
        id: Id,
        dependent: EntityKind,
        field: String,
        count: usize,
    },

    #[error("{0} is maintained by the system and cannot be written")]
    ReadOnly(EntityKind),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl QmsError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        QmsError::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable identifier, carried in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            QmsError::Validation(_) => "validation_error",
            QmsError::UniquenessConflict { .. } => "uniqueness_conflict",
            QmsError::Reference { .. } => "reference_error",
            QmsError::NotFound { .. } => "not_found",
            QmsError::DependencyConflict { .. } => "dependency_conflict",
            QmsError::ReadOnly(_) => "read_only",
            QmsError::Storage(_) => "storage_error",
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            QmsError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect::<Vec<_>>()
        .join("; ")
}

fn retired_suffix(retired: &bool) -> &'static str {
    if *retired {
        " (retired)"
    } else {
        ""
    }
}

pub type QmsResult<T> = Result<T, QmsError>;
