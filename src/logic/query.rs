use std::collections::HashMap;

use crate::error::FieldError;
use crate::logic::validate::coerce_filter;
use crate::model::{EntityDef, ListQuery, Pagination};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 500,
        }
    }
}

const OFFSET_KEYS: [&str; 2] = ["offset", "skip"];
const LIMIT_KEY: &str = "limit";
/// Offsets are bound as signed 64-bit integers.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Turns raw query-string parameters into a [`ListQuery`]. Every parameter
/// that is neither a pagination key nor a declared filter is an error.
pub fn parse_list_query(
    def: &EntityDef,
    params: &HashMap<String, String>,
    limits: QueryLimits,
) -> Result<ListQuery, Vec<FieldError>> {
    let mut errors = Vec::new();

    let given: Vec<(&str, &String)> = OFFSET_KEYS
        .iter()
        .filter_map(|key| params.get(*key).map(|raw| (*key, raw)))
        .collect();
    let offset = match given.as_slice() {
        [] => 0,
        [(key, raw)] => match raw.trim().parse::<u64>() {
            Ok(offset) if offset <= MAX_OFFSET => offset,
            Ok(_) => {
                errors.push(FieldError::new(*key, format!("must not exceed {}", MAX_OFFSET)));
                0
            }
            Err(_) => {
                errors.push(FieldError::new(*key, "must be a non-negative integer"));
                0
            }
        },
        _ => {
            errors.push(FieldError::new("skip", "cannot be combined with offset"));
            0
        }
    };

    let limit = match params.get(LIMIT_KEY) {
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) => {
                errors.push(FieldError::new(LIMIT_KEY, "must be at least 1"));
                limits.default_limit
            }
            Ok(limit) => limit.min(limits.max_limit),
            Err(_) => {
                errors.push(FieldError::new(LIMIT_KEY, "must be a positive integer"));
                limits.default_limit
            }
        },
        None => limits.default_limit,
    };

    let mut query = ListQuery::new(Pagination { offset, limit });

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    for key in keys {
        if OFFSET_KEYS.contains(&key.as_str()) || key == LIMIT_KEY {
            continue;
        }
        let Some(name) = def.filters.iter().copied().find(|name| *name == key.as_str()) else {
            errors.push(FieldError::new(
                key.as_str(),
                format!("is not a filter of {}", def.kind),
            ));
            continue;
        };
        let Some(field) = def.field_def(name) else {
            continue;
        };
        match coerce_filter(field, &params[key]) {
            Ok(value) => query = query.with_filter(name, value),
            Err(message) => errors.push(FieldError::new(name, message)),
        }
    }

    if errors.is_empty() {
        Ok(query)
    } else {
        Err(errors)
    }
}
