use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{QmsError, QmsResult};
use crate::logic::query::{parse_list_query, QueryLimits};
use crate::model::risk::{MAX_LEVEL, MIN_LEVEL};
use crate::model::{definition, severity, EntityKind, FieldType, Id, Record, Severity};
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub value: Value,
    pub count: u64,
}

/// Row counts of one entity per value of one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCounts {
    pub entity: EntityKind,
    pub field: &'static str,
    pub total: u64,
    pub groups: Vec<GroupCount>,
}

/// Counts rows of `kind` per value of `field`, an enumeration (lifecycle
/// states included) or a boolean. Every declared value is listed, zero
/// counts included, followed by any other stored value and null. `params`
/// takes the entity's list filters.
pub async fn field_counts<S: RecordStore + ?Sized>(
    store: &S,
    kind: EntityKind,
    field: &str,
    params: &HashMap<String, String>,
    limits: QueryLimits,
) -> QmsResult<FieldCounts> {
    let def = definition(kind);
    let field_def = def
        .field_def(field)
        .ok_or_else(|| QmsError::invalid(field, format!("is not a field of {}", kind)))?;
    let declared: Vec<Value> = match &field_def.ty {
        FieldType::Enumeration { members } => members
            .iter()
            .map(|member| Value::String(member.to_string()))
            .collect(),
        FieldType::Boolean => vec![Value::Bool(true), Value::Bool(false)],
        _ => {
            return Err(QmsError::invalid(
                field,
                "only enumeration and boolean fields can be counted",
            ))
        }
    };

    let query = parse_list_query(def, params, limits).map_err(QmsError::Validation)?;
    let counted = store.count_grouped(kind, &[field_def.name], &query).await?;
    let mut counted: Vec<(Value, u64)> = counted
        .into_iter()
        .map(|(mut key, count)| (key.pop().unwrap_or(Value::Null), count))
        .collect();
    let total: u64 = counted.iter().map(|(_, count)| count).sum();

    let mut groups = Vec::with_capacity(declared.len() + 1);
    for value in declared {
        let count = match counted.iter().position(|(key, _)| *key == value) {
            Some(index) => counted.remove(index).1,
            None => 0,
        };
        groups.push(GroupCount { value, count });
    }
    // nulls sort last, so leftovers keep that order
    groups.extend(
        counted
            .into_iter()
            .map(|(value, count)| GroupCount { value, count }),
    );

    Ok(FieldCounts {
        entity: kind,
        field: field_def.name,
        total,
        groups,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub probability: i64,
    pub impact: i64,
    pub severity: Severity,
    pub count: u64,
}

/// Risks per probability/impact pair, one cell for every pair of the
/// severity matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskHeatmap {
    pub total: u64,
    pub cells: Vec<HeatmapCell>,
}

pub async fn risk_heatmap<S: RecordStore + ?Sized>(
    store: &S,
    params: &HashMap<String, String>,
    limits: QueryLimits,
) -> QmsResult<RiskHeatmap> {
    let query = parse_list_query(definition(EntityKind::Risk), params, limits)
        .map_err(QmsError::Validation)?;
    let counted = store
        .count_grouped(EntityKind::Risk, &["probability", "impact"], &query)
        .await?;
    let count_of = |probability: i64, impact: i64| {
        counted
            .iter()
            .filter(|(key, _)| {
                key.first().and_then(Value::as_i64) == Some(probability)
                    && key.get(1).and_then(Value::as_i64) == Some(impact)
            })
            .map(|(_, count)| count)
            .sum::<u64>()
    };

    let mut cells = Vec::new();
    for probability in MIN_LEVEL..=MAX_LEVEL {
        for impact in MIN_LEVEL..=MAX_LEVEL {
            let Some(severity) = severity(probability, impact) else {
                continue;
            };
            cells.push(HeatmapCell {
                probability,
                impact,
                severity,
                count: count_of(probability, impact),
            });
        }
    }

    Ok(RiskHeatmap {
        total: cells.iter().map(|cell| cell.count).sum(),
        cells,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Rising,
    Falling,
    Stable,
    NoData,
}

/// Summary of an indicator's measurement history, in period order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorTrend {
    pub indicator_id: Id,
    pub measurements: u64,
    /// Mean of all values, rounded to two decimals.
    pub average: Option<f64>,
    pub last_value: Option<f64>,
    pub last_period: Option<String>,
    /// Last value against the one before it.
    pub direction: Direction,
}

pub async fn indicator_trend<S: RecordStore + ?Sized>(
    store: &S,
    indicator_id: Id,
) -> QmsResult<IndicatorTrend> {
    if store
        .get_record(EntityKind::Indicator, &indicator_id)
        .await?
        .is_none()
    {
        return Err(QmsError::NotFound {
            entity: EntityKind::Indicator,
            id: indicator_id,
        });
    }

    let mut history = store
        .find_referencing(EntityKind::IndicatorMeasurement, "indicator_id", &indicator_id)
        .await?;
    history.sort_by(|a, b| a.get_str("period").cmp(&b.get_str("period")));
    Ok(summarize(indicator_id, &history))
}

fn summarize(indicator_id: Id, history: &[Record]) -> IndicatorTrend {
    let values: Vec<f64> = history
        .iter()
        .filter_map(|measurement| measurement.get("value").and_then(Value::as_f64))
        .collect();

    let average = if values.is_empty() {
        None
    } else {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Some((mean * 100.0).round() / 100.0)
    };
    let direction = match values.as_slice() {
        [] => Direction::NoData,
        [.., previous, last] if last > previous => Direction::Rising,
        [.., previous, last] if last < previous => Direction::Falling,
        _ => Direction::Stable,
    };

    IndicatorTrend {
        indicator_id,
        measurements: history.len() as u64,
        average,
        last_value: values.last().copied(),
        last_period: history
            .last()
            .and_then(|measurement| measurement.get_str("period"))
            .map(str::to_string),
        direction,
    }
}
