use serde::{Deserialize, Serialize};

pub const MIN_LEVEL: i64 = 1;
pub const MAX_LEVEL: i64 = 5;

pub const PROBABILITY_LEVELS: [&str; 5] = ["rare", "unlikely", "possible", "likely", "almost_certain"];
pub const IMPACT_LEVELS: [&str; 5] = ["insignificant", "minor", "moderate", "major", "catastrophic"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const NAMES: &'static [&'static str] = &["low", "medium", "high", "critical"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

use Severity::{Critical as C, High as H, Low as L, Medium as M};

/// Rows are probability 1..=5, columns are impact 1..=5.
const MATRIX: [[Severity; 5]; 5] = [
    [L, L, L, L, L],
    [L, L, M, M, M],
    [L, M, M, H, H],
    [L, M, H, H, C],
    [L, M, H, C, C],
];

/// Looks up the severity for a probability/impact pair; `None` when either
/// ordinal is outside `1..=5`.
pub fn severity(probability: i64, impact: i64) -> Option<Severity> {
    let row = ordinal_index(probability)?;
    let column = ordinal_index(impact)?;
    Some(MATRIX[row][column])
}

fn ordinal_index(level: i64) -> Option<usize> {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        Some((level - MIN_LEVEL) as usize)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeverityMatrix {
    pub probability_levels: Vec<&'static str>,
    pub impact_levels: Vec<&'static str>,
    /// `cells[p - 1][i - 1]`
    pub cells: Vec<Vec<Severity>>,
}

pub fn severity_matrix() -> SeverityMatrix {
    SeverityMatrix {
        probability_levels: PROBABILITY_LEVELS.to_vec(),
        impact_levels: IMPACT_LEVELS.to_vec(),
        cells: MATRIX.iter().map(|row| row.to_vec()).collect(),
    }
}
