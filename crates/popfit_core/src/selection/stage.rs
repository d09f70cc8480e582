//! Stage Classifier - Developmental State → Ordinal Stage
//!
//! Stages follow the copepod life cycle: egg, six naupliar stages (N1-N6),
//! five copepodite stages (C1-C5) and the adult (C6). C4 and later are the
//! "late juvenile" stages compared against field images.

use ndarray::{Array, ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CostError, Result};

/// Ordinal stage label. 0 means "not present" (NaN or pre-spawning state).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stage(pub u8);

impl Stage {
    pub const ABSENT: Stage = Stage(0);
    pub const EGG: Stage = Stage(1);
    pub const C4: Stage = Stage(11);
    pub const C5: Stage = Stage(12);
    pub const C6: Stage = Stage(13);

    /// C4, C5 and C6: the stages matched against observations.
    pub const LATE: [Stage; 3] = [Stage::C4, Stage::C5, Stage::C6];

    pub fn label(self) -> String {
        match self.0 {
            0 => "absent".to_string(),
            1 => "egg".to_string(),
            n @ 2..=7 => format!("N{}", n - 1),
            n => format!("C{}", n - 7),
        }
    }

    pub fn from_label(label: &str) -> Option<Stage> {
        let upper = label.trim().to_ascii_uppercase();
        match upper.as_str() {
            "EGG" => return Some(Stage::EGG),
            "ADULT" => return Some(Stage::C6),
            _ => {}
        }
        let mut chars = upper.chars();
        let prefix = chars.next()?;
        let n: u8 = chars.as_str().parse().ok()?;
        match prefix {
            'N' if (1..=6).contains(&n) => Some(Stage(n + 1)),
            'C' if (1..=6).contains(&n) => Some(Stage(n + 7)),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Lower bounds of each stage on the developmental scale.
///
/// Bound `k` (0-based) opens stage `k + 1`; a value maps to the number of
/// bounds it has passed. Bounds are strictly increasing, so classification
/// is monotonic in the developmental state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct StageTable {
    lower_bounds: Vec<f64>,
}

impl StageTable {
    pub fn new(lower_bounds: Vec<f64>) -> Result<Self> {
        if lower_bounds.is_empty() {
            return Err(CostError::InvalidConfig(
                "stage table needs at least one bound".to_string(),
            ));
        }
        if lower_bounds.len() >= u8::MAX as usize {
            return Err(CostError::InvalidConfig(format!(
                "stage table has {} bounds, at most {} allowed",
                lower_bounds.len(),
                u8::MAX - 1
            )));
        }
        if lower_bounds.iter().any(|b| !b.is_finite()) {
            return Err(CostError::InvalidConfig(
                "stage bounds must be finite".to_string(),
            ));
        }
        if lower_bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CostError::InvalidConfig(
                "stage bounds must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { lower_bounds })
    }

    /// Equal-duration stages on D ∈ [0, 1]: egg, N1-N6 and C1-C5 share the
    /// unit interval, the adult stage starts at D = 1.
    pub fn coltrane() -> Self {
        let mut lower_bounds: Vec<f64> = (0..12).map(|k| k as f64 / 12.0).collect();
        lower_bounds.push(1.0);
        Self { lower_bounds }
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower_bounds
    }

    /// Highest stage this table can produce.
    pub fn max_stage(&self) -> Stage {
        Stage(self.lower_bounds.len() as u8)
    }

    pub fn classify(&self, development: f64) -> Stage {
        if development.is_nan() {
            return Stage::ABSENT;
        }
        let passed = self.lower_bounds.partition_point(|&bound| bound <= development);
        Stage(passed as u8)
    }

    /// Element-wise classification of any-dimensional arrays.
    pub fn classify_array<S, D>(&self, development: &ArrayBase<S, D>) -> Array<Stage, D>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        development.map(|&d| self.classify(d))
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self::coltrane()
    }
}

impl TryFrom<Vec<f64>> for StageTable {
    type Error = CostError;

    fn try_from(value: Vec<f64>) -> std::result::Result<Self, Self::Error> {
        StageTable::new(value)
    }
}

impl From<StageTable> for Vec<f64> {
    fn from(table: StageTable) -> Self {
        table.lower_bounds
    }
}
