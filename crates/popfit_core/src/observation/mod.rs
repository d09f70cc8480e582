//! Observed trait measurements.
//!
//! One row per measured animal. Filters return new tables; nothing is
//! modified in place.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::cost::mmd::complete_rows;
use crate::nullable;
use crate::trajectory::Month;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    #[serde(with = "nullable")]
    pub lipids: f64,
    #[serde(with = "nullable")]
    pub fullness: f64,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub month: Option<Month>,
    /// Annotation text (species and stage)
    #[serde(default)]
    pub category: Option<String>,
}

impl ObservationRow {
    pub fn new(lipids: f64, fullness: f64) -> Self {
        Self {
            lipids,
            fullness,
            species: None,
            month: None,
            category: None,
        }
    }

    pub fn with_month(mut self, month: Option<Month>) -> Self {
        self.month = month;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    rows: Vec<ObservationRow>,
}

impl ObservationTable {
    pub fn new(rows: Vec<ObservationRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ObservationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn filter(&self, keep: impl Fn(&ObservationRow) -> bool) -> Self {
        Self {
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Rows of one species. The species column is matched exactly (ignoring
    /// case); rows without it fall back to a substring match on the category.
    pub fn for_species(&self, species: &str) -> Self {
        self.filter(|r| match (&r.species, &r.category) {
            (Some(s), _) => s.eq_ignore_ascii_case(species.trim()),
            (None, Some(c)) => contains_ignore_case(c, species.trim()),
            (None, None) => false,
        })
    }

    pub fn for_month(&self, month: Month) -> Self {
        self.filter(|r| r.month == Some(month))
    }

    /// Rows whose category contains `code`, ignoring case.
    pub fn for_stage_code(&self, code: &str) -> Self {
        self.filter(|r| r.category.as_deref().is_some_and(|c| contains_ignore_case(c, code)))
    }

    /// Drops rows whose category contains any of `codes`.
    pub fn without_categories(&self, codes: &[String]) -> Self {
        if codes.is_empty() {
            return self.clone();
        }
        self.filter(|r| {
            !r.category
                .as_deref()
                .is_some_and(|c| codes.iter().any(|code| contains_ignore_case(c, code)))
        })
    }

    pub fn lipids(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.lipids).collect()
    }

    pub fn fullness(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.fullness).collect()
    }

    /// (lipids, fullness) matrix of the rows where both are present.
    pub fn joint(&self) -> DMatrix<f64> {
        let pairs: Vec<[f64; 2]> = self.rows.iter().map(|r| [r.lipids, r.fullness]).collect();
        complete_rows(&pairs).0
    }
}

impl FromIterator<ObservationRow> for ObservationTable {
    fn from_iter<I: IntoIterator<Item = ObservationRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
