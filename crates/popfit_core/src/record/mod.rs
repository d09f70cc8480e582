//! Cost Aggregator
//!
//! Named sub-costs and the totals derived from them. NaN marks an undefined
//! sub-cost and propagates into every sum that includes it; records write
//! it as `null`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::AggregationConfig;
use crate::nullable;
use crate::selection::Stage;
use crate::trajectory::Month;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitKind {
    /// Reserve mass
    Lipids,
    /// Reserve mass over body weight
    Fullness,
}

impl TraitKind {
    pub const ALL: [TraitKind; 2] = [TraitKind::Lipids, TraitKind::Fullness];

    pub fn name(self) -> &'static str {
        match self {
            TraitKind::Lipids => "lipids",
            TraitKind::Fullness => "fullness",
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw sub-costs of one pooled comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostComponents {
    #[serde(with = "nullable")]
    pub lipids: f64,
    #[serde(with = "nullable")]
    pub fullness: f64,
    #[serde(with = "nullable")]
    pub lipids_weighted: f64,
    #[serde(with = "nullable")]
    pub fullness_weighted: f64,
    #[serde(with = "nullable")]
    pub lipids_median: f64,
    #[serde(with = "nullable")]
    pub fullness_median: f64,
}

impl CostComponents {
    /// Every sub-cost undefined.
    pub fn undefined() -> Self {
        Self {
            lipids: f64::NAN,
            fullness: f64::NAN,
            lipids_weighted: f64::NAN,
            fullness_weighted: f64::NAN,
            lipids_median: f64::NAN,
            fullness_median: f64::NAN,
        }
    }
}

/// Sub-costs plus the derived totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PooledCosts {
    #[serde(flatten)]
    pub components: CostComponents,
    #[serde(with = "nullable")]
    pub total: f64,
    #[serde(with = "nullable")]
    pub total_fitness_weighted: f64,
    #[serde(with = "nullable")]
    pub total_unweighted: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostAggregator {
    median_downweight: f64,
}

impl Default for CostAggregator {
    fn default() -> Self {
        Self::new(&AggregationConfig::default())
    }
}

impl CostAggregator {
    pub fn new(config: &AggregationConfig) -> Self {
        Self {
            median_downweight: config.median_downweight,
        }
    }

    /// `lip + full + lip_w + full_w + (lip_med + full_med) / downweight`
    pub fn pooled(&self, c: CostComponents) -> PooledCosts {
        let total_unweighted = c.lipids + c.fullness;
        let total_fitness_weighted = c.lipids_weighted + c.fullness_weighted;
        let total = total_unweighted
            + total_fitness_weighted
            + c.lipids_median / self.median_downweight
            + c.fullness_median / self.median_downweight;
        PooledCosts {
            components: c,
            total,
            total_fitness_weighted,
            total_unweighted,
        }
    }

    /// Fitness-weighted lipid and fullness costs of one (month, stage) key,
    /// plus their total.
    pub fn staged(
        &self,
        costs: &mut StagedCosts,
        month: Option<Month>,
        stage: Stage,
        lipids_weighted: f64,
        fullness_weighted: f64,
    ) {
        costs.insert(CostKey::new(month, stage, CostComponent::LipidsWeighted), lipids_weighted);
        costs.insert(CostKey::new(month, stage, CostComponent::FullnessWeighted), fullness_weighted);
        costs.insert(
            CostKey::new(month, stage, CostComponent::StageTotal),
            lipids_weighted + fullness_weighted,
        );
    }
}

/// What a keyed cost measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostComponent {
    LipidsWeighted,
    FullnessWeighted,
    /// Sum of the weighted trait costs of one key
    StageTotal,
    /// Joint (lipids, fullness) distance
    Joint,
}

impl CostComponent {
    pub fn name(self) -> &'static str {
        match self {
            CostComponent::LipidsWeighted => "lipids_weighted",
            CostComponent::FullnessWeighted => "fullness_weighted",
            CostComponent::StageTotal => "total",
            CostComponent::Joint => "joint",
        }
    }
}

/// Composite key of a staged cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CostKey {
    pub month: Option<Month>,
    pub stage: Stage,
    pub component: CostComponent,
}

impl CostKey {
    pub fn new(month: Option<Month>, stage: Stage, component: CostComponent) -> Self {
        Self {
            month,
            stage,
            component,
        }
    }
}

impl fmt::Display for CostKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.month {
            Some(month) => write!(f, "{}_{}_{}", month, self.stage, self.component.name()),
            None => write!(f, "{}_{}", self.stage, self.component.name()),
        }
    }
}

/// Serialized form of one keyed cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    #[serde(flatten)]
    pub key: CostKey,
    pub cost: Option<f64>,
}

/// Costs under explicit (month, stage, component) keys. Nothing is summed
/// across keys unless asked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CostEntry>", into = "Vec<CostEntry>")]
pub struct StagedCosts {
    entries: BTreeMap<CostKey, f64>,
}

impl StagedCosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CostKey, cost: f64) {
        self.entries.insert(key, cost);
    }

    pub fn get(&self, key: &CostKey) -> Option<f64> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CostKey, &f64)> {
        self.entries.iter()
    }

    /// Sum of the costs whose key passes `filter`. NaN if any of them is
    /// NaN or none matches.
    pub fn sum_where(&self, filter: impl Fn(&CostKey) -> bool) -> f64 {
        let mut matched = self.entries.iter().filter(|(k, _)| filter(k)).peekable();
        if matched.peek().is_none() {
            return f64::NAN;
        }
        matched.map(|(_, v)| v).sum()
    }

    /// Sum of one component over every key.
    pub fn total_of(&self, component: CostComponent) -> f64 {
        self.sum_where(|k| k.component == component)
    }
}

impl From<Vec<CostEntry>> for StagedCosts {
    fn from(entries: Vec<CostEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| (e.key, e.cost.unwrap_or(f64::NAN)))
                .collect(),
        }
    }
}

impl From<StagedCosts> for Vec<CostEntry> {
    fn from(costs: StagedCosts) -> Self {
        costs
            .entries
            .into_iter()
            .map(|(key, cost)| CostEntry {
                key,
                cost: (!cost.is_nan()).then_some(cost),
            })
            .collect()
    }
}

/// Curves behind one trait cost, kept for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitDiagnostics {
    pub trait_kind: TraitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<Month>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Whether the simulated sample was fitness-weighted
    pub weighted: bool,
    pub bin_edges: Vec<f64>,
    #[serde(with = "nullable::seq")]
    pub observed_density: Vec<f64>,
    #[serde(with = "nullable::seq")]
    pub simulated_density: Vec<f64>,
    #[serde(with = "nullable")]
    pub observed_median: f64,
    #[serde(with = "nullable")]
    pub simulated_median: f64,
}
