//! # popfit_core - Distribution-matching costs for population model calibration
//!
//! Scores a simulated population against field observations of the same
//! traits. A trajectory is classified into developmental stages, reproduced
//! individuals in the target stages are selected, their per-step values are
//! collapsed into one summary per individual, and the resulting trait
//! distributions are compared with the observed ones.
//!
//! ## Features
//! - Stage classification on a configurable threshold table
//! - Reproductive/stage/calendar selection masks
//! - Density-histogram RMSE and weighted MMD costs
//! - Pooled and per-month/per-stage pipelines
//! - Fault-isolated evaluation records (JSON-serialisable)

#![allow(clippy::too_many_arguments)]

pub mod aggregate;
pub mod api;
pub mod config;
pub mod cost;
pub mod error;
pub mod evaluation;
pub mod nullable;
pub mod observation;
pub mod record;
pub mod selection;
pub mod stats;
pub mod trajectory;

pub use api::{evaluate_json, EvaluationRequest};
pub use error::{CostError, Result};

pub use aggregate::{IndividualSummary, MaskTarget, TemporalAggregator, TraitColumns};
pub use config::{CostConfig, HistogramConfig, ObservationConfig, Pipeline, SelectionConfig};
pub use cost::{HistogramRmseCost, SimulatedSample, WeightedMmdCost};
pub use evaluation::{
    CostReport, EvaluationRecord, EvaluationStatus, Evaluator, ParameterSet, PopulationModel,
};
pub use observation::{ObservationRow, ObservationTable};
pub use record::{CostAggregator, CostKey, PooledCosts, StagedCosts, TraitKind};
pub use selection::{MaskState, ReproductiveSelector, Selection, Stage, StageCriterion, StageTable};
pub use trajectory::{CalendarWindow, Month, Trajectory};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
