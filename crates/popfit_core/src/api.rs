//! JSON entry point for wrapper scripts.

use serde::{Deserialize, Serialize};

use crate::config::CostConfig;
use crate::error::{CostError, Result};
use crate::evaluation::{Evaluator, ParameterSet};
use crate::observation::ObservationRow;
use crate::trajectory::Trajectory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub params: ParameterSet,
    pub config: CostConfig,
    pub observations: Vec<ObservationRow>,
    pub trajectory: Trajectory,
}

/// Evaluate a JSON `EvaluationRequest`, returning the record as JSON.
///
/// Malformed requests and invalid configs are errors; anything that goes
/// wrong during the evaluation itself is reported inside the record.
pub fn evaluate_json(request: &str) -> Result<String> {
    let request: EvaluationRequest =
        serde_json::from_str(request).map_err(|e| CostError::ConfigParse(e.to_string()))?;
    let evaluator = Evaluator::new(request.config, request.observations.into_iter().collect())?;
    let record = evaluator.evaluate(&request.params, &request.trajectory);
    serde_json::to_string(&record).map_err(|e| CostError::Serialization(e.to_string()))
}
