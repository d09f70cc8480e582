//! Simulated population trajectory.
//!
//! The simulator hands over time series shaped (time, individual, strategy)
//! plus per-individual values shaped (individual, strategy). Everything in
//! this crate borrows a `Trajectory` immutably.

pub mod calendar;

pub use calendar::{day_offset, CalendarWindow, Month, DAYS_IN_YEAR};

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    /// Developmental state (D), 0 at spawning and 1 at adulthood
    #[serde(with = "crate::nullable::array")]
    pub development: Array3<f64>,
    /// Lipid reserve mass (NaN once the individual is gone)
    #[serde(with = "crate::nullable::array")]
    pub reserves: Array3<f64>,
    /// Structural body weight
    #[serde(with = "crate::nullable::array")]
    pub weight: Array3<f64>,
    /// Day-of-year offset of each time step
    #[serde(with = "crate::nullable::array")]
    pub day_of_year: Array3<f64>,
    /// Time at which reproduction completed, NaN if it never did
    #[serde(with = "crate::nullable::array")]
    pub reproduction_time: Array2<f64>,
    /// Lifetime fitness of each individual
    #[serde(with = "crate::nullable::array")]
    pub fitness: Array2<f64>,
}

impl Trajectory {
    pub fn new(
        development: Array3<f64>,
        reserves: Array3<f64>,
        weight: Array3<f64>,
        day_of_year: Array3<f64>,
        reproduction_time: Array2<f64>,
        fitness: Array2<f64>,
    ) -> Result<Self> {
        let trajectory = Self {
            development,
            reserves,
            weight,
            day_of_year,
            reproduction_time,
            fitness,
        };
        trajectory.validate()?;
        Ok(trajectory)
    }

    /// (time steps, individuals, strategies)
    pub fn shape(&self) -> (usize, usize, usize) {
        self.development.dim()
    }

    pub fn n_steps(&self) -> usize {
        self.shape().0
    }

    pub fn n_individuals(&self) -> usize {
        self.shape().1
    }

    pub fn n_strategies(&self) -> usize {
        self.shape().2
    }

    /// Check that every field agrees with the development array's shape.
    pub fn validate(&self) -> Result<()> {
        let (nt, ni, ns) = self.shape();
        let expected = vec![nt, ni, ns];
        for (field, array) in [
            ("reserves", &self.reserves),
            ("weight", &self.weight),
            ("day_of_year", &self.day_of_year),
        ] {
            if array.shape() != expected.as_slice() {
                return Err(CostError::ShapeMismatch {
                    field,
                    expected: expected.clone(),
                    found: array.shape().to_vec(),
                });
            }
        }
        for (field, array) in [
            ("reproduction_time", &self.reproduction_time),
            ("fitness", &self.fitness),
        ] {
            if array.shape() != &[ni, ns][..] {
                return Err(CostError::ShapeMismatch {
                    field,
                    expected: vec![ni, ns],
                    found: array.shape().to_vec(),
                });
            }
        }
        Ok(())
    }

    pub fn has_reproduced(&self, individual: usize, strategy: usize) -> bool {
        !self.reproduction_time[[individual, strategy]].is_nan()
    }

    pub fn reproduced_count(&self) -> usize {
        self.reproduction_time.iter().filter(|t| !t.is_nan()).count()
    }

    /// A run is viable when at least one individual ever carries reserves.
    pub fn has_viable_individuals(&self) -> bool {
        self.reserves.iter().any(|r| !r.is_nan())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_new_rejects_mismatched_fields() {
        let cube = Array::zeros((4, 3, 2));
        let wrong = Array::zeros((4, 3, 1));
        let pop = Array2::zeros((3, 2));
        let result = Trajectory::new(
            cube.clone(),
            wrong,
            cube.clone(),
            cube,
            pop.clone(),
            pop,
        );
        match result {
            Err(CostError::ShapeMismatch { field, .. }) => assert_eq!(field, "reserves"),
            other => panic!("expected shape mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_new_rejects_mismatched_population_arrays() {
        let cube = Array::zeros((4, 3, 2));
        let result = Trajectory::new(
            cube.clone(),
            cube.clone(),
            cube.clone(),
            cube,
            Array2::zeros((2, 2)),
            Array2::zeros((3, 2)),
        );
        assert!(matches!(
            result,
            Err(CostError::ShapeMismatch { field: "reproduction_time", .. })
        ));
    }

    #[test]
    fn test_viability_and_reproduction() {
        let traj = fixtures::linear_trajectory(3, 0.0, &[1.0, 0.5], &[10.0, 20.0], &[5.0, f64::NAN]);
        assert_eq!(traj.shape(), (3, 2, 1));
        assert!(traj.has_viable_individuals());
        assert!(traj.has_reproduced(0, 0));
        assert!(!traj.has_reproduced(1, 0));
        assert_eq!(traj.reproduced_count(), 1);

        let mut dead = traj.clone();
        dead.reserves.fill(f64::NAN);
        assert!(!dead.has_viable_individuals());
    }

    #[test]
    fn test_json_keeps_missing_values() {
        let traj = fixtures::linear_trajectory(3, 0.0, &[1.0, 0.5], &[10.0, f64::NAN], &[5.0, f64::NAN]);
        let json = serde_json::to_string(&traj).unwrap();
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.shape(), traj.shape());
        assert!(back.reproduction_time[[1, 0]].is_nan());
        assert!(back.reserves[[2, 1, 0]].is_nan());
        assert_eq!(back.reserves[[2, 0, 0]], 10.0);
    }
}
