use thiserror::Error;

#[derive(Error, Debug)]
pub enum CostError {
    #[error("Shape mismatch for {field}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        field: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Length mismatch for {field}: expected {expected}, found {found}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Dimension mismatch: observed has {observed} columns, simulated has {simulated}")]
    DimensionMismatch { observed: usize, simulated: usize },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Simulation failed: {0}")]
    Simulation(String),
}

impl CostError {
    /// Whether a batch driver can move on to the next parameter set.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CostError::ShapeMismatch { .. } => true,
            CostError::LengthMismatch { .. } => true,
            CostError::DimensionMismatch { .. } => true,
            CostError::Simulation(_) => true,
            CostError::Serialization(_) => true,
            CostError::InvalidConfig(_) => false,
            CostError::ConfigParse(_) => false,
            CostError::Io(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CostError>;
