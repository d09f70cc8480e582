//! Stage classification and reproductive selection.
//!
//! - `stage` - developmental state → ordinal stage
//! - `reproductive` - selection mask over (time, individual, strategy)

pub mod reproductive;
pub mod stage;

pub use reproductive::{MaskState, ReproductiveSelector, Selection, StageCriterion};
pub use stage::{Stage, StageTable};
