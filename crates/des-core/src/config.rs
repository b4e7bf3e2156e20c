//! Model-level configuration.

use crate::{FlowError, FlowResult};

/// Run parameters shared by every component of one model.
///
/// Typically built in code by the model author; with the `serde` feature it
/// can also be loaded from a file.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelConfig {
    /// Master RNG seed.  The same seed always produces identical runs.
    pub seed: u64,

    /// Clock value of the first step.  Default: 0.
    pub start_time: f64,

    /// Exclusive end of the run.  Default: unbounded.
    pub end_time: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { seed: 0, start_time: crate::EPOCH, end_time: crate::AFTER_SIMULATION }
    }
}

impl ModelConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = end_time;
        self
    }

    /// Reject a NaN or infinite start, or an end not after the start.
    pub fn validate(&self) -> FlowResult<()> {
        if !self.start_time.is_finite() {
            return Err(FlowError::Config(format!("start time {} must be finite", self.start_time)));
        }
        if self.end_time.is_nan() || self.end_time <= self.start_time {
            return Err(FlowError::Config(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            )));
        }
        Ok(())
    }
}
