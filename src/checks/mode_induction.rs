//! Mode collapse detection across a group of offset stimuli.

use serde::Serialize;

use crate::checks::clustering::vector_cluster_count;
use crate::checks::rows_of_equal_width;
use crate::core::errors::{ConformanceError, Result};

/// Mean of the last `window` rows. A window longer than the series averages
/// the whole series.
#[allow(clippy::cast_precision_loss)]
pub fn steady_state(series: &[Vec<f64>], window: usize) -> Result<Vec<f64>> {
    let width = rows_of_equal_width("mode_induction.steady_state", series)?;
    if series.is_empty() {
        return Err(ConformanceError::EmptyTrajectory {
            context: "mode_induction.steady_state",
        });
    }
    let tail = &series[series.len().saturating_sub(window.max(1))..];
    let mut mean = vec![0.0; width];
    for row in tail {
        for (acc, value) in mean.iter_mut().zip(row) {
            *acc += value;
        }
    }
    let n = tail.len() as f64;
    Ok(mean.into_iter().map(|sum| sum / n).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeInductionResult {
    pub group_size: usize,
    pub mode_count: usize,
    pub max_modes: usize,
    pub passes: bool,
}

/// Distinct offsets must produce more than `max_modes` distinct steady states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeInductionCheck {
    epsilon: f64,
    max_modes: usize,
}

impl ModeInductionCheck {
    #[must_use]
    pub const fn new(epsilon: f64, max_modes: usize) -> Self {
        Self { epsilon, max_modes }
    }

    pub fn check(&self, steady_states: &[Vec<f64>]) -> Result<ModeInductionResult> {
        rows_of_equal_width("mode_induction.steady_states", steady_states)?;
        let mode_count = vector_cluster_count(steady_states, self.epsilon);
        Ok(ModeInductionResult {
            group_size: steady_states.len(),
            mode_count,
            max_modes: self.max_modes,
            passes: mode_count > self.max_modes,
        })
    }
}
