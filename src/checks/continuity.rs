//! Lipschitz-style continuity bound between two paired trajectories.

use serde::Serialize;

use crate::core::errors::{ConformanceError, Result};

/// Observed deltas and limits at one time index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuitySample {
    pub l2_delta: f64,
    pub l_inf_delta: f64,
    pub l2_limit: f64,
    pub l_inf_limit: f64,
    pub passes: bool,
}

/// Aggregate over a whole pair of runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuityResult {
    pub frame_count: usize,
    pub violations: usize,
    pub max_l2_delta: f64,
    pub max_l_inf_delta: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_violation_frame: Option<usize>,
    pub passes: bool,
}

/// Output deltas must stay within `gain * input delta` in both norms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContinuityCheck {
    l2_gain: f64,
    l_inf_gain: f64,
}

impl ContinuityCheck {
    #[must_use]
    pub const fn new(l2_gain: f64, l_inf_gain: f64) -> Self {
        Self {
            l2_gain,
            l_inf_gain,
        }
    }

    pub fn check(
        &self,
        input_base: &[f64],
        input_perturbed: &[f64],
        output_base: &[f64],
        output_perturbed: &[f64],
    ) -> Result<ContinuitySample> {
        let input_delta = difference("continuity.input", input_base, input_perturbed)?;
        let output_delta = difference("continuity.output", output_base, output_perturbed)?;

        let l2_delta = l2_norm(&output_delta);
        let l_inf_delta = l_inf_norm(&output_delta);
        let l2_limit = self.l2_gain * l2_norm(&input_delta);
        let l_inf_limit = self.l_inf_gain * l_inf_norm(&input_delta);

        Ok(ContinuitySample {
            l2_delta,
            l_inf_delta,
            l2_limit,
            l_inf_limit,
            passes: l2_delta <= l2_limit && l_inf_delta <= l_inf_limit,
        })
    }

    /// Fold per-frame samples into one verdict.
    #[must_use]
    pub fn evaluate(samples: &[ContinuitySample]) -> ContinuityResult {
        let first_violation_frame = samples.iter().position(|s| !s.passes);
        ContinuityResult {
            frame_count: samples.len(),
            violations: samples.iter().filter(|s| !s.passes).count(),
            max_l2_delta: samples.iter().map(|s| s.l2_delta).fold(0.0, f64::max),
            max_l_inf_delta: samples.iter().map(|s| s.l_inf_delta).fold(0.0, f64::max),
            first_violation_frame,
            passes: first_violation_frame.is_none(),
        }
    }
}

fn difference(context: &'static str, a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    if a.len() != b.len() {
        return Err(ConformanceError::DimensionMismatch {
            context,
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| y - x).collect())
}

pub(crate) fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

pub(crate) fn l_inf_norm(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |acc, x| acc.max(x.abs()))
}
