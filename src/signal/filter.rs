//! Single-pole discretized RC low-pass filter.

use std::f64::consts::PI;

use crate::core::errors::{Result, ensure_positive};

/// First-order low-pass shared by the noise and switching generators.
///
/// The first call passes its input through unchanged and seeds the state;
/// later calls apply `y += alpha * (x - y)` with `alpha = dt / (rc + dt)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LowPassFilter {
    cutoff_hz: f64,
    rc: f64,
    output: Option<f64>,
}

impl LowPassFilter {
    pub fn new(cutoff_hz: f64) -> Result<Self> {
        ensure_positive("low_pass.cutoff_hz", cutoff_hz)?;
        Ok(Self {
            cutoff_hz,
            rc: 1.0 / (2.0 * PI * cutoff_hz),
            output: None,
        })
    }

    #[must_use]
    pub const fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    /// Smoothing factor for a given step.
    #[must_use]
    pub fn alpha(&self, delta_time: f64) -> f64 {
        delta_time / (self.rc + delta_time)
    }

    pub fn apply(&mut self, input: f64, delta_time: f64) -> f64 {
        let next = match self.output {
            None => input,
            Some(prev) => self.alpha(delta_time).mul_add(input - prev, prev),
        };
        self.output = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.output = None;
    }
}
