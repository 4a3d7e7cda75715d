//! Reference policies used by the CLI and the end-to-end tests.
//!
//! [`LinearReflexTarget`] is a smooth first-order reflex that certifies under
//! the default tolerances. [`QuantizedReflexTarget`] wraps it with an output
//! quantizer, which collapses drive trajectories onto a few levels and is
//! expected to fail the snapping and mode-induction categories.

#![allow(missing_docs)]

use crate::core::channels::{DriveIndex, DriveIntent, EnergyState, PhaseState};
use crate::core::errors::{Result, ensure_non_negative, ensure_positive};
use crate::runner::target::{ConformanceTarget, TargetError};

/// Reflex gains and lag for [`LinearReflexTarget`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflexParams {
    pub drive_count: u8,
    pub energy_gain: f64,
    pub phase_gain: f64,
    /// First-order lag time constant in seconds.
    pub time_constant: f64,
}

impl Default for ReflexParams {
    fn default() -> Self {
        Self {
            drive_count: 2,
            energy_gain: 0.3,
            phase_gain: 0.2,
            time_constant: 0.1,
        }
    }
}

/// Drive `k` tracks `(energy_gain * mean(energy) + phase_gain * mean(phase)) / (k + 1)`
/// through a first-order lag.
#[derive(Debug, Clone)]
pub struct LinearReflexTarget {
    params: ReflexParams,
    state: Vec<f64>,
}

impl LinearReflexTarget {
    pub fn new(params: ReflexParams) -> Result<Self> {
        ensure_non_negative("reflex.energyGain", params.energy_gain)?;
        ensure_non_negative("reflex.phaseGain", params.phase_gain)?;
        ensure_positive("reflex.timeConstant", params.time_constant)?;
        Ok(Self {
            state: vec![0.0; usize::from(params.drive_count)],
            params,
        })
    }

    #[must_use]
    pub const fn params(&self) -> &ReflexParams {
        &self.params
    }

    fn drive_target(&self, energies: &[EnergyState], phases: &[PhaseState]) -> f64 {
        let energy = mean(energies.iter().map(EnergyState::value));
        let phase = mean(phases.iter().map(PhaseState::value));
        self.params.energy_gain.mul_add(energy, self.params.phase_gain * phase)
    }
}

impl Default for LinearReflexTarget {
    fn default() -> Self {
        Self {
            state: vec![0.0; usize::from(ReflexParams::default().drive_count)],
            params: ReflexParams::default(),
        }
    }
}

impl ConformanceTarget for LinearReflexTarget {
    fn reset(&mut self) {
        self.state.iter_mut().for_each(|s| *s = 0.0);
    }

    fn step(
        &mut self,
        energies: &[EnergyState],
        phases: &[PhaseState],
        delta_time: f64,
    ) -> std::result::Result<Vec<DriveIntent>, TargetError> {
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return Err(format!("delta time must be > 0, got {delta_time}").into());
        }
        let target = self.drive_target(energies, phases);
        let alpha = delta_time / (self.params.time_constant + delta_time);
        let mut intents = Vec::with_capacity(self.state.len());
        for (k, state) in (0_u8..).zip(self.state.iter_mut()) {
            let goal = target / f64::from(k + 1);
            *state += alpha * (goal - *state);
            intents.push(DriveIntent::new(DriveIndex(k), *state)?);
        }
        Ok(intents)
    }
}

/// [`LinearReflexTarget`] with every activation rounded to a multiple of
/// `quantum`.
#[derive(Debug, Clone)]
pub struct QuantizedReflexTarget {
    inner: LinearReflexTarget,
    quantum: f64,
}

impl QuantizedReflexTarget {
    pub fn new(inner: LinearReflexTarget, quantum: f64) -> Result<Self> {
        ensure_positive("reflex.quantum", quantum)?;
        Ok(Self { inner, quantum })
    }

    #[must_use]
    pub const fn quantum(&self) -> f64 {
        self.quantum
    }
}

impl Default for QuantizedReflexTarget {
    fn default() -> Self {
        Self {
            inner: LinearReflexTarget::default(),
            quantum: 0.5,
        }
    }
}

impl ConformanceTarget for QuantizedReflexTarget {
    fn reset(&mut self) {
        self.inner.reset();
    }

    fn step(
        &mut self,
        energies: &[EnergyState],
        phases: &[PhaseState],
        delta_time: f64,
    ) -> std::result::Result<Vec<DriveIntent>, TargetError> {
        let smooth = self.inner.step(energies, phases, delta_time)?;
        let mut snapped = Vec::with_capacity(smooth.len());
        for intent in smooth {
            let level = (intent.activation() / self.quantum).round() * self.quantum;
            snapped.push(DriveIntent::new(intent.index(), level)?);
        }
        Ok(snapped)
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_u32), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / f64::from(count) }
}
