//! The narrow interface a certified policy exposes.

use crate::core::channels::{DriveIntent, EnergyState, PhaseState};

/// Policy-defined failure, carried through certification unchanged.
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

/// A closed-loop policy under certification.
///
/// `step` is called once per frame in strictly increasing simulated time and
/// must return one intent per declared drive. The runner owns the target for
/// the duration of a run; nothing else may step or reset it concurrently.
pub trait ConformanceTarget {
    /// Clear all internal state so the next run is independent of history.
    fn reset(&mut self);

    /// Advance the policy by one frame.
    fn step(
        &mut self,
        energies: &[EnergyState],
        phases: &[PhaseState],
        delta_time: f64,
    ) -> Result<Vec<DriveIntent>, TargetError>;
}

impl<T: ConformanceTarget + ?Sized> ConformanceTarget for Box<T> {
    fn reset(&mut self) {
        (**self).reset();
    }

    fn step(
        &mut self,
        energies: &[EnergyState],
        phases: &[PhaseState],
        delta_time: f64,
    ) -> Result<Vec<DriveIntent>, TargetError> {
        (**self).step(energies, phases, delta_time)
    }
}
