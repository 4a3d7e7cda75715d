//! Replays input families through a target and measures the trajectories.

use crate::checks::{ContinuityCheck, ContinuityResult, TotalVariationCheck, TotalVariationResult};
use crate::core::channels::{DriveIndex, DriveIntent, EnergyIndex, PhaseIndex};
use crate::core::errors::{ConformanceError, Result};
use crate::runner::normalization::NormalizationMap;
use crate::runner::residual::DriveResidualModel;
use crate::runner::target::ConformanceTarget;
use crate::signal::family::{InputFamily, InputFrame};

/// Recorded trajectory of one family through one target.
#[derive(Debug, Clone, PartialEq)]
pub struct ConformanceRun {
    delta_time: f64,
    frames: Vec<InputFrame>,
    outputs: Vec<Vec<DriveIntent>>,
}

impl ConformanceRun {
    #[must_use]
    pub const fn delta_time(&self) -> f64 {
        self.delta_time
    }

    #[must_use]
    pub fn frames(&self) -> &[InputFrame] {
        &self.frames
    }

    /// One drive-intent vector per frame, parallel to [`Self::frames`].
    #[must_use]
    pub fn outputs(&self) -> &[Vec<DriveIntent>] {
        &self.outputs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Owns a target for the duration of certification and normalizes every
/// vector it compares against the configured channel scales.
#[derive(Debug)]
pub struct ConformanceRunner<T> {
    target: T,
    energy_map: NormalizationMap<EnergyIndex>,
    phase_map: NormalizationMap<PhaseIndex>,
    drive_map: NormalizationMap<DriveIndex>,
}

impl<T: ConformanceTarget> ConformanceRunner<T> {
    #[must_use]
    pub const fn new(
        target: T,
        energy_map: NormalizationMap<EnergyIndex>,
        phase_map: NormalizationMap<PhaseIndex>,
        drive_map: NormalizationMap<DriveIndex>,
    ) -> Self {
        Self {
            target,
            energy_map,
            phase_map,
            drive_map,
        }
    }

    #[must_use]
    pub const fn target(&self) -> &T {
        &self.target
    }

    pub fn into_target(self) -> T {
        self.target
    }

    #[must_use]
    pub const fn energy_map(&self) -> &NormalizationMap<EnergyIndex> {
        &self.energy_map
    }

    #[must_use]
    pub const fn phase_map(&self) -> &NormalizationMap<PhaseIndex> {
        &self.phase_map
    }

    #[must_use]
    pub const fn drive_map(&self) -> &NormalizationMap<DriveIndex> {
        &self.drive_map
    }

    /// Reset the target, then step it once per frame. Consumes the family's
    /// generator state; pass a fresh clone to rerun the same stimulus.
    pub fn run(&mut self, family: &mut InputFamily) -> Result<ConformanceRun> {
        self.target.reset();
        let delta_time = family.delta_time();
        let capacity = family.frame_count();
        let mut frames = Vec::with_capacity(capacity);
        let mut outputs = Vec::with_capacity(capacity);

        for frame in family.frames() {
            let frame = frame?;
            let drives = self
                .target
                .step(&frame.energies, &frame.phases, delta_time)
                .map_err(|source| ConformanceError::Target { source })?;
            frames.push(frame);
            outputs.push(drives);
        }

        Ok(ConformanceRun {
            delta_time,
            frames,
            outputs,
        })
    }

    /// Frame-by-frame continuity between two runs of equal length.
    pub fn continuity(
        &self,
        base: &ConformanceRun,
        perturbed: &ConformanceRun,
        l2_gain: f64,
        l_inf_gain: f64,
    ) -> Result<ContinuityResult> {
        if base.len() != perturbed.len() {
            return Err(ConformanceError::FrameCountMismatch {
                expected: base.len(),
                actual: perturbed.len(),
            });
        }
        let check = ContinuityCheck::new(l2_gain, l_inf_gain);
        let samples = base
            .frames
            .iter()
            .zip(&perturbed.frames)
            .zip(base.outputs.iter().zip(&perturbed.outputs))
            .map(|((frame_a, frame_b), (out_a, out_b))| {
                check.check(
                    &self.normalized_input(frame_a)?,
                    &self.normalized_input(frame_b)?,
                    &self.normalized_drives(out_a)?,
                    &self.normalized_drives(out_b)?,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ContinuityCheck::evaluate(&samples))
    }

    pub fn total_variation(&self, run: &ConformanceRun, limit: f64) -> Result<TotalVariationResult> {
        TotalVariationCheck::new(limit).check(&self.normalized_outputs(run)?)
    }

    /// Normalized energies followed by normalized phases.
    pub fn normalized_input(&self, frame: &InputFrame) -> Result<Vec<f64>> {
        let mut vector = self.energy_map.normalized_vector(frame.energy_values())?;
        vector.extend(self.phase_map.normalized_vector(frame.phase_values())?);
        Ok(vector)
    }

    pub fn normalized_drives(&self, drives: &[DriveIntent]) -> Result<Vec<f64>> {
        self.drive_map
            .normalized_vector(drives.iter().map(|d| (d.index(), d.activation())))
    }

    pub fn normalized_outputs(&self, run: &ConformanceRun) -> Result<Vec<Vec<f64>>> {
        run.outputs
            .iter()
            .map(|drives| self.normalized_drives(drives))
            .collect()
    }

    pub fn normalized_phases(&self, run: &ConformanceRun) -> Result<Vec<Vec<f64>>> {
        run.frames
            .iter()
            .map(|frame| self.phase_map.normalized_vector(frame.phase_values()))
            .collect()
    }

    /// Normalized `raw - reference` drive series under a residual model.
    pub fn normalized_residuals(
        &self,
        run: &ConformanceRun,
        model: &DriveResidualModel,
    ) -> Result<Vec<Vec<f64>>> {
        model
            .residuals(run.outputs(), run.delta_time())?
            .into_iter()
            .map(|row| self.drive_map.normalized_vector(row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channels::{EnergyState, PhaseState};
    use crate::runner::target::TargetError;
    use crate::signal::family::{FamilyCategory, FamilyLabel, SignalChannel};
    use crate::signal::generators::{SignalGenerator, SignalKind, StepSignal};

    /// Emits the mean energy on drive 0 and counts resets.
    struct Echo {
        resets: usize,
        fail_after: Option<usize>,
        steps: usize,
    }

    impl ConformanceTarget for Echo {
        fn reset(&mut self) {
            self.resets += 1;
            self.steps = 0;
        }

        #[allow(clippy::cast_precision_loss)]
        fn step(
            &mut self,
            energies: &[EnergyState],
            _phases: &[PhaseState],
            _delta_time: f64,
        ) -> std::result::Result<Vec<DriveIntent>, TargetError> {
            self.steps += 1;
            if self.fail_after.is_some_and(|n| self.steps > n) {
                return Err("actuator bus offline".into());
            }
            let mean = energies.iter().map(EnergyState::value).sum::<f64>() / energies.len() as f64;
            Ok(vec![DriveIntent::new(DriveIndex(0), mean)?])
        }
    }

    fn runner(fail_after: Option<usize>) -> ConformanceRunner<Echo> {
        ConformanceRunner::new(
            Echo {
                resets: 0,
                fail_after,
                steps: 0,
            },
            NormalizationMap::uniform([EnergyIndex(0)], 1.0).unwrap(),
            NormalizationMap::uniform([PhaseIndex(0)], 1.0).unwrap(),
            NormalizationMap::uniform([DriveIndex(0)], 2.0).unwrap(),
        )
    }

    fn step_family(value: f64, duration: f64) -> InputFamily {
        let label = FamilyLabel::new(FamilyCategory::Continuity, SignalKind::Step);
        let step = || SignalGenerator::Step(StepSignal::new(0.0, value, 0.25).unwrap());
        InputFamily::new(
            label,
            duration,
            0.125,
            vec![SignalChannel::new(EnergyIndex(0), step().non_negative())],
            vec![SignalChannel::new(PhaseIndex(0), step())],
        )
        .unwrap()
    }

    #[test]
    fn run_records_one_output_per_frame() {
        let mut runner = runner(None);
        let run = runner.run(&mut step_family(1.0, 1.0)).unwrap();
        assert_eq!(run.len(), 9);
        assert_eq!(run.outputs().len(), 9);
        assert_eq!(run.outputs()[0][0].activation(), 0.0);
        assert_eq!(run.outputs()[8][0].activation(), 1.0);
        assert_eq!(runner.target().resets, 1);
    }

    #[test]
    fn target_failure_is_preserved() {
        let mut runner = runner(Some(3));
        let err = runner.run(&mut step_family(1.0, 1.0)).unwrap_err();
        assert_eq!(err.code(), "MCF-3001");
        assert!(err.to_string().contains("actuator bus offline"));
    }

    #[test]
    fn continuity_of_echo_policy() {
        let mut runner = runner(None);
        let base = runner.run(&mut step_family(0.5, 1.0)).unwrap();
        let perturbed = runner.run(&mut step_family(0.6, 1.0)).unwrap();
        let result = runner.continuity(&base, &perturbed, 1.0, 1.0).unwrap();
        assert_eq!(result.frame_count, 9);
        assert!(result.passes);
        // Drive scale 2.0 halves the normalized output delta.
        assert!((result.max_l_inf_delta - 0.05).abs() < 1e-9);
    }

    #[test]
    fn continuity_requires_equal_lengths() {
        let mut runner = runner(None);
        let base = runner.run(&mut step_family(0.5, 1.0)).unwrap();
        let short = runner.run(&mut step_family(0.5, 0.5)).unwrap();
        let err = runner.continuity(&base, &short, 1.0, 1.0).unwrap_err();
        assert!(matches!(
            err,
            ConformanceError::FrameCountMismatch {
                expected: 9,
                actual: 5
            }
        ));
    }

    #[test]
    fn total_variation_uses_normalized_outputs() {
        let mut runner = runner(None);
        let run = runner.run(&mut step_family(1.0, 1.0)).unwrap();
        let result = runner.total_variation(&run, 1.0).unwrap();
        assert!((result.total_variation - 0.5).abs() < 1e-12);
        assert!(result.passes);
    }

    #[test]
    fn normalized_input_concatenates_energy_then_phase() {
        let mut runner = runner(None);
        let run = runner.run(&mut step_family(1.0, 1.0)).unwrap();
        let last = run.frames().last().unwrap();
        assert_eq!(runner.normalized_input(last).unwrap(), vec![1.0, 1.0]);
        assert_eq!(runner.normalized_phases(&run).unwrap().len(), 9);
    }
}
