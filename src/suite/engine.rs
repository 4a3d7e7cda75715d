//! Plan execution across all five categories.
//!
//! Configuration problems (wrong controller rate, out-of-range stimuli,
//! missing drive limits) abort the whole run before any family executes.
//! Problems inside one family are recorded as a [`FamilyFailure`] and the
//! remaining families still run.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::checks::{
    ContinuityResult, ModeInductionCheck, ModeInductionResult, OutputSnappingCheck,
    PhaseBandwidthCheck, PhaseBandwidthResult, PhaseSnappingCheck, PhaseVarianceCheck,
    PhaseVarianceResult, SnappingResult, TotalVariationResult, steady_state,
};
use crate::core::channels::{EnergyIndex, PhaseIndex};
use crate::core::errors::{ConformanceError, Result, ensure_finite, ensure_non_negative, ensure_positive};
use crate::plan::builder::{ConformancePlan, ConformancePlanBuilder, ModeInductionGroup};
use crate::plan::coverage::ConformanceCoverageConfig;
use crate::runner::conformance::{ConformanceRun, ConformanceRunner};
use crate::runner::residual::DriveResidualModel;
use crate::runner::target::ConformanceTarget;
use crate::signal::family::{FamilyCategory, FamilyLabel, InputFamily};
use crate::suite::config::ConformanceSuiteConfig;

/// Default absolute tolerance between a family's step and `1 / update_rate_hz`.
pub const DEFAULT_DELTA_TIME_TOLERANCE: f64 = 1e-9;

// ──────────────────── operating envelope ────────────────────

/// Declared physical range of one input channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRange<I> {
    pub index: I,
    pub minimum: f64,
    pub maximum: f64,
}

impl<I> ChannelRange<I> {
    fn validate(&self, field: &str) -> Result<()> {
        ensure_finite(field, self.minimum)?;
        ensure_finite(field, self.maximum)?;
        if self.minimum > self.maximum {
            return Err(ConformanceError::invalid(
                field,
                format!("minimum {} exceeds maximum {}", self.minimum, self.maximum),
            ));
        }
        Ok(())
    }
}

/// The bounds a certification is scoped to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OperatingEnvelopeRepr", rename_all = "camelCase")]
pub struct OperatingEnvelope {
    oed_id: String,
    oed_version: String,
    update_rate_hz: f64,
    delta_time_tolerance: f64,
    validate_ranges: bool,
    energy_ranges: Vec<ChannelRange<EnergyIndex>>,
    phase_ranges: Vec<ChannelRange<PhaseIndex>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    drive_limits: Option<DriveResidualModel>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatingEnvelopeRepr {
    oed_id: String,
    oed_version: String,
    update_rate_hz: f64,
    #[serde(default = "default_delta_time_tolerance")]
    delta_time_tolerance: f64,
    #[serde(default)]
    validate_ranges: Option<bool>,
    #[serde(default)]
    energy_ranges: Vec<ChannelRange<EnergyIndex>>,
    #[serde(default)]
    phase_ranges: Vec<ChannelRange<PhaseIndex>>,
    #[serde(default)]
    drive_limits: Option<DriveResidualModel>,
}

const fn default_delta_time_tolerance() -> f64 {
    DEFAULT_DELTA_TIME_TOLERANCE
}

impl TryFrom<OperatingEnvelopeRepr> for OperatingEnvelope {
    type Error = ConformanceError;

    fn try_from(raw: OperatingEnvelopeRepr) -> Result<Self> {
        let mut envelope = Self::new(raw.oed_id, raw.oed_version, raw.update_rate_hz)?
            .with_delta_time_tolerance(raw.delta_time_tolerance)?
            .with_ranges(raw.energy_ranges, raw.phase_ranges)?;
        if let Some(validate) = raw.validate_ranges {
            envelope.validate_ranges = validate;
        }
        envelope.drive_limits = raw.drive_limits;
        Ok(envelope)
    }
}

impl OperatingEnvelope {
    pub fn new(
        oed_id: impl Into<String>,
        oed_version: impl Into<String>,
        update_rate_hz: f64,
    ) -> Result<Self> {
        let oed_id = oed_id.into();
        let oed_version = oed_version.into();
        if oed_id.trim().is_empty() {
            return Err(ConformanceError::invalid("envelope.oedId", "must not be blank"));
        }
        if oed_version.trim().is_empty() {
            return Err(ConformanceError::invalid(
                "envelope.oedVersion",
                "must not be blank",
            ));
        }
        ensure_positive("envelope.updateRateHz", update_rate_hz)?;
        Ok(Self {
            oed_id,
            oed_version,
            update_rate_hz,
            delta_time_tolerance: DEFAULT_DELTA_TIME_TOLERANCE,
            validate_ranges: false,
            energy_ranges: Vec::new(),
            phase_ranges: Vec::new(),
            drive_limits: None,
        })
    }

    pub fn with_update_rate_hz(mut self, update_rate_hz: f64) -> Result<Self> {
        self.update_rate_hz = ensure_positive("envelope.updateRateHz", update_rate_hz)?;
        Ok(self)
    }

    pub fn with_delta_time_tolerance(mut self, tolerance: f64) -> Result<Self> {
        self.delta_time_tolerance = ensure_non_negative("envelope.deltaTimeTolerance", tolerance)?;
        Ok(self)
    }

    /// Declare physical ranges and turn range validation on. Deserialized
    /// envelopes do the same unless `validateRanges` says otherwise.
    pub fn with_ranges(
        mut self,
        energy_ranges: Vec<ChannelRange<EnergyIndex>>,
        phase_ranges: Vec<ChannelRange<PhaseIndex>>,
    ) -> Result<Self> {
        for range in &energy_ranges {
            range.validate("envelope.energyRanges")?;
        }
        for range in &phase_ranges {
            range.validate("envelope.phaseRanges")?;
        }
        self.validate_ranges = !(energy_ranges.is_empty() && phase_ranges.is_empty());
        self.energy_ranges = energy_ranges;
        self.phase_ranges = phase_ranges;
        Ok(self)
    }

    #[must_use]
    pub fn with_drive_limits(mut self, model: DriveResidualModel) -> Self {
        self.drive_limits = Some(model);
        self
    }

    #[must_use]
    pub fn oed_id(&self) -> &str {
        &self.oed_id
    }

    #[must_use]
    pub fn oed_version(&self) -> &str {
        &self.oed_version
    }

    #[must_use]
    pub const fn update_rate_hz(&self) -> f64 {
        self.update_rate_hz
    }

    #[must_use]
    pub const fn delta_time_tolerance(&self) -> f64 {
        self.delta_time_tolerance
    }

    #[must_use]
    pub const fn validates_ranges(&self) -> bool {
        self.validate_ranges
    }

    #[must_use]
    pub const fn drive_limits(&self) -> Option<&DriveResidualModel> {
        self.drive_limits.as_ref()
    }

    /// Controller period implied by the update rate.
    #[must_use]
    pub fn expected_delta_time(&self) -> f64 {
        1.0 / self.update_rate_hz
    }

    /// Fail unless `family` steps at the controller period.
    pub fn check_delta_time(&self, family: &InputFamily) -> Result<()> {
        let expected = self.expected_delta_time();
        let actual = family.delta_time();
        if (actual - expected).abs() > self.delta_time_tolerance {
            return Err(ConformanceError::DeltaTimeMismatch {
                family: family.label().to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Sample a clone of `family` and reject any raw value outside its
    /// declared channel range. Channels without a range are unconstrained.
    pub fn check_ranges(&self, family: &InputFamily) -> Result<()> {
        let mut replay = family.clone();
        for frame in replay.frames() {
            let frame = frame?;
            for (index, value) in frame.energy_values() {
                check_range(family, &self.energy_ranges, index, value)?;
            }
            for (index, value) in frame.phase_values() {
                check_range(family, &self.phase_ranges, index, value)?;
            }
        }
        Ok(())
    }
}

impl Default for OperatingEnvelope {
    /// A 100 Hz controller with no declared ranges or drive limits.
    fn default() -> Self {
        Self {
            oed_id: "manas-oed".to_string(),
            oed_version: "1.0".to_string(),
            update_rate_hz: 100.0,
            delta_time_tolerance: DEFAULT_DELTA_TIME_TOLERANCE,
            validate_ranges: false,
            energy_ranges: Vec::new(),
            phase_ranges: Vec::new(),
            drive_limits: None,
        }
    }
}

fn check_range<I: PartialEq + std::fmt::Display>(
    family: &InputFamily,
    ranges: &[ChannelRange<I>],
    index: I,
    value: f64,
) -> Result<()> {
    let Some(range) = ranges.iter().find(|r| r.index == index) else {
        return Ok(());
    };
    if value < range.minimum || value > range.maximum {
        return Err(ConformanceError::SignalOutOfRange {
            family: family.label().to_string(),
            channel: index.to_string(),
            value,
            minimum: range.minimum,
            maximum: range.maximum,
        });
    }
    Ok(())
}

// ──────────────────── report types ────────────────────

/// A family whose run or analysis could not produce a verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyFailure {
    pub label: FamilyLabel,
    pub code: String,
    pub message: String,
}

impl FamilyFailure {
    fn new(label: &FamilyLabel, error: &ConformanceError) -> Self {
        Self {
            label: label.clone(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// A checker result attributed to the family that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyOutcome<R> {
    pub label: FamilyLabel,
    pub result: R,
}

/// The three phase checks over one phase family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub variance: PhaseVarianceResult,
    pub bandwidth: PhaseBandwidthResult,
    pub snapping: SnappingResult,
    pub passes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeInductionOutcome {
    pub amplitude: f64,
    pub result: ModeInductionResult,
}

/// Per-category AND-reduction plus the overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceSuiteSummary {
    pub continuity_passes: bool,
    pub total_variation_passes: bool,
    pub snapping_passes: bool,
    pub phase_passes: bool,
    pub mode_induction_passes: bool,
    pub passes: bool,
}

impl ConformanceSuiteSummary {
    /// Whether `passes` is the AND of the category verdicts.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.passes
            == (self.continuity_passes
                && self.total_variation_passes
                && self.snapping_passes
                && self.phase_passes
                && self.mode_induction_passes)
    }

    /// `(category, passes)` in execution order.
    #[must_use]
    pub const fn categories(&self) -> [(FamilyCategory, bool); 5] {
        [
            (FamilyCategory::Continuity, self.continuity_passes),
            (FamilyCategory::TotalVariation, self.total_variation_passes),
            (FamilyCategory::Snapping, self.snapping_passes),
            (FamilyCategory::Phase, self.phase_passes),
            (FamilyCategory::ModeInduction, self.mode_induction_passes),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceSuiteReport {
    pub continuity: Vec<FamilyOutcome<ContinuityResult>>,
    pub total_variation: Vec<FamilyOutcome<TotalVariationResult>>,
    pub snapping: Vec<FamilyOutcome<SnappingResult>>,
    pub phase: Vec<FamilyOutcome<PhaseResult>>,
    pub mode_induction: Vec<ModeInductionOutcome>,
    pub failures: Vec<FamilyFailure>,
    pub summary: ConformanceSuiteSummary,
}

impl ConformanceSuiteReport {
    /// Result count for one category (continuity counts pairs, mode induction
    /// counts groups).
    #[must_use]
    pub fn result_count(&self, category: FamilyCategory) -> usize {
        match category {
            FamilyCategory::Continuity => self.continuity.len(),
            FamilyCategory::TotalVariation => self.total_variation.len(),
            FamilyCategory::Snapping => self.snapping.len(),
            FamilyCategory::Phase => self.phase.len(),
            FamilyCategory::ModeInduction => self.mode_induction.len(),
        }
    }

    pub fn failures_in(&self, category: FamilyCategory) -> impl Iterator<Item = &FamilyFailure> {
        self.failures
            .iter()
            .filter(move |f| f.label.category == category)
    }
}

// ──────────────────── engine ────────────────────

/// Sequences a full certification run against one target.
#[derive(Debug, Clone)]
pub struct ConformanceSuiteEngine {
    coverage: ConformanceCoverageConfig,
    suite: ConformanceSuiteConfig,
    envelope: OperatingEnvelope,
}

impl ConformanceSuiteEngine {
    #[must_use]
    pub const fn new(
        coverage: ConformanceCoverageConfig,
        suite: ConformanceSuiteConfig,
        envelope: OperatingEnvelope,
    ) -> Self {
        Self {
            coverage,
            suite,
            envelope,
        }
    }

    #[must_use]
    pub const fn coverage(&self) -> &ConformanceCoverageConfig {
        &self.coverage
    }

    #[must_use]
    pub const fn suite(&self) -> &ConformanceSuiteConfig {
        &self.suite
    }

    #[must_use]
    pub const fn envelope(&self) -> &OperatingEnvelope {
        &self.envelope
    }

    /// Build the plan for the runner's channel sets and validate it against
    /// the envelope.
    pub fn plan<T: ConformanceTarget>(&self, runner: &ConformanceRunner<T>) -> Result<ConformancePlan> {
        let energies: Vec<EnergyIndex> = runner.energy_map().indices().collect();
        let phases: Vec<PhaseIndex> = runner.phase_map().indices().collect();
        let plan = ConformancePlanBuilder::build(&self.coverage, &energies, &phases)?;
        for family in plan.families() {
            self.envelope.check_delta_time(family)?;
        }
        if self.envelope.validates_ranges() {
            for family in plan.families() {
                self.envelope.check_ranges(family)?;
            }
        }
        if let Some(model) = self.envelope.drive_limits() {
            model.ensure_covers(runner.drive_map().indices())?;
        }
        Ok(plan)
    }

    pub fn run<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
    ) -> Result<ConformanceSuiteReport> {
        let plan = self.plan(runner)?;
        let mut failures = Vec::new();

        let continuity = self.run_continuity(runner, &plan, &mut failures);
        let total_variation = self.run_total_variation(runner, &plan, &mut failures);
        let snapping = self.run_snapping(runner, &plan, &mut failures);
        let phase = self.run_phase(runner, &plan, &mut failures);
        let mode_induction = self.run_mode_induction(runner, &plan, &mut failures);

        let category_ok = |category: FamilyCategory, results_pass: bool| {
            results_pass && !failures.iter().any(|f| f.label.category == category)
        };
        let continuity_passes = category_ok(
            FamilyCategory::Continuity,
            continuity.iter().all(|o| o.result.passes),
        );
        let total_variation_passes = category_ok(
            FamilyCategory::TotalVariation,
            total_variation.iter().all(|o| o.result.passes),
        );
        let snapping_passes = category_ok(
            FamilyCategory::Snapping,
            snapping.iter().all(|o| o.result.passes),
        );
        let phase_passes = category_ok(
            FamilyCategory::Phase,
            phase.iter().all(|o| o.result.passes),
        );
        let mode_induction_passes = category_ok(
            FamilyCategory::ModeInduction,
            mode_induction.iter().all(|o| o.result.passes),
        );

        let summary = ConformanceSuiteSummary {
            continuity_passes,
            total_variation_passes,
            snapping_passes,
            phase_passes,
            mode_induction_passes,
            passes: continuity_passes
                && total_variation_passes
                && snapping_passes
                && phase_passes
                && mode_induction_passes,
        };

        Ok(ConformanceSuiteReport {
            continuity,
            total_variation,
            snapping,
            phase,
            mode_induction,
            failures,
            summary,
        })
    }

    fn run_continuity<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
        plan: &ConformancePlan,
        failures: &mut Vec<FamilyFailure>,
    ) -> Vec<FamilyOutcome<ContinuityResult>> {
        let mut outcomes = Vec::with_capacity(plan.continuity_pairs.len());
        for pair in &plan.continuity_pairs {
            let base = run_family(runner, &pair.base, failures);
            let perturbed = run_family(runner, &pair.perturbed, failures);
            let (Some(base), Some(perturbed)) = (base, perturbed) else {
                continue;
            };
            match runner.continuity(
                &base,
                &perturbed,
                self.suite.l2_gain(),
                self.suite.l_inf_gain(),
            ) {
                Ok(result) => outcomes.push(FamilyOutcome {
                    label: pair.perturbed.label().clone(),
                    result,
                }),
                Err(err) => failures.push(FamilyFailure::new(pair.perturbed.label(), &err)),
            }
        }
        outcomes
    }

    fn run_total_variation<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
        plan: &ConformancePlan,
        failures: &mut Vec<FamilyFailure>,
    ) -> Vec<FamilyOutcome<TotalVariationResult>> {
        let limit = self.suite.total_variation_limit();
        analyze_each(runner, &plan.total_variation, failures, |runner, run| {
            runner.total_variation(run, limit)
        })
    }

    fn run_snapping<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
        plan: &ConformancePlan,
        failures: &mut Vec<FamilyFailure>,
    ) -> Vec<FamilyOutcome<SnappingResult>> {
        let check = OutputSnappingCheck::new(
            self.suite.snapping_epsilon(),
            self.suite.snapping_max_clusters(),
        );
        let residual = self.envelope.drive_limits();
        analyze_each(runner, &plan.snapping, failures, |runner, run| {
            let series = match residual {
                Some(model) => runner.normalized_residuals(run, model)?,
                None => runner.normalized_outputs(run)?,
            };
            check.check(&series)
        })
    }

    fn run_phase<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
        plan: &ConformancePlan,
        failures: &mut Vec<FamilyFailure>,
    ) -> Vec<FamilyOutcome<PhaseResult>> {
        let variance_check = PhaseVarianceCheck::new(self.suite.min_phase_variance());
        let snapping_check = PhaseSnappingCheck::new(
            self.suite.phase_snapping_epsilon(),
            self.suite.phase_snapping_max_clusters(),
        );
        let bandwidth_hz = self.suite.phase_bandwidth_hz();
        analyze_each(runner, &plan.phase, failures, |runner, run| {
            let series = runner.normalized_phases(run)?;
            let variance = variance_check.check(&series)?;
            let bandwidth =
                PhaseBandwidthCheck::new(bandwidth_hz, run.delta_time()).check(&series)?;
            let snapping = snapping_check.check(&series)?;
            let passes = variance.passes && bandwidth.passes && snapping.passes;
            Ok(PhaseResult {
                variance,
                bandwidth,
                snapping,
                passes,
            })
        })
    }

    fn run_mode_induction<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
        plan: &ConformancePlan,
        failures: &mut Vec<FamilyFailure>,
    ) -> Vec<ModeInductionOutcome> {
        let check = ModeInductionCheck::new(
            self.suite.mode_induction_epsilon(),
            self.suite.mode_induction_max_modes(),
        );
        let window = self.suite.steady_window_size();
        let mut outcomes = Vec::with_capacity(plan.mode_induction.len());
        for group in &plan.mode_induction {
            if let Some(states) = steady_states(runner, group, window, failures) {
                match check.check(&states) {
                    Ok(result) => outcomes.push(ModeInductionOutcome {
                        amplitude: group.amplitude,
                        result,
                    }),
                    Err(err) => {
                        if let Some(first) = group.families.first() {
                            failures.push(FamilyFailure::new(first.label(), &err));
                        }
                    }
                }
            }
        }
        outcomes
    }
}

/// Run a clone of `family`, recording any failure against its label.
fn run_family<T: ConformanceTarget>(
    runner: &mut ConformanceRunner<T>,
    family: &InputFamily,
    failures: &mut Vec<FamilyFailure>,
) -> Option<ConformanceRun> {
    let mut fresh = family.clone();
    match runner.run(&mut fresh) {
        Ok(run) => Some(run),
        Err(err) => {
            failures.push(FamilyFailure::new(family.label(), &err));
            None
        }
    }
}

fn analyze_each<T, R, F>(
    runner: &mut ConformanceRunner<T>,
    families: &[InputFamily],
    failures: &mut Vec<FamilyFailure>,
    mut analyze: F,
) -> Vec<FamilyOutcome<R>>
where
    T: ConformanceTarget,
    F: FnMut(&ConformanceRunner<T>, &ConformanceRun) -> Result<R>,
{
    let mut outcomes = Vec::with_capacity(families.len());
    for family in families {
        let Some(run) = run_family(runner, family, failures) else {
            continue;
        };
        match analyze(&*runner, &run) {
            Ok(result) => outcomes.push(FamilyOutcome {
                label: family.label().clone(),
                result,
            }),
            Err(err) => failures.push(FamilyFailure::new(family.label(), &err)),
        }
    }
    outcomes
}

/// Steady state of every member, or `None` if any member failed.
fn steady_states<T: ConformanceTarget>(
    runner: &mut ConformanceRunner<T>,
    group: &ModeInductionGroup,
    window: usize,
    failures: &mut Vec<FamilyFailure>,
) -> Option<Vec<Vec<f64>>> {
    let mut states = Vec::with_capacity(group.families.len());
    let mut complete = true;
    for family in &group.families {
        let Some(run) = run_family(runner, family, failures) else {
            complete = false;
            continue;
        };
        match runner
            .normalized_outputs(&run)
            .and_then(|series| steady_state(&series, window))
        {
            Ok(state) => states.push(state),
            Err(err) => {
                failures.push(FamilyFailure::new(family.label(), &err));
                complete = false;
            }
        }
    }
    complete.then_some(states)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::core::channels::{DriveIndex, DriveIntent, EnergyState, PhaseState};
    use crate::plan::coverage::{Band, BandCoverage, SamplingStrategy};
    use crate::runner::normalization::NormalizationMap;
    use crate::runner::residual::DriveLimit;
    use crate::runner::target::TargetError;

    /// Passes energy 0 straight through to drive 0; fails on a chosen amplitude.
    struct Passthrough {
        poison: Option<f64>,
    }

    impl ConformanceTarget for Passthrough {
        fn reset(&mut self) {}

        fn step(
            &mut self,
            energies: &[EnergyState],
            _phases: &[PhaseState],
            _delta_time: f64,
        ) -> std::result::Result<Vec<DriveIntent>, TargetError> {
            let value = energies[0].value();
            if self.poison.is_some_and(|p| (value - p).abs() < 1e-12) {
                return Err("poisoned amplitude".into());
            }
            Ok(vec![DriveIntent::new(DriveIndex(0), value)?])
        }
    }

    fn coverage() -> ConformanceCoverageConfig {
        let mut b = ConformanceCoverageConfig::default().to_builder();
        b.duration = 1.0;
        b.delta_time = 0.125;
        b.step_time = 0.25;
        b.perturbation_delta = 0.1;
        b.amplitude =
            BandCoverage::new(vec![Band::new(0.5, 0.5).unwrap()], SamplingStrategy::Midpoint)
                .unwrap();
        b.slope = BandCoverage::new(vec![Band::new(0.5, 0.5).unwrap()], SamplingStrategy::Midpoint)
            .unwrap();
        b.frequency =
            BandCoverage::new(vec![Band::new(1.0, 1.0).unwrap()], SamplingStrategy::Midpoint)
                .unwrap();
        b.build().unwrap()
    }

    fn runner(poison: Option<f64>) -> ConformanceRunner<Passthrough> {
        ConformanceRunner::new(
            Passthrough { poison },
            NormalizationMap::uniform([EnergyIndex(0)], 1.0).unwrap(),
            NormalizationMap::uniform([PhaseIndex(0)], 1.0).unwrap(),
            NormalizationMap::uniform([DriveIndex(0)], 1.0).unwrap(),
        )
    }

    fn engine(update_rate_hz: f64) -> ConformanceSuiteEngine {
        ConformanceSuiteEngine::new(
            coverage(),
            ConformanceSuiteConfig::default(),
            OperatingEnvelope::new("oed-test", "1", update_rate_hz).unwrap(),
        )
    }

    #[test]
    fn rate_mismatch_aborts_before_running() {
        let err = engine(100.0).run(&mut runner(None)).unwrap_err();
        match err {
            ConformanceError::DeltaTimeMismatch {
                expected, actual, ..
            } => {
                assert!((expected - 0.01).abs() < 1e-15);
                assert_eq!(actual, 0.125);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn every_category_reports() {
        let report = engine(8.0).run(&mut runner(None)).unwrap();
        assert_eq!(report.continuity.len(), 1);
        assert_eq!(report.total_variation.len(), 1);
        assert_eq!(report.snapping.len(), 3);
        assert_eq!(report.phase.len(), 2);
        assert_eq!(report.mode_induction.len(), 1);
        assert!(report.failures.is_empty());
        assert!(report.summary.is_consistent());
    }

    #[test]
    fn target_failure_is_attributed_and_isolated() {
        // Amplitude 0.6 only appears in the perturbed continuity family and
        // the 0.1-offset mode family.
        let report = engine(8.0).run(&mut runner(Some(0.6))).unwrap();
        assert!(!report.summary.continuity_passes);
        assert!(!report.summary.mode_induction_passes);
        assert!(!report.summary.passes);
        assert!(report.failures.iter().all(|f| f.code == "MCF-3001"));
        assert!(report.failures_in(FamilyCategory::Continuity).count() >= 1);
        assert!(report.failures_in(FamilyCategory::ModeInduction).count() >= 1);
        // Unaffected categories still produced results.
        assert_eq!(report.total_variation.len(), 1);
    }

    #[test]
    fn out_of_range_stimulus_rejected() {
        let envelope = OperatingEnvelope::new("oed-test", "1", 8.0)
            .unwrap()
            .with_ranges(
                vec![ChannelRange {
                    index: EnergyIndex(0),
                    minimum: 0.0,
                    maximum: 0.4,
                }],
                Vec::new(),
            )
            .unwrap();
        let engine =
            ConformanceSuiteEngine::new(coverage(), ConformanceSuiteConfig::default(), envelope);
        let err = engine.run(&mut runner(None)).unwrap_err();
        assert_eq!(err.code(), "MCF-2006");
    }

    #[test]
    fn residual_model_must_cover_every_drive() {
        let envelope = OperatingEnvelope::new("oed-test", "1", 8.0)
            .unwrap()
            .with_drive_limits(DriveResidualModel::default());
        let engine =
            ConformanceSuiteEngine::new(coverage(), ConformanceSuiteConfig::default(), envelope);
        let err = engine.run(&mut runner(None)).unwrap_err();
        assert_eq!(err.code(), "MCF-2005");
    }

    fn engine_with_limits(limit: DriveLimit) -> ConformanceSuiteEngine {
        let model = DriveResidualModel::new(BTreeMap::from([(DriveIndex(0), limit)]));
        let envelope = OperatingEnvelope::new("oed-test", "1", 8.0)
            .unwrap()
            .with_drive_limits(model);
        ConformanceSuiteEngine::new(coverage(), ConformanceSuiteConfig::default(), envelope)
    }

    #[test]
    fn snapping_judges_residuals_when_limits_are_attached() {
        let raw = engine(8.0).run(&mut runner(None)).unwrap();
        assert!(
            raw.snapping
                .iter()
                .any(|o| o.result.cluster_counts.iter().any(|&c| c > 1))
        );

        // Limits that never bind leave a zero residual on every frame.
        let loose = engine_with_limits(DriveLimit::new(-1e6, 1e6, 1e6).unwrap())
            .run(&mut runner(None))
            .unwrap();
        assert!(loose.failures.is_empty());
        assert_eq!(loose.snapping.len(), raw.snapping.len());
        assert!(loose.snapping.iter().all(|o| o.result.cluster_counts == vec![1]));

        // A saturating limit scores exactly the residual series.
        let limit = DriveLimit::new(-0.2, 0.2, 0.5).unwrap();
        let limited = engine_with_limits(limit);
        let report = limited.run(&mut runner(None)).unwrap();
        assert!(report.failures.is_empty());

        let model = limited.envelope().drive_limits().unwrap().clone();
        let plan = limited.plan(&runner(None)).unwrap();
        let check = OutputSnappingCheck::new(
            limited.suite().snapping_epsilon(),
            limited.suite().snapping_max_clusters(),
        );
        let mut direct = runner(None);
        let expected: Vec<SnappingResult> = plan
            .snapping
            .iter()
            .map(|family| {
                let run = direct.run(&mut family.clone()).unwrap();
                check.check(&direct.normalized_residuals(&run, &model).unwrap()).unwrap()
            })
            .collect();
        let actual: Vec<SnappingResult> =
            report.snapping.iter().map(|o| o.result.clone()).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn envelope_rejects_bad_values() {
        assert!(OperatingEnvelope::new("", "1", 100.0).is_err());
        assert!(OperatingEnvelope::new("oed", "1", 0.0).is_err());
        assert!(
            OperatingEnvelope::new("oed", "1", 100.0)
                .unwrap()
                .with_ranges(
                    Vec::new(),
                    vec![ChannelRange {
                        index: PhaseIndex(0),
                        minimum: 1.0,
                        maximum: -1.0,
                    }],
                )
                .is_err()
        );
    }

    #[test]
    fn envelope_deserializes_with_defaults() {
        let raw = r#"{"oedId":"oed","oedVersion":"2","updateRateHz":50.0}"#;
        let envelope: OperatingEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.delta_time_tolerance(), DEFAULT_DELTA_TIME_TOLERANCE);
        assert!(!envelope.validates_ranges());
        assert!(envelope.drive_limits().is_none());
    }

    #[test]
    fn declared_ranges_enable_validation_unless_disabled() {
        let raw = r#"{"oedId":"oed","oedVersion":"2","updateRateHz":8.0,
            "energyRanges":[{"index":0,"minimum":0.0,"maximum":0.4}]}"#;
        let envelope: OperatingEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.validates_ranges());
        let engine =
            ConformanceSuiteEngine::new(coverage(), ConformanceSuiteConfig::default(), envelope);
        assert_eq!(engine.run(&mut runner(None)).unwrap_err().code(), "MCF-2006");

        let raw = r#"{"oedId":"oed","oedVersion":"2","updateRateHz":8.0,"validateRanges":false,
            "energyRanges":[{"index":0,"minimum":0.0,"maximum":0.4}]}"#;
        let envelope: OperatingEnvelope = serde_json::from_str(raw).unwrap();
        assert!(!envelope.validates_ranges());
    }

    #[test]
    fn summary_consistency() {
        let summary = ConformanceSuiteSummary {
            continuity_passes: true,
            total_variation_passes: true,
            snapping_passes: false,
            phase_passes: true,
            mode_induction_passes: true,
            passes: true,
        };
        assert!(!summary.is_consistent());
    }
}
