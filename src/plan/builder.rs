//! Expands a sparse coverage config into a concrete, ready-to-run test manifest.
//!
//! Seeds are `seed_base + n` for a counter `n` that advances once per
//! stochastic channel in a fixed iteration order, so the whole plan is a pure
//! function of the coverage config and the channel index sets.

use serde::Serialize;

use crate::core::channels::{EnergyIndex, PhaseIndex};
use crate::core::errors::Result;
use crate::plan::coverage::ConformanceCoverageConfig;
use crate::signal::family::{FamilyCategory, FamilyLabel, InputFamily, SignalChannel};
use crate::signal::generators::{
    BandLimitedNoise, ChirpSignal, FilteredPrbsSignal, RampSignal, SignalGenerator, SignalKind,
    StepSignal,
};

/// Shortest PRBS hold period, so very high frequencies still advance time.
pub const MIN_SWITCH_PERIOD: f64 = 1e-6;

/// Two step families a known perturbation apart.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuityPair {
    pub amplitude: f64,
    pub base: InputFamily,
    pub perturbed: InputFamily,
}

/// Step families sharing one nominal amplitude, one per configured offset.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeInductionGroup {
    pub amplitude: f64,
    pub families: Vec<InputFamily>,
}

/// The five category collections of one certification run.
#[derive(Debug, Clone, PartialEq)]
pub struct ConformancePlan {
    pub continuity_pairs: Vec<ContinuityPair>,
    pub total_variation: Vec<InputFamily>,
    pub snapping: Vec<InputFamily>,
    pub phase: Vec<InputFamily>,
    pub mode_induction: Vec<ModeInductionGroup>,
}

/// Per-category family counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanCounts {
    pub continuity_pairs: usize,
    pub total_variation: usize,
    pub snapping: usize,
    pub phase: usize,
    pub mode_induction_groups: usize,
    pub total_families: usize,
}

impl ConformancePlan {
    #[must_use]
    pub fn counts(&self) -> PlanCounts {
        let mode_members: usize = self.mode_induction.iter().map(|g| g.families.len()).sum();
        PlanCounts {
            continuity_pairs: self.continuity_pairs.len(),
            total_variation: self.total_variation.len(),
            snapping: self.snapping.len(),
            phase: self.phase.len(),
            mode_induction_groups: self.mode_induction.len(),
            total_families: 2 * self.continuity_pairs.len()
                + self.total_variation.len()
                + self.snapping.len()
                + self.phase.len()
                + mode_members,
        }
    }

    /// Every family in execution order.
    pub fn families(&self) -> impl Iterator<Item = &InputFamily> {
        self.continuity_pairs
            .iter()
            .flat_map(|pair| [&pair.base, &pair.perturbed])
            .chain(self.total_variation.iter())
            .chain(self.snapping.iter())
            .chain(self.phase.iter())
            .chain(self.mode_induction.iter().flat_map(|g| g.families.iter()))
    }
}

struct SeedSequence {
    base: u64,
    offset: u64,
}

impl SeedSequence {
    fn next(&mut self) -> u64 {
        let seed = self.base.wrapping_add(self.offset);
        self.offset += 1;
        seed
    }
}

/// Stateless plan expansion.
pub struct ConformancePlanBuilder<'a> {
    coverage: &'a ConformanceCoverageConfig,
    energy_indices: Vec<EnergyIndex>,
    phase_indices: Vec<PhaseIndex>,
}

impl<'a> ConformancePlanBuilder<'a> {
    /// Build the full plan for the given channel sets.
    pub fn build(
        coverage: &'a ConformanceCoverageConfig,
        energy_indices: &[EnergyIndex],
        phase_indices: &[PhaseIndex],
    ) -> Result<ConformancePlan> {
        let mut energy_indices = energy_indices.to_vec();
        energy_indices.sort_unstable();
        energy_indices.dedup();
        let mut phase_indices = phase_indices.to_vec();
        phase_indices.sort_unstable();
        phase_indices.dedup();

        let builder = Self {
            coverage,
            energy_indices,
            phase_indices,
        };
        let mut seeds = SeedSequence {
            base: coverage.seed_base(),
            offset: 0,
        };

        let continuity_pairs = builder.continuity_pairs()?;
        let total_variation = builder.total_variation()?;
        let (snapping, phase) = builder.snapping_and_phase(&mut seeds)?;
        let mode_induction = builder.mode_induction()?;

        Ok(ConformancePlan {
            continuity_pairs,
            total_variation,
            snapping,
            phase,
            mode_induction,
        })
    }

    fn continuity_pairs(&self) -> Result<Vec<ContinuityPair>> {
        let delta = self.coverage.perturbation_delta();
        self.coverage
            .amplitude()
            .values()
            .into_iter()
            .map(|amplitude| {
                let label = FamilyLabel::new(FamilyCategory::Continuity, SignalKind::Step)
                    .with_amplitude(amplitude);
                Ok(ContinuityPair {
                    amplitude,
                    base: self.step_family(label.clone(), amplitude)?,
                    perturbed: self
                        .step_family(label.with_offset(delta), amplitude + delta)?,
                })
            })
            .collect()
    }

    fn total_variation(&self) -> Result<Vec<InputFamily>> {
        self.coverage
            .slope()
            .values()
            .into_iter()
            .map(|slope| {
                let ramp = SignalGenerator::Ramp(RampSignal::new(0.0, slope)?);
                let label = FamilyLabel::new(FamilyCategory::TotalVariation, SignalKind::Ramp)
                    .with_slope(slope);
                self.family(label, || Ok(ramp.clone()))
            })
            .collect()
    }

    fn snapping_and_phase(
        &self,
        seeds: &mut SeedSequence,
    ) -> Result<(Vec<InputFamily>, Vec<InputFamily>)> {
        let mut snapping = Vec::new();
        let mut phase = Vec::new();
        let amplitudes = self.coverage.amplitude().values();

        for &amplitude in &amplitudes {
            for frequency in self.coverage.frequency().values() {
                let switch_period = (1.0 / (2.0 * frequency)).max(MIN_SWITCH_PERIOD);
                let cutoff_hz = frequency.max(self.coverage.minimum_cutoff_hz());

                let prbs_seed = seeds.offset;
                let prbs = self.family(
                    FamilyLabel::new(FamilyCategory::Snapping, SignalKind::FilteredPrbs)
                        .with_amplitude(amplitude)
                        .with_frequency(frequency)
                        .with_seed(seeds.base.wrapping_add(prbs_seed)),
                    || {
                        Ok(SignalGenerator::FilteredPrbs(FilteredPrbsSignal::new(
                            amplitude,
                            switch_period,
                            cutoff_hz,
                            seeds.next(),
                        )?))
                    },
                )?;
                snapping.push(prbs);

                let noise_seed = seeds.offset;
                let noise = self.family(
                    FamilyLabel::new(FamilyCategory::Snapping, SignalKind::BandLimitedNoise)
                        .with_amplitude(amplitude)
                        .with_frequency(frequency)
                        .with_seed(seeds.base.wrapping_add(noise_seed)),
                    || {
                        Ok(SignalGenerator::Noise(BandLimitedNoise::new(
                            amplitude,
                            cutoff_hz,
                            seeds.next(),
                        )?))
                    },
                )?;
                phase.push(noise.recategorized(FamilyCategory::Phase));
                snapping.push(noise);
            }
        }

        for &amplitude in &amplitudes {
            for band in self.coverage.frequency().bands() {
                let chirp = SignalGenerator::Chirp(ChirpSignal::new(
                    amplitude,
                    band.minimum(),
                    band.maximum(),
                    self.coverage.duration(),
                )?);
                let family = self.family(
                    FamilyLabel::new(FamilyCategory::Snapping, SignalKind::Chirp)
                        .with_amplitude(amplitude)
                        .with_frequency_band(band.minimum(), band.maximum()),
                    || Ok(chirp.clone()),
                )?;
                phase.push(family.recategorized(FamilyCategory::Phase));
                snapping.push(family);
            }
        }

        Ok((snapping, phase))
    }

    fn mode_induction(&self) -> Result<Vec<ModeInductionGroup>> {
        self.coverage
            .amplitude()
            .values()
            .into_iter()
            .map(|amplitude| {
                let families = self
                    .coverage
                    .mode_induction_offsets()
                    .iter()
                    .map(|&offset| {
                        let label =
                            FamilyLabel::new(FamilyCategory::ModeInduction, SignalKind::Step)
                                .with_amplitude(amplitude)
                                .with_offset(offset);
                        self.step_family(label, amplitude + offset)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ModeInductionGroup {
                    amplitude,
                    families,
                })
            })
            .collect()
    }

    fn step_family(&self, label: FamilyLabel, step_value: f64) -> Result<InputFamily> {
        let step = SignalGenerator::Step(StepSignal::new(
            0.0,
            step_value,
            self.coverage.step_time(),
        )?);
        self.family(label, || Ok(step.clone()))
    }

    /// Bind every energy and phase channel to a generator from `make`.
    ///
    /// `make` is called once per channel, energies first, in index order;
    /// energy channels are wrapped to stay non-negative.
    fn family<F>(&self, label: FamilyLabel, mut make: F) -> Result<InputFamily>
    where
        F: FnMut() -> Result<SignalGenerator>,
    {
        let energy_channels = self
            .energy_indices
            .iter()
            .map(|&index| {
                Ok(SignalChannel::new(
                    index,
                    make()?.non_negative(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let phase_channels = self
            .phase_indices
            .iter()
            .map(|&index| Ok(SignalChannel::new(index, make()?)))
            .collect::<Result<Vec<_>>>()?;
        InputFamily::new(
            label,
            self.coverage.duration(),
            self.coverage.delta_time(),
            energy_channels,
            phase_channels,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::coverage::{Band, BandCoverage, SamplingStrategy};

    fn energies() -> Vec<EnergyIndex> {
        vec![EnergyIndex(1), EnergyIndex(0)]
    }

    fn phases() -> Vec<PhaseIndex> {
        vec![PhaseIndex(0)]
    }

    fn small_coverage() -> ConformanceCoverageConfig {
        let mut b = ConformanceCoverageConfig::default().to_builder();
        b.duration = 0.5;
        b.step_time = 0.1;
        b.amplitude = BandCoverage::new(
            vec![Band::new(0.2, 0.6).unwrap()],
            SamplingStrategy::MinMidMax,
        )
        .unwrap();
        b.frequency = BandCoverage::new(
            vec![Band::new(1.0, 3.0).unwrap()],
            SamplingStrategy::Midpoint,
        )
        .unwrap();
        b.slope = BandCoverage::new(
            vec![Band::new(-0.5, 0.5).unwrap()],
            SamplingStrategy::MinMidMax,
        )
        .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn category_sizes_follow_coverage() {
        let coverage = small_coverage();
        let plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let counts = plan.counts();
        // 3 amplitudes, 1 frequency sample, 1 frequency band, 3 slopes, 3 offsets.
        assert_eq!(counts.continuity_pairs, 3);
        assert_eq!(counts.total_variation, 3);
        assert_eq!(counts.snapping, 3 * 2 + 3);
        assert_eq!(counts.phase, 3 + 3);
        assert_eq!(counts.mode_induction_groups, 3);
        assert_eq!(counts.total_families, 6 + 3 + 9 + 6 + 9);
        assert_eq!(plan.families().count(), counts.total_families);
    }

    #[test]
    fn continuity_pairs_differ_by_perturbation() {
        let coverage = small_coverage();
        let mut plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let pair = &mut plan.continuity_pairs[0];
        let base = pair.base.collect_frames().unwrap();
        let perturbed = pair.perturbed.collect_frames().unwrap();
        let last = base.len() - 1;
        let delta = perturbed[last].energies[0].value() - base[last].energies[0].value();
        assert!((delta - coverage.perturbation_delta()).abs() < 1e-12);
        assert_eq!(base[0].energies[0].value(), perturbed[0].energies[0].value());
    }

    #[test]
    fn channels_are_bound_in_index_order() {
        let coverage = small_coverage();
        let plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let family = &plan.total_variation[0];
        let indices: Vec<EnergyIndex> =
            family.energy_channels().iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![EnergyIndex(0), EnergyIndex(1)]);
    }

    #[test]
    fn negative_slopes_keep_energies_non_negative() {
        let coverage = small_coverage();
        let mut plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let falling = plan
            .total_variation
            .iter_mut()
            .find(|f| f.label().slope == Some(-0.5))
            .unwrap();
        let frames = falling.collect_frames().unwrap();
        assert!(frames.iter().all(|f| f.energies.iter().all(|e| e.value() >= 0.0)));
        assert!(frames.last().unwrap().phases[0].value() < 0.0);
    }

    #[test]
    fn building_twice_is_identical() {
        let coverage = small_coverage();
        let first = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let second = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stochastic_families_get_distinct_seeds() {
        let coverage = small_coverage();
        let plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let seeds: Vec<u64> = plan.snapping.iter().filter_map(|f| f.label().seed).collect();
        let unique: std::collections::BTreeSet<u64> = seeds.iter().copied().collect();
        assert_eq!(seeds.len(), unique.len());
        assert_eq!(seeds[0], coverage.seed_base());
    }

    #[test]
    fn shared_noise_family_replays_identically_in_both_categories() {
        let coverage = small_coverage();
        let mut plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let snapping_noise = plan
            .snapping
            .iter_mut()
            .find(|f| f.label().kind == SignalKind::BandLimitedNoise)
            .unwrap()
            .collect_frames()
            .unwrap();
        let phase_noise = plan.phase[0].collect_frames().unwrap();
        assert_eq!(snapping_noise, phase_noise);
    }

    #[test]
    fn zero_frequency_holds_prbs_and_uses_minimum_cutoff() {
        let mut b = small_coverage().to_builder();
        b.frequency =
            BandCoverage::new(vec![Band::new(0.0, 0.0).unwrap()], SamplingStrategy::Midpoint)
                .unwrap();
        let coverage = b.build().unwrap();
        let mut plan = ConformancePlanBuilder::build(&coverage, &energies(), &phases()).unwrap();
        let frames = plan.snapping[0].collect_frames().unwrap();
        assert!(frames.iter().all(|f| f.phases[0].value().is_finite()));
    }
}
