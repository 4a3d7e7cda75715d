//! Sparse coverage description: bands, sampling strategy, and plan knobs.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConformanceError, Result, ensure_finite, ensure_positive};
use crate::signal::family::checked_frame_count;

/// Closed interval `[minimum, maximum]` with finite, ordered bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BandRepr")]
pub struct Band {
    minimum: f64,
    maximum: f64,
}

#[derive(Deserialize)]
struct BandRepr {
    minimum: f64,
    maximum: f64,
}

impl TryFrom<BandRepr> for Band {
    type Error = ConformanceError;

    fn try_from(raw: BandRepr) -> Result<Self> {
        Self::new(raw.minimum, raw.maximum)
    }
}

impl Band {
    pub fn new(minimum: f64, maximum: f64) -> Result<Self> {
        ensure_finite("band.minimum", minimum)?;
        ensure_finite("band.maximum", maximum)?;
        if minimum > maximum {
            return Err(ConformanceError::invalid(
                "band",
                format!("minimum ({minimum}) must be <= maximum ({maximum})"),
            ));
        }
        Ok(Self { minimum, maximum })
    }

    #[must_use]
    pub const fn minimum(&self) -> f64 {
        self.minimum
    }

    #[must_use]
    pub const fn maximum(&self) -> f64 {
        self.maximum
    }

    #[must_use]
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.minimum + self.maximum)
    }
}

/// How a band is turned into sample values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SamplingStrategy {
    Midpoint,
    MinMidMax,
}

/// Bands plus a sampling strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BandCoverageRepr")]
pub struct BandCoverage {
    bands: Vec<Band>,
    strategy: SamplingStrategy,
}

#[derive(Deserialize)]
struct BandCoverageRepr {
    bands: Vec<Band>,
    strategy: SamplingStrategy,
}

impl TryFrom<BandCoverageRepr> for BandCoverage {
    type Error = ConformanceError;

    fn try_from(raw: BandCoverageRepr) -> Result<Self> {
        Self::new(raw.bands, raw.strategy)
    }
}

impl BandCoverage {
    pub fn new(bands: Vec<Band>, strategy: SamplingStrategy) -> Result<Self> {
        if bands.is_empty() {
            return Err(ConformanceError::EmptyCollection {
                field: "coverage.bands",
            });
        }
        Ok(Self { bands, strategy })
    }

    #[must_use]
    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    #[must_use]
    pub const fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    /// Deduplicated, ascending sample set.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .bands
            .iter()
            .flat_map(|band| match self.strategy {
                SamplingStrategy::Midpoint => vec![band.midpoint()],
                SamplingStrategy::MinMidMax => {
                    vec![band.minimum(), band.midpoint(), band.maximum()]
                }
            })
            .collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        values
    }
}

/// Everything the plan builder needs to expand coverage into families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoverageRepr", rename_all = "camelCase")]
pub struct ConformanceCoverageConfig {
    duration: f64,
    delta_time: f64,
    step_time: f64,
    amplitude: BandCoverage,
    slope: BandCoverage,
    frequency: BandCoverage,
    seed_base: u64,
    perturbation_delta: f64,
    mode_induction_offsets: Vec<f64>,
    minimum_cutoff_hz: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoverageRepr {
    duration: f64,
    delta_time: f64,
    step_time: f64,
    amplitude: BandCoverage,
    slope: BandCoverage,
    frequency: BandCoverage,
    seed_base: u64,
    perturbation_delta: f64,
    mode_induction_offsets: Vec<f64>,
    minimum_cutoff_hz: f64,
}

impl TryFrom<CoverageRepr> for ConformanceCoverageConfig {
    type Error = ConformanceError;

    fn try_from(raw: CoverageRepr) -> Result<Self> {
        ConformanceCoverageConfigBuilder {
            duration: raw.duration,
            delta_time: raw.delta_time,
            step_time: raw.step_time,
            amplitude: raw.amplitude,
            slope: raw.slope,
            frequency: raw.frequency,
            seed_base: raw.seed_base,
            perturbation_delta: raw.perturbation_delta,
            mode_induction_offsets: raw.mode_induction_offsets,
            minimum_cutoff_hz: raw.minimum_cutoff_hz,
        }
        .build()
    }
}

/// Unvalidated field set; `build` enforces every invariant.
#[derive(Debug, Clone)]
pub struct ConformanceCoverageConfigBuilder {
    pub duration: f64,
    pub delta_time: f64,
    pub step_time: f64,
    pub amplitude: BandCoverage,
    pub slope: BandCoverage,
    pub frequency: BandCoverage,
    pub seed_base: u64,
    pub perturbation_delta: f64,
    pub mode_induction_offsets: Vec<f64>,
    pub minimum_cutoff_hz: f64,
}

impl ConformanceCoverageConfigBuilder {
    pub fn build(self) -> Result<ConformanceCoverageConfig> {
        ensure_positive("coverage.duration", self.duration)?;
        ensure_positive("coverage.deltaTime", self.delta_time)?;
        checked_frame_count(self.duration, self.delta_time)?;
        ensure_finite("coverage.stepTime", self.step_time)?;
        ensure_finite("coverage.perturbationDelta", self.perturbation_delta)?;
        ensure_positive("coverage.minimumCutoffHz", self.minimum_cutoff_hz)?;
        if self.mode_induction_offsets.is_empty() {
            return Err(ConformanceError::EmptyCollection {
                field: "coverage.modeInductionOffsets",
            });
        }
        for offset in &self.mode_induction_offsets {
            ensure_finite("coverage.modeInductionOffsets", *offset)?;
        }
        Ok(ConformanceCoverageConfig {
            duration: self.duration,
            delta_time: self.delta_time,
            step_time: self.step_time,
            amplitude: self.amplitude,
            slope: self.slope,
            frequency: self.frequency,
            seed_base: self.seed_base,
            perturbation_delta: self.perturbation_delta,
            mode_induction_offsets: self.mode_induction_offsets,
            minimum_cutoff_hz: self.minimum_cutoff_hz,
        })
    }
}

impl ConformanceCoverageConfig {
    /// Editable copy of the fields, for overrides followed by re-validation.
    #[must_use]
    pub fn to_builder(&self) -> ConformanceCoverageConfigBuilder {
        ConformanceCoverageConfigBuilder {
            duration: self.duration,
            delta_time: self.delta_time,
            step_time: self.step_time,
            amplitude: self.amplitude.clone(),
            slope: self.slope.clone(),
            frequency: self.frequency.clone(),
            seed_base: self.seed_base,
            perturbation_delta: self.perturbation_delta,
            mode_induction_offsets: self.mode_induction_offsets.clone(),
            minimum_cutoff_hz: self.minimum_cutoff_hz,
        }
    }

    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub const fn delta_time(&self) -> f64 {
        self.delta_time
    }

    #[must_use]
    pub const fn step_time(&self) -> f64 {
        self.step_time
    }

    #[must_use]
    pub const fn amplitude(&self) -> &BandCoverage {
        &self.amplitude
    }

    #[must_use]
    pub const fn slope(&self) -> &BandCoverage {
        &self.slope
    }

    #[must_use]
    pub const fn frequency(&self) -> &BandCoverage {
        &self.frequency
    }

    #[must_use]
    pub const fn seed_base(&self) -> u64 {
        self.seed_base
    }

    #[must_use]
    pub const fn perturbation_delta(&self) -> f64 {
        self.perturbation_delta
    }

    #[must_use]
    pub fn mode_induction_offsets(&self) -> &[f64] {
        &self.mode_induction_offsets
    }

    #[must_use]
    pub const fn minimum_cutoff_hz(&self) -> f64 {
        self.minimum_cutoff_hz
    }
}

impl Default for ConformanceCoverageConfig {
    fn default() -> Self {
        Self {
            duration: 2.0,
            delta_time: 0.01,
            step_time: 0.5,
            amplitude: BandCoverage {
                bands: vec![Band {
                    minimum: 0.25,
                    maximum: 1.0,
                }],
                strategy: SamplingStrategy::MinMidMax,
            },
            slope: BandCoverage {
                bands: vec![Band {
                    minimum: 0.1,
                    maximum: 0.5,
                }],
                strategy: SamplingStrategy::MinMidMax,
            },
            frequency: BandCoverage {
                bands: vec![Band {
                    minimum: 0.5,
                    maximum: 2.0,
                }],
                strategy: SamplingStrategy::MinMidMax,
            },
            seed_base: 0x4d41_4e41_5300_0001,
            perturbation_delta: 0.01,
            mode_induction_offsets: vec![0.0, 0.1, 0.2],
            minimum_cutoff_hz: 0.5,
        }
    }
}
