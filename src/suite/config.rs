//! Checker tolerances for one certification run.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConformanceError, Result, ensure_non_negative};

/// Validated tolerances for all seven checkers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ConformanceSuiteConfigBuilder", rename_all = "camelCase")]
pub struct ConformanceSuiteConfig {
    l2_gain: f64,
    l_inf_gain: f64,
    total_variation_limit: f64,
    snapping_epsilon: f64,
    snapping_max_clusters: usize,
    min_phase_variance: f64,
    phase_bandwidth_hz: f64,
    phase_snapping_epsilon: f64,
    phase_snapping_max_clusters: usize,
    mode_induction_epsilon: f64,
    mode_induction_max_modes: usize,
    steady_window_size: usize,
}

/// Unvalidated tolerances; also the on-disk shape of the `suite` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceSuiteConfigBuilder {
    pub l2_gain: f64,
    pub l_inf_gain: f64,
    pub total_variation_limit: f64,
    pub snapping_epsilon: f64,
    pub snapping_max_clusters: usize,
    pub min_phase_variance: f64,
    pub phase_bandwidth_hz: f64,
    pub phase_snapping_epsilon: f64,
    pub phase_snapping_max_clusters: usize,
    pub mode_induction_epsilon: f64,
    pub mode_induction_max_modes: usize,
    pub steady_window_size: usize,
}

impl ConformanceSuiteConfigBuilder {
    pub fn build(self) -> Result<ConformanceSuiteConfig> {
        ensure_non_negative("suite.l2Gain", self.l2_gain)?;
        ensure_non_negative("suite.lInfGain", self.l_inf_gain)?;
        ensure_non_negative("suite.totalVariationLimit", self.total_variation_limit)?;
        ensure_non_negative("suite.snappingEpsilon", self.snapping_epsilon)?;
        ensure_non_negative("suite.minPhaseVariance", self.min_phase_variance)?;
        ensure_non_negative("suite.phaseBandwidthHz", self.phase_bandwidth_hz)?;
        ensure_non_negative("suite.phaseSnappingEpsilon", self.phase_snapping_epsilon)?;
        ensure_non_negative("suite.modeInductionEpsilon", self.mode_induction_epsilon)?;
        if self.steady_window_size == 0 {
            return Err(ConformanceError::invalid(
                "suite.steadyWindowSize",
                "must be >= 1",
            ));
        }
        Ok(ConformanceSuiteConfig {
            l2_gain: self.l2_gain,
            l_inf_gain: self.l_inf_gain,
            total_variation_limit: self.total_variation_limit,
            snapping_epsilon: self.snapping_epsilon,
            snapping_max_clusters: self.snapping_max_clusters,
            min_phase_variance: self.min_phase_variance,
            phase_bandwidth_hz: self.phase_bandwidth_hz,
            phase_snapping_epsilon: self.phase_snapping_epsilon,
            phase_snapping_max_clusters: self.phase_snapping_max_clusters,
            mode_induction_epsilon: self.mode_induction_epsilon,
            mode_induction_max_modes: self.mode_induction_max_modes,
            steady_window_size: self.steady_window_size,
        })
    }
}

impl TryFrom<ConformanceSuiteConfigBuilder> for ConformanceSuiteConfig {
    type Error = ConformanceError;

    fn try_from(builder: ConformanceSuiteConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

impl ConformanceSuiteConfig {
    #[must_use]
    pub const fn to_builder(&self) -> ConformanceSuiteConfigBuilder {
        ConformanceSuiteConfigBuilder {
            l2_gain: self.l2_gain,
            l_inf_gain: self.l_inf_gain,
            total_variation_limit: self.total_variation_limit,
            snapping_epsilon: self.snapping_epsilon,
            snapping_max_clusters: self.snapping_max_clusters,
            min_phase_variance: self.min_phase_variance,
            phase_bandwidth_hz: self.phase_bandwidth_hz,
            phase_snapping_epsilon: self.phase_snapping_epsilon,
            phase_snapping_max_clusters: self.phase_snapping_max_clusters,
            mode_induction_epsilon: self.mode_induction_epsilon,
            mode_induction_max_modes: self.mode_induction_max_modes,
            steady_window_size: self.steady_window_size,
        }
    }

    #[must_use]
    pub const fn l2_gain(&self) -> f64 {
        self.l2_gain
    }

    #[must_use]
    pub const fn l_inf_gain(&self) -> f64 {
        self.l_inf_gain
    }

    #[must_use]
    pub const fn total_variation_limit(&self) -> f64 {
        self.total_variation_limit
    }

    #[must_use]
    pub const fn snapping_epsilon(&self) -> f64 {
        self.snapping_epsilon
    }

    #[must_use]
    pub const fn snapping_max_clusters(&self) -> usize {
        self.snapping_max_clusters
    }

    #[must_use]
    pub const fn min_phase_variance(&self) -> f64 {
        self.min_phase_variance
    }

    #[must_use]
    pub const fn phase_bandwidth_hz(&self) -> f64 {
        self.phase_bandwidth_hz
    }

    #[must_use]
    pub const fn phase_snapping_epsilon(&self) -> f64 {
        self.phase_snapping_epsilon
    }

    #[must_use]
    pub const fn phase_snapping_max_clusters(&self) -> usize {
        self.phase_snapping_max_clusters
    }

    #[must_use]
    pub const fn mode_induction_epsilon(&self) -> f64 {
        self.mode_induction_epsilon
    }

    #[must_use]
    pub const fn mode_induction_max_modes(&self) -> usize {
        self.mode_induction_max_modes
    }

    #[must_use]
    pub const fn steady_window_size(&self) -> usize {
        self.steady_window_size
    }
}

impl Default for ConformanceSuiteConfig {
    fn default() -> Self {
        Self {
            l2_gain: 1.0,
            l_inf_gain: 1.0,
            total_variation_limit: 20.0,
            snapping_epsilon: 0.0001,
            snapping_max_clusters: 2,
            min_phase_variance: 1e-5,
            phase_bandwidth_hz: 10.0,
            phase_snapping_epsilon: 0.001,
            phase_snapping_max_clusters: 2,
            mode_induction_epsilon: 0.02,
            mode_induction_max_modes: 2,
            steady_window_size: 20,
        }
    }
}
