//! Richness checks on phase trajectories: variance floor and bandwidth ceiling.

use std::f64::consts::TAU;

use serde::Serialize;

use crate::checks::channel_columns;
use crate::core::errors::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseVarianceResult {
    pub variances: Vec<f64>,
    pub min_variance: f64,
    pub passes: bool,
}

/// Fails when any phase channel's population variance is below the floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseVarianceCheck {
    min_variance: f64,
}

impl PhaseVarianceCheck {
    #[must_use]
    pub const fn new(min_variance: f64) -> Self {
        Self { min_variance }
    }

    pub fn check(&self, series: &[Vec<f64>]) -> Result<PhaseVarianceResult> {
        let variances: Vec<f64> = channel_columns("phase.variance", series)?
            .iter()
            .map(|column| population_variance(column))
            .collect();
        let passes = variances.iter().all(|&v| v >= self.min_variance);
        Ok(PhaseVarianceResult {
            variances,
            min_variance: self.min_variance,
            passes,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
}

/// Derivative statistics for one phase channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelBandwidth {
    pub max_derivative: f64,
    pub amplitude: f64,
    pub bound: f64,
    pub passes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseBandwidthResult {
    pub bandwidth_hz: f64,
    pub channels: Vec<ChannelBandwidth>,
    pub passes: bool,
}

/// Bounds `max |dv/dt|` by `2π · bandwidth · max |v|` per channel.
///
/// A channel that never leaves zero has a zero bound, so any movement at all
/// fails it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBandwidthCheck {
    bandwidth_hz: f64,
    delta_time: f64,
}

impl PhaseBandwidthCheck {
    #[must_use]
    pub const fn new(bandwidth_hz: f64, delta_time: f64) -> Self {
        Self {
            bandwidth_hz,
            delta_time,
        }
    }

    pub fn check(&self, series: &[Vec<f64>]) -> Result<PhaseBandwidthResult> {
        let channels: Vec<ChannelBandwidth> = channel_columns("phase.bandwidth", series)?
            .iter()
            .map(|column| self.channel(column))
            .collect();
        let passes = channels.iter().all(|c| c.passes);
        Ok(PhaseBandwidthResult {
            bandwidth_hz: self.bandwidth_hz,
            channels,
            passes,
        })
    }

    fn channel(&self, values: &[f64]) -> ChannelBandwidth {
        let max_derivative = values
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).abs() / self.delta_time)
            .fold(0.0, f64::max);
        let amplitude = values.iter().fold(0.0, |acc: f64, v| acc.max(v.abs()));
        let bound = TAU * self.bandwidth_hz * amplitude;
        let passes = if amplitude == 0.0 {
            max_derivative == 0.0
        } else {
            max_derivative <= bound
        };
        ChannelBandwidth {
            max_derivative,
            amplitude,
            bound,
            passes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_exceeds_bandwidth() {
        let series = vec![vec![0.0], vec![1.0], vec![0.0]];
        let result = PhaseBandwidthCheck::new(1.0, 0.01).check(&series).unwrap();
        let channel = result.channels[0];
        assert!((channel.max_derivative - 100.0).abs() < 1e-9);
        assert!((channel.bound - TAU).abs() < 1e-12);
        assert!(!result.passes);
    }

    #[test]
    fn slow_sine_within_bandwidth() {
        let dt = 0.01;
        let series: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![(TAU * 0.5 * f64::from(i) * dt).sin()])
            .collect();
        let result = PhaseBandwidthCheck::new(1.0, dt).check(&series).unwrap();
        assert!(result.passes);
    }

    #[test]
    fn flat_zero_channel_passes_bandwidth() {
        let series = vec![vec![0.0]; 5];
        let result = PhaseBandwidthCheck::new(1.0, 0.1).check(&series).unwrap();
        assert_eq!(result.channels[0].bound, 0.0);
        assert!(result.passes);
    }

    #[test]
    fn variance_floor() {
        let series = vec![vec![1.0, 0.0], vec![1.0, 2.0], vec![1.0, 0.0], vec![1.0, 2.0]];
        let result = PhaseVarianceCheck::new(0.5).check(&series).unwrap();
        assert_eq!(result.variances, vec![0.0, 1.0]);
        assert!(!result.passes);

        let result = PhaseVarianceCheck::new(0.0).check(&series).unwrap();
        assert!(result.passes);
    }

    #[test]
    fn empty_trajectory_has_zero_variance() {
        assert_eq!(population_variance(&[]), 0.0);
    }
}
