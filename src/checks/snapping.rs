//! Quantization detection for output and phase trajectories.
//!
//! Both checks cluster each channel's trajectory independently and fail when
//! any channel collapses to `max_clusters` or fewer distinct values. For
//! outputs that means the policy snaps its command; for phase stimuli it
//! means the stimulus itself is too coarse to certify anything.

use serde::Serialize;

use crate::checks::channel_columns;
use crate::checks::clustering::scalar_cluster_count;
use crate::core::errors::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnappingResult {
    /// Cluster count per channel, in channel order.
    pub cluster_counts: Vec<usize>,
    pub max_clusters: usize,
    pub passes: bool,
}

fn cluster_check(
    context: &'static str,
    series: &[Vec<f64>],
    epsilon: f64,
    max_clusters: usize,
) -> Result<SnappingResult> {
    let cluster_counts: Vec<usize> = channel_columns(context, series)?
        .into_iter()
        .map(|column| scalar_cluster_count(column, epsilon))
        .collect();
    let passes = cluster_counts.iter().all(|&count| count > max_clusters);
    Ok(SnappingResult {
        cluster_counts,
        max_clusters,
        passes,
    })
}

/// Applied to normalized drive outputs (or drive residuals).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputSnappingCheck {
    epsilon: f64,
    max_clusters: usize,
}

impl OutputSnappingCheck {
    #[must_use]
    pub const fn new(epsilon: f64, max_clusters: usize) -> Self {
        Self {
            epsilon,
            max_clusters,
        }
    }

    pub fn check(&self, series: &[Vec<f64>]) -> Result<SnappingResult> {
        cluster_check("snapping.output", series, self.epsilon, self.max_clusters)
    }
}

/// Applied to normalized phase trajectories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSnappingCheck {
    epsilon: f64,
    max_clusters: usize,
}

impl PhaseSnappingCheck {
    #[must_use]
    pub const fn new(epsilon: f64, max_clusters: usize) -> Self {
        Self {
            epsilon,
            max_clusters,
        }
    }

    pub fn check(&self, series: &[Vec<f64>]) -> Result<SnappingResult> {
        cluster_check("snapping.phase", series, self.epsilon, self.max_clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_constant_outputs_are_snapped() {
        let series = vec![vec![0.0, 1.0], vec![0.01, 0.99], vec![0.0, 1.02]];
        let result = OutputSnappingCheck::new(0.05, 2).check(&series).unwrap();
        assert_eq!(result.cluster_counts, vec![1, 1]);
        assert!(!result.passes);
    }

    #[test]
    fn smooth_sweep_passes() {
        let series: Vec<Vec<f64>> = (0..50).map(|i| vec![f64::from(i) * 0.1]).collect();
        let result = OutputSnappingCheck::new(0.05, 2).check(&series).unwrap();
        assert_eq!(result.cluster_counts, vec![50]);
        assert!(result.passes);
    }

    #[test]
    fn one_quantized_channel_fails_the_whole_check() {
        let series: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let smooth = f64::from(i) * 0.2;
                let stepped = if i < 10 { 0.0 } else { 1.0 };
                vec![smooth, stepped]
            })
            .collect();
        let result = OutputSnappingCheck::new(0.05, 2).check(&series).unwrap();
        assert_eq!(result.cluster_counts, vec![20, 2]);
        assert!(!result.passes);
    }

    #[test]
    fn cluster_count_equal_to_cap_fails() {
        let series = vec![vec![0.0], vec![1.0], vec![2.0]];
        assert!(!PhaseSnappingCheck::new(0.1, 3).check(&series).unwrap().passes);
        assert!(PhaseSnappingCheck::new(0.1, 2).check(&series).unwrap().passes);
    }

    #[test]
    fn no_channels_passes_vacuously() {
        let result = PhaseSnappingCheck::new(0.1, 2).check(&[]).unwrap();
        assert!(result.cluster_counts.is_empty());
        assert!(result.passes);
    }
}
