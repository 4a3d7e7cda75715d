//! Stateless property checkers over normalized trajectories.
//!
//! Every checker takes time-major rows (`series[frame][channel]`) plus its
//! tolerances and returns a serializable result with a `passes` verdict.

#![allow(missing_docs)]

pub mod clustering;
pub mod continuity;
pub mod mode_induction;
pub mod phase;
pub mod snapping;
pub mod total_variation;

pub use continuity::{ContinuityCheck, ContinuityResult, ContinuitySample};
pub use mode_induction::{ModeInductionCheck, ModeInductionResult, steady_state};
pub use phase::{
    ChannelBandwidth, PhaseBandwidthCheck, PhaseBandwidthResult, PhaseVarianceCheck,
    PhaseVarianceResult,
};
pub use snapping::{OutputSnappingCheck, PhaseSnappingCheck, SnappingResult};
pub use total_variation::{TotalVariationCheck, TotalVariationResult};

use crate::core::errors::{ConformanceError, Result};

/// Row width shared by every row, or zero for an empty series.
pub(crate) fn rows_of_equal_width(context: &'static str, series: &[Vec<f64>]) -> Result<usize> {
    let width = series.first().map_or(0, Vec::len);
    if let Some(row) = series.iter().find(|row| row.len() != width) {
        return Err(ConformanceError::DimensionMismatch {
            context,
            expected: width,
            actual: row.len(),
        });
    }
    Ok(width)
}

/// Transpose time-major rows into one trajectory per channel.
pub(crate) fn channel_columns(context: &'static str, series: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let width = rows_of_equal_width(context, series)?;
    Ok((0..width)
        .map(|channel| series.iter().map(|row| row[channel]).collect())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_transpose_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let cols = channel_columns("test", &rows).unwrap();
        assert_eq!(cols, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
    }

    #[test]
    fn empty_series_has_no_columns() {
        assert!(channel_columns("test", &[]).unwrap().is_empty());
    }

    #[test]
    fn ragged_rows_report_offending_width() {
        let err = rows_of_equal_width("test", &[vec![0.0; 3], vec![0.0; 3], vec![0.0; 1]])
            .unwrap_err();
        match err {
            ConformanceError::DimensionMismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
