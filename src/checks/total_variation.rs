//! Accumulated output movement over a run.

use serde::Serialize;

use crate::checks::rows_of_equal_width;
use crate::core::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalVariationResult {
    pub total_variation: f64,
    pub limit: f64,
    pub passes: bool,
}

/// Sum of L1 norms of consecutive output differences, bounded by `limit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalVariationCheck {
    limit: f64,
}

impl TotalVariationCheck {
    #[must_use]
    pub const fn new(limit: f64) -> Self {
        Self { limit }
    }

    pub fn check(&self, series: &[Vec<f64>]) -> Result<TotalVariationResult> {
        rows_of_equal_width("total_variation.series", series)?;
        let total_variation: f64 = series
            .windows(2)
            .map(|pair| {
                pair[0]
                    .iter()
                    .zip(&pair[1])
                    .map(|(a, b)| (b - a).abs())
                    .sum::<f64>()
            })
            .sum();
        Ok(TotalVariationResult {
            total_variation,
            limit: self.limit,
            passes: total_variation <= self.limit,
        })
    }
}
