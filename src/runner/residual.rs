//! Separates a policy's own output shaping from naive safety filtering.
//!
//! The reference for each drive is the raw command clamped to its range, then
//! rate-limited against the previous reference by `max_rate * delta_time`.
//! The residual `raw - reference` is what a learned correction contributes on
//! top of saturation and slew artifacts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::channels::{DriveIndex, DriveIntent};
use crate::core::errors::{ConformanceError, Result, ensure_finite, ensure_non_negative};

/// Saturation range and slew limit of one drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "DriveLimitEntry")]
pub struct DriveLimit {
    minimum: f64,
    maximum: f64,
    max_rate: f64,
}

impl DriveLimit {
    pub fn new(minimum: f64, maximum: f64, max_rate: f64) -> Result<Self> {
        ensure_finite("drive_limit.minimum", minimum)?;
        ensure_finite("drive_limit.maximum", maximum)?;
        ensure_non_negative("drive_limit.max_rate", max_rate)?;
        if minimum > maximum {
            return Err(ConformanceError::invalid(
                "drive_limit",
                format!("minimum {minimum} exceeds maximum {maximum}"),
            ));
        }
        Ok(Self {
            minimum,
            maximum,
            max_rate,
        })
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
    pub const fn max_rate(&self) -> f64 {
        self.max_rate
    }

    fn reference(&self, raw: f64, previous: Option<f64>, delta_time: f64) -> f64 {
        let clamped = raw.clamp(self.minimum, self.maximum);
        previous.map_or(clamped, |prev| {
            let step = self.max_rate * delta_time;
            prev + (clamped - prev).clamp(-step, step)
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveLimitEntry {
    minimum: f64,
    maximum: f64,
    max_rate: f64,
}

impl TryFrom<DriveLimitEntry> for DriveLimit {
    type Error = ConformanceError;

    fn try_from(entry: DriveLimitEntry) -> Result<Self> {
        Self::new(entry.minimum, entry.maximum, entry.max_rate)
    }
}

/// One row of a drive limit table in configuration files.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveLimitRecord {
    pub index: DriveIndex,
    pub minimum: f64,
    pub maximum: f64,
    pub max_rate: f64,
}

/// Limits keyed by drive index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<DriveLimitRecord>", into = "Vec<DriveLimitRecord>")]
pub struct DriveResidualModel {
    limits: BTreeMap<DriveIndex, DriveLimit>,
}

impl TryFrom<Vec<DriveLimitRecord>> for DriveResidualModel {
    type Error = ConformanceError;

    fn try_from(records: Vec<DriveLimitRecord>) -> Result<Self> {
        let mut limits = BTreeMap::new();
        for record in records {
            let limit = DriveLimit::new(record.minimum, record.maximum, record.max_rate)?;
            if limits.insert(record.index, limit).is_some() {
                return Err(ConformanceError::invalid(
                    record.index.to_string(),
                    "drive limit declared more than once",
                ));
            }
        }
        Ok(Self { limits })
    }
}

impl From<DriveResidualModel> for Vec<DriveLimitRecord> {
    fn from(model: DriveResidualModel) -> Self {
        model
            .limits
            .into_iter()
            .map(|(index, limit)| DriveLimitRecord {
                index,
                minimum: limit.minimum,
                maximum: limit.maximum,
                max_rate: limit.max_rate,
            })
            .collect()
    }
}

impl DriveResidualModel {
    #[must_use]
    pub const fn new(limits: BTreeMap<DriveIndex, DriveLimit>) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limit(&self, index: DriveIndex) -> Option<&DriveLimit> {
        self.limits.get(&index)
    }

    /// Fail unless every listed drive has a limit.
    pub fn ensure_covers(&self, drives: impl IntoIterator<Item = DriveIndex>) -> Result<()> {
        for index in drives {
            if !self.limits.contains_key(&index) {
                return Err(ConformanceError::MissingDriveLimit {
                    index: index.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Per-frame `(index, raw - reference)` pairs for a recorded output series.
    pub fn residuals(
        &self,
        outputs: &[Vec<DriveIntent>],
        delta_time: f64,
    ) -> Result<Vec<Vec<(DriveIndex, f64)>>> {
        let mut previous: BTreeMap<DriveIndex, f64> = BTreeMap::new();
        outputs
            .iter()
            .map(|frame| -> Result<Vec<(DriveIndex, f64)>> {
                frame
                    .iter()
                    .map(|intent| -> Result<(DriveIndex, f64)> {
                        let index = intent.index();
                        let limit = self.limits.get(&index).ok_or_else(|| {
                            ConformanceError::MissingDriveLimit {
                                index: index.to_string(),
                            }
                        })?;
                        let raw = intent.activation();
                        let reference =
                            limit.reference(raw, previous.get(&index).copied(), delta_time);
                        previous.insert(index, reference);
                        Ok((index, raw - reference))
                    })
                    .collect()
            })
            .collect()
    }
}
