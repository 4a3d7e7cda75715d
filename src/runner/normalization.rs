//! Per-channel scale factors mapping raw vectors into a common unit.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConformanceError, Result};

/// One `index -> scale` entry as it appears in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleEntry<I> {
    pub index: I,
    pub scale: f64,
}

/// Index to positive scale. Normalizing divides each value by its scale and
/// requires exactly the declared index set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "Vec<ScaleEntry<I>>",
    into = "Vec<ScaleEntry<I>>",
    bound(
        serialize = "I: Serialize + Clone",
        deserialize = "I: Deserialize<'de> + Ord + Copy + fmt::Display"
    )
)]
pub struct NormalizationMap<I: Ord> {
    scales: BTreeMap<I, f64>,
}

impl<I: Ord + Copy + fmt::Display> NormalizationMap<I> {
    pub fn new(scales: BTreeMap<I, f64>) -> Result<Self> {
        if scales.is_empty() {
            return Err(ConformanceError::EmptyCollection {
                field: "normalization.scales",
            });
        }
        for (index, scale) in &scales {
            if !scale.is_finite() || *scale <= 0.0 {
                return Err(ConformanceError::InvalidScale {
                    index: index.to_string(),
                    scale: *scale,
                });
            }
        }
        Ok(Self { scales })
    }

    /// Same scale for every listed index.
    pub fn uniform(indices: impl IntoIterator<Item = I>, scale: f64) -> Result<Self> {
        Self::new(indices.into_iter().map(|i| (i, scale)).collect())
    }

    /// Unit scale for indices `0..count`; a zero count still declares index 0.
    #[must_use]
    pub fn unit_range(count: u8) -> Self
    where
        I: From<u8>,
    {
        Self {
            scales: (0..count.max(1)).map(|raw| (I::from(raw), 1.0)).collect(),
        }
    }

    /// Declared indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = I> + '_ {
        self.scales.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scales.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    #[must_use]
    pub fn scale(&self, index: I) -> Option<f64> {
        self.scales.get(&index).copied()
    }

    /// `value / scale` for every declared index, in ascending index order.
    ///
    /// Fails with `UnexpectedValue` for an undeclared (or repeated) index and
    /// `MissingValue` for a declared index that is absent.
    pub fn normalized_vector(&self, values: impl IntoIterator<Item = (I, f64)>) -> Result<Vec<f64>> {
        let mut provided = BTreeMap::new();
        for (index, value) in values {
            if !self.scales.contains_key(&index) || provided.insert(index, value).is_some() {
                return Err(ConformanceError::UnexpectedValue {
                    index: index.to_string(),
                });
            }
        }
        self.scales
            .iter()
            .map(|(index, scale)| {
                provided
                    .get(index)
                    .map(|value| value / scale)
                    .ok_or_else(|| ConformanceError::MissingValue {
                        index: index.to_string(),
                    })
            })
            .collect()
    }
}

impl<I: Ord + Copy + fmt::Display> TryFrom<Vec<ScaleEntry<I>>> for NormalizationMap<I> {
    type Error = ConformanceError;

    fn try_from(entries: Vec<ScaleEntry<I>>) -> Result<Self> {
        let mut scales = BTreeMap::new();
        for entry in entries {
            if scales.insert(entry.index, entry.scale).is_some() {
                return Err(ConformanceError::invalid(
                    entry.index.to_string(),
                    "scale declared more than once",
                ));
            }
        }
        Self::new(scales)
    }
}

impl<I: Ord + Clone> From<NormalizationMap<I>> for Vec<ScaleEntry<I>> {
    fn from(map: NormalizationMap<I>) -> Self {
        map.scales
            .into_iter()
            .map(|(index, scale)| ScaleEntry { index, scale })
            .collect()
    }
}
