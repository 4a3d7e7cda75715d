//! What was certified, against which configuration.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConformanceError, Result};
use crate::plan::coverage::ConformanceCoverageConfig;
use crate::suite::config::ConformanceSuiteConfig;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// Coverage plus tolerances: everything that shapes a verdict besides the
/// target itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceConfigBundle {
    pub coverage: ConformanceCoverageConfig,
    pub suite: ConformanceSuiteConfig,
}

impl ConformanceConfigBundle {
    #[must_use]
    pub const fn new(coverage: ConformanceCoverageConfig, suite: ConformanceSuiteConfig) -> Self {
        Self { coverage, suite }
    }

    /// Sorted-key compact JSON of the bundle.
    pub fn canonical_json(&self) -> Result<String> {
        canonical_json(self)
    }

    /// 64-bit FNV-1a over [`Self::canonical_json`], as 16 lowercase hex digits.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = self.canonical_json()?;
        Ok(format!("{:016x}", fnv1a64(canonical.as_bytes())))
    }
}

/// Serialize through `serde_json::Value`, whose object map keeps keys sorted,
/// so field declaration order never leaks into the encoding.
pub(crate) fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let tree = serde_json::to_value(value).map_err(|err| ConformanceError::Serialization {
        context: "canonical json",
        details: err.to_string(),
    })?;
    Ok(tree.to_string())
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Identity of a certification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceSuiteContext {
    pub oed_id: String,
    pub oed_version: String,
    pub suite_version: String,
    pub config_hash: String,
}

impl ConformanceSuiteContext {
    pub fn new(
        oed_id: impl Into<String>,
        oed_version: impl Into<String>,
        suite_version: impl Into<String>,
        bundle: &ConformanceConfigBundle,
    ) -> Result<Self> {
        Ok(Self {
            oed_id: oed_id.into(),
            oed_version: oed_version.into(),
            suite_version: suite_version.into(),
            config_hash: bundle.stable_hash()?,
        })
    }

    /// Whether `bundle` is the configuration this context was issued for.
    pub fn matches(&self, bundle: &ConformanceConfigBundle) -> Result<bool> {
        Ok(self.config_hash == bundle.stable_hash()?)
    }
}
