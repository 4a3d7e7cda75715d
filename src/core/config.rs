//! Certification configuration: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::channels::{DriveIndex, EnergyIndex, PhaseIndex};
use crate::core::errors::{ConformanceError, Result};
use crate::plan::coverage::ConformanceCoverageConfig;
use crate::runner::conformance::ConformanceRunner;
use crate::runner::normalization::NormalizationMap;
use crate::runner::target::ConformanceTarget;
use crate::suite::config::ConformanceSuiteConfig;
use crate::suite::engine::{ConformanceSuiteEngine, OperatingEnvelope};
use crate::suite::report::{ManasConformanceRunner, ReportIdentity};

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "manas-cert.toml";

/// Full certification configuration model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertificationConfig {
    pub identity: ReportIdentity,
    pub envelope: OperatingEnvelope,
    pub normalization: NormalizationConfig,
    pub coverage: ConformanceCoverageConfig,
    pub suite: ConformanceSuiteConfig,
}

/// Channel scale tables for the three vector kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationConfig {
    pub energy: NormalizationMap<EnergyIndex>,
    pub phase: NormalizationMap<PhaseIndex>,
    pub drive: NormalizationMap<DriveIndex>,
}

impl Default for NormalizationConfig {
    /// Three energies, two phases, two drives, all at unit scale.
    fn default() -> Self {
        Self {
            energy: NormalizationMap::unit_range(3),
            phase: NormalizationMap::unit_range(2),
            drive: NormalizationMap::unit_range(2),
        }
    }
}

impl Default for ReportIdentity {
    fn default() -> Self {
        Self {
            implementation_id: "manas-reference".to_string(),
            implementation_version: env!("CARGO_PKG_VERSION").to_string(),
            badges: vec![
                "continuity".to_string(),
                "total-variation".to_string(),
                "snapping".to_string(),
                "phase".to_string(),
                "mode-induction".to_string(),
            ],
            suite_version: "manas-conformance-1".to_string(),
        }
    }
}

impl Default for CertificationConfig {
    fn default() -> Self {
        Self {
            identity: ReportIdentity::default(),
            envelope: OperatingEnvelope::default(),
            normalization: NormalizationConfig::default(),
            coverage: ConformanceCoverageConfig::default(),
            suite: ConformanceSuiteConfig::default(),
        }
    }
}

impl CertificationConfig {
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file at the default path falls back to defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw =
                fs::read_to_string(&path_buf).map_err(|source| ConformanceError::io(&path_buf, source))?;
            toml::from_str(&raw)?
        } else if path.is_some() {
            return Err(ConformanceError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Pretty TOML rendering, suitable as a starting config file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| ConformanceError::Serialization {
            context: "toml",
            details: err.to_string(),
        })
    }

    /// Engine and identity wired together.
    #[must_use]
    pub fn certifier(&self) -> ManasConformanceRunner {
        ManasConformanceRunner::new(
            ConformanceSuiteEngine::new(
                self.coverage.clone(),
                self.suite.clone(),
                self.envelope.clone(),
            ),
            self.identity.clone(),
        )
    }

    /// A runner that owns `target` and normalizes with this config's scales.
    pub fn runner<T: ConformanceTarget>(&self, target: T) -> ConformanceRunner<T> {
        ConformanceRunner::new(
            target,
            self.normalization.energy.clone(),
            self.normalization.phase.clone(),
            self.normalization.drive.clone(),
        )
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let seed_base = lookup("MANAS_CERT_SEED_BASE")
            .map(|raw| parse_env::<u64>("MANAS_CERT_SEED_BASE", &raw))
            .transpose()?;
        let duration = lookup("MANAS_CERT_DURATION")
            .map(|raw| parse_env::<f64>("MANAS_CERT_DURATION", &raw))
            .transpose()?;
        let delta_time = lookup("MANAS_CERT_DELTA_TIME")
            .map(|raw| parse_env::<f64>("MANAS_CERT_DELTA_TIME", &raw))
            .transpose()?;

        if seed_base.is_some() || duration.is_some() || delta_time.is_some() {
            let mut coverage = self.coverage.to_builder();
            if let Some(seed_base) = seed_base {
                coverage.seed_base = seed_base;
            }
            if let Some(duration) = duration {
                coverage.duration = duration;
            }
            if let Some(delta_time) = delta_time {
                coverage.delta_time = delta_time;
            }
            self.coverage = coverage.build()?;
        }

        if let Some(raw) = lookup("MANAS_CERT_UPDATE_RATE_HZ") {
            let rate = parse_env::<f64>("MANAS_CERT_UPDATE_RATE_HZ", &raw)?;
            self.envelope = self.envelope.clone().with_update_rate_hz(rate)?;
        }

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let identity = &self.identity;
        if identity.implementation_id.trim().is_empty() {
            return Err(ConformanceError::InvalidConfig {
                details: "identity.implementationId must not be blank".to_string(),
            });
        }
        if identity.implementation_version.trim().is_empty() {
            return Err(ConformanceError::InvalidConfig {
                details: "identity.implementationVersion must not be blank".to_string(),
            });
        }
        if identity.suite_version.trim().is_empty() {
            return Err(ConformanceError::InvalidConfig {
                details: "identity.suiteVersion must not be blank".to_string(),
            });
        }
        if identity.badges.is_empty() || identity.badges.iter().any(|b| b.trim().is_empty()) {
            return Err(ConformanceError::InvalidConfig {
                details: "identity.badges must be a non-empty list of non-blank names".to_string(),
            });
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| ConformanceError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{CertificationConfig, ConformanceError};
    use std::collections::HashMap;
    use std::path::Path;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        let cfg = CertificationConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.normalization.energy.len(), 3);
        assert_eq!(cfg.normalization.phase.len(), 2);
        assert_eq!(cfg.normalization.drive.len(), 2);
        assert!((cfg.envelope.expected_delta_time() - cfg.coverage.delta_time()).abs() < 1e-12);
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let cfg = CertificationConfig::default();
        let text = cfg.to_toml().unwrap();
        let back: CertificationConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn load_reads_file_and_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.toml");
        std::fs::write(
            &path,
            r#"
[identity]
implementationId = "reflex-arc"
implementationVersion = "0.9.0"
badges = ["continuity"]
suiteVersion = "lab-7"

[envelope]
oedId = "bench-rig"
oedVersion = "3"
updateRateHz = 100.0
"#,
        )
        .unwrap();

        let cfg = CertificationConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.identity.implementation_id, "reflex-arc");
        assert_eq!(cfg.envelope.oed_id(), "bench-rig");
        assert_eq!(cfg.coverage, super::ConformanceCoverageConfig::default());
    }

    #[test]
    fn invalid_section_fails_at_parse_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            r#"
[normalization]
energy = [{ index = 0, scale = 0.0 }]
phase = [{ index = 0, scale = 1.0 }]
drive = [{ index = 0, scale = 1.0 }]
"#,
        )
        .unwrap();
        let err = CertificationConfig::load(Some(&path)).unwrap_err();
        assert_eq!(err.code(), "MCF-1003");
    }

    #[test]
    fn load_returns_error_for_explicit_missing_path() {
        let err = CertificationConfig::load(Some(Path::new("/nonexistent/manas/cert.toml")))
            .unwrap_err();
        assert!(matches!(err, ConformanceError::MissingConfig { .. }));
    }

    #[test]
    fn env_overrides_rebuild_validated_sections() {
        let mut cfg = CertificationConfig::default();
        let env = vars(&[
            ("MANAS_CERT_SEED_BASE", "42"),
            ("MANAS_CERT_DURATION", "1.5"),
            ("MANAS_CERT_UPDATE_RATE_HZ", "50"),
        ]);
        cfg.apply_env_overrides_from(|name| env.get(name).cloned())
            .unwrap();
        assert_eq!(cfg.coverage.seed_base(), 42);
        assert_eq!(cfg.coverage.duration(), 1.5);
        assert_eq!(cfg.envelope.update_rate_hz(), 50.0);
    }

    #[test]
    fn env_override_malformed_value_rejected() {
        let mut cfg = CertificationConfig::default();
        let env = vars(&[("MANAS_CERT_DELTA_TIME", "fast")]);
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .unwrap_err();
        assert!(matches!(err, ConformanceError::ConfigParse { context: "env", .. }));
    }

    #[test]
    fn env_override_out_of_range_value_rejected() {
        let mut cfg = CertificationConfig::default();
        let env = vars(&[("MANAS_CERT_DELTA_TIME", "-0.01")]);
        let err = cfg
            .apply_env_overrides_from(|name| env.get(name).cloned())
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn empty_badges_rejected() {
        let mut cfg = CertificationConfig::default();
        cfg.identity.badges.clear();
        assert!(cfg.validate().is_err());
    }
}
