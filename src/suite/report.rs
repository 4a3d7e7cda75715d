//! The externally persisted certification artifact and the runner that
//! produces it.

#![allow(missing_docs)]

use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::{ConformanceError, Result};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::runner::conformance::ConformanceRunner;
use crate::runner::target::ConformanceTarget;
use crate::suite::context::{ConformanceConfigBundle, ConformanceSuiteContext, canonical_json};
use crate::suite::engine::{ConformanceSuiteEngine, ConformanceSuiteReport, ConformanceSuiteSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pass,
    Fail,
}

impl ReportStatus {
    #[must_use]
    pub const fn from_summary(summary: &ConformanceSuiteSummary) -> Self {
        if summary.passes { Self::Pass } else { Self::Fail }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        })
    }
}

/// Signed certification artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceReport {
    pub implementation_id: String,
    pub implementation_version: String,
    pub badges: Vec<String>,
    pub context: ConformanceSuiteContext,
    pub summary: ConformanceSuiteSummary,
    pub status: ReportStatus,
}

impl ConformanceReport {
    /// Sorted-key compact JSON, the form the digest is computed over.
    pub fn canonical_json(&self) -> Result<String> {
        canonical_json(self)
    }

    /// Lowercase hex SHA-256 of [`Self::canonical_json`].
    pub fn digest(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_json()?.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Check the invariants a consumer relies on after loading a report.
    pub fn verify(&self) -> Result<()> {
        if self.badges.is_empty() {
            return Err(ConformanceError::EmptyCollection {
                field: "report.badges",
            });
        }
        if !self.summary.is_consistent() {
            return Err(ConformanceError::invalid(
                "report.summary",
                "overall verdict is not the AND of the category verdicts",
            ));
        }
        let derived = ReportStatus::from_summary(&self.summary);
        if self.status != derived {
            return Err(ConformanceError::invalid(
                "report.status",
                format!("recorded {} but summary implies {derived}", self.status),
            ));
        }
        Ok(())
    }
}

/// Assembles a [`ConformanceReport`]; the context is mandatory.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReportBuilder {
    implementation_id: String,
    implementation_version: String,
    badges: Vec<String>,
    context: Option<ConformanceSuiteContext>,
}

impl ConformanceReportBuilder {
    #[must_use]
    pub fn new(implementation_id: impl Into<String>, implementation_version: impl Into<String>) -> Self {
        Self {
            implementation_id: implementation_id.into(),
            implementation_version: implementation_version.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badges.push(badge.into());
        self
    }

    #[must_use]
    pub fn badges(mut self, badges: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.badges.extend(badges.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn context(mut self, context: ConformanceSuiteContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self, summary: ConformanceSuiteSummary) -> Result<ConformanceReport> {
        let context = self.context.ok_or(ConformanceError::MissingContext)?;
        if self.implementation_id.trim().is_empty() {
            return Err(ConformanceError::invalid(
                "report.implementationId",
                "must not be blank",
            ));
        }
        if self.badges.is_empty() {
            return Err(ConformanceError::EmptyCollection {
                field: "report.badges",
            });
        }
        Ok(ConformanceReport {
            implementation_id: self.implementation_id,
            implementation_version: self.implementation_version,
            badges: self.badges,
            context,
            status: ReportStatus::from_summary(&summary),
            summary,
        })
    }
}

/// Who is being certified and under which suite version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportIdentity {
    pub implementation_id: String,
    pub implementation_version: String,
    pub badges: Vec<String>,
    pub suite_version: String,
}

/// The report together with the detailed results it summarizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Certification {
    pub report: ConformanceReport,
    pub suite: ConformanceSuiteReport,
}

/// Engine plus identity: the top-level certification entry point.
#[derive(Debug, Clone)]
pub struct ManasConformanceRunner {
    engine: ConformanceSuiteEngine,
    identity: ReportIdentity,
}

impl ManasConformanceRunner {
    #[must_use]
    pub const fn new(engine: ConformanceSuiteEngine, identity: ReportIdentity) -> Self {
        Self { engine, identity }
    }

    #[must_use]
    pub const fn engine(&self) -> &ConformanceSuiteEngine {
        &self.engine
    }

    #[must_use]
    pub const fn identity(&self) -> &ReportIdentity {
        &self.identity
    }

    #[must_use]
    pub fn bundle(&self) -> ConformanceConfigBundle {
        ConformanceConfigBundle::new(self.engine.coverage().clone(), self.engine.suite().clone())
    }

    pub fn context(&self) -> Result<ConformanceSuiteContext> {
        let envelope = self.engine.envelope();
        ConformanceSuiteContext::new(
            envelope.oed_id(),
            envelope.oed_version(),
            self.identity.suite_version.clone(),
            &self.bundle(),
        )
    }

    pub fn run<T: ConformanceTarget>(&self, runner: &mut ConformanceRunner<T>) -> Result<Certification> {
        let context = self.context()?;
        let suite = self.engine.run(runner)?;
        let report = ConformanceReportBuilder::new(
            self.identity.implementation_id.clone(),
            self.identity.implementation_version.clone(),
        )
        .badges(self.identity.badges.iter().cloned())
        .context(context)
        .build(suite.summary)?;
        Ok(Certification { report, suite })
    }

    /// [`Self::run`] with certification events written to `log`.
    pub fn run_logged<T: ConformanceTarget>(
        &self,
        runner: &mut ConformanceRunner<T>,
        log: &mut JsonlWriter,
    ) -> Result<Certification> {
        let started = Instant::now();
        let mut start = LogEntry::new(EventType::CertificationStart, Severity::Info);
        start.implementation_id = Some(self.identity.implementation_id.clone());
        start.oed_id = Some(self.engine.envelope().oed_id().to_string());
        log.write_entry(&start);

        let certification = match self.run(runner) {
            Ok(certification) => certification,
            Err(err) => {
                let mut entry = LogEntry::new(EventType::Error, Severity::Critical)
                    .with_error(err.code(), err.to_string());
                entry.implementation_id = Some(self.identity.implementation_id.clone());
                log.write_entry(&entry);
                log.flush();
                return Err(err);
            }
        };

        for failure in &certification.suite.failures {
            let mut entry = LogEntry::new(EventType::FamilyFailed, Severity::Warning)
                .with_error(&failure.code, failure.message.clone());
            entry.category = Some(failure.label.category.to_string());
            entry.family = Some(failure.label.to_string());
            log.write_entry(&entry);
        }

        for (category, passes) in certification.report.summary.categories() {
            let mut entry = LogEntry::new(
                EventType::CategoryComplete,
                if passes { Severity::Info } else { Severity::Warning },
            );
            entry.category = Some(category.to_string());
            entry.results = Some(certification.suite.result_count(category));
            entry.passes = Some(passes);
            log.write_entry(&entry);
        }

        let mut done = LogEntry::new(EventType::CertificationComplete, Severity::Info);
        done.implementation_id = Some(certification.report.implementation_id.clone());
        done.config_hash = Some(certification.report.context.config_hash.clone());
        done.status = Some(certification.report.status.to_string());
        done.digest = certification.report.digest().ok();
        done.passes = Some(certification.report.summary.passes);
        done.duration_ms = u64::try_from(started.elapsed().as_millis()).ok();
        log.write_entry(&done);
        log.flush();

        Ok(certification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::coverage::ConformanceCoverageConfig;
    use crate::suite::config::ConformanceSuiteConfig;

    fn summary(passes: bool) -> ConformanceSuiteSummary {
        ConformanceSuiteSummary {
            continuity_passes: true,
            total_variation_passes: true,
            snapping_passes: passes,
            phase_passes: true,
            mode_induction_passes: true,
            passes,
        }
    }

    fn context() -> ConformanceSuiteContext {
        let bundle = ConformanceConfigBundle::new(
            ConformanceCoverageConfig::default(),
            ConformanceSuiteConfig::default(),
        );
        ConformanceSuiteContext::new("oed-lab", "1.0", "suite-1", &bundle).unwrap()
    }

    fn report(passes: bool) -> ConformanceReport {
        ConformanceReportBuilder::new("reflex-arc", "2.1.0")
            .badge("continuity")
            .context(context())
            .build(summary(passes))
            .unwrap()
    }

    #[test]
    fn status_is_derived_from_summary() {
        assert_eq!(report(true).status, ReportStatus::Pass);
        assert_eq!(report(false).status, ReportStatus::Fail);
    }

    #[test]
    fn missing_context_is_an_error() {
        let err = ConformanceReportBuilder::new("reflex-arc", "2.1.0")
            .badge("continuity")
            .build(summary(true))
            .unwrap_err();
        assert!(matches!(err, ConformanceError::MissingContext));
    }

    #[test]
    fn badges_are_required() {
        let err = ConformanceReportBuilder::new("reflex-arc", "2.1.0")
            .context(context())
            .build(summary(true))
            .unwrap_err();
        assert_eq!(err.code(), "MCF-1102");
    }

    #[test]
    fn field_set_is_exact() {
        let value = serde_json::to_value(report(true)).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "badges",
                "context",
                "implementationId",
                "implementationVersion",
                "status",
                "summary"
            ]
        );
        assert_eq!(value["status"], "pass");
        assert_eq!(value["context"]["configHash"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn digest_detects_tampering() {
        let original = report(false);
        let digest = original.digest().unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, report(false).digest().unwrap());

        let mut tampered = original;
        tampered.summary.snapping_passes = true;
        assert_ne!(digest, tampered.digest().unwrap());
    }

    #[test]
    fn verify_rejects_inconsistent_status() {
        let mut forged = report(false);
        forged.status = ReportStatus::Pass;
        assert!(forged.verify().is_err());
        assert!(report(false).verify().is_ok());

        let json = serde_json::to_string(&report(true)).unwrap();
        let back: ConformanceReport = serde_json::from_str(&json).unwrap();
        assert!(back.verify().is_ok());
    }
}
