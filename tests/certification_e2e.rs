//! End-to-end certification of the reference policies through the public API.

use std::fs;

use manas_conformance::prelude::*;

fn certify<T: ConformanceTarget>(config: &CertificationConfig, target: T) -> Certification {
    let mut runner = config.runner(target);
    config.certifier().run(&mut runner).unwrap()
}

#[test]
fn linear_reflex_passes_every_category() {
    let config = CertificationConfig::default();
    let cert = certify(&config, LinearReflexTarget::default());
    let summary = cert.report.summary;

    assert!(summary.continuity_passes, "failures: {:?}", cert.suite.failures);
    assert!(summary.total_variation_passes);
    assert!(summary.snapping_passes);
    assert!(summary.mode_induction_passes);
    assert!(summary.phase_passes);
    assert!(summary.passes);
    assert!(cert.suite.failures.is_empty());
    assert!(summary.is_consistent());
    assert_eq!(cert.report.status, ReportStatus::Pass);
    assert_eq!(cert.report.status, ReportStatus::from_summary(&summary));
}

#[test]
fn quantized_reflex_fails_snapping_and_mode_induction() {
    let config = CertificationConfig::default();
    let cert = certify(&config, QuantizedReflexTarget::default());
    let summary = cert.report.summary;

    assert!(!summary.snapping_passes);
    assert!(!summary.mode_induction_passes);
    assert!(!summary.passes);
    assert_eq!(cert.report.status, ReportStatus::Fail);
    assert!(cert.report.verify().is_ok());
}

#[test]
fn certification_is_reproducible() {
    let config = CertificationConfig::default();
    let first = certify(&config, LinearReflexTarget::default());
    let second = certify(&config, LinearReflexTarget::default());

    assert_eq!(first.report, second.report);
    assert_eq!(first.suite, second.suite);
    assert_eq!(first.report.digest().unwrap(), second.report.digest().unwrap());
}

#[test]
fn context_identifies_configuration() {
    let config = CertificationConfig::default();
    let cert = certify(&config, LinearReflexTarget::default());
    let bundle = ConformanceConfigBundle::new(config.coverage.clone(), config.suite.clone());

    assert_eq!(cert.report.context.config_hash, bundle.stable_hash().unwrap());
    assert_eq!(cert.report.context.oed_id, config.envelope.oed_id());
    assert_eq!(cert.report.context.suite_version, config.identity.suite_version);
    assert!(cert.report.context.matches(&bundle).unwrap());
}

#[test]
fn mismatched_update_rate_is_rejected_before_running() {
    let mut config = CertificationConfig::default();
    config.envelope = config.envelope.clone().with_update_rate_hz(50.0).unwrap();
    let mut runner = config.runner(LinearReflexTarget::default());

    let err = config.certifier().run(&mut runner).unwrap_err();
    assert_eq!(err.code(), "MCF-2002");
}

#[test]
fn saved_report_round_trips_with_same_digest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let cert = certify(&CertificationConfig::default(), QuantizedReflexTarget::default());

    fs::write(&path, serde_json::to_string_pretty(&cert.report).unwrap()).unwrap();
    let loaded: ConformanceReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

    assert!(loaded.verify().is_ok());
    assert_eq!(loaded.digest().unwrap(), cert.report.digest().unwrap());
}

#[test]
fn logged_run_emits_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("logs").join("cert.jsonl");
    let config = CertificationConfig::default();
    let mut runner = config.runner(QuantizedReflexTarget::default());

    let cert = {
        let mut log = JsonlWriter::open(JsonlConfig::new(&log_path));
        config.certifier().run_logged(&mut runner, &mut log).unwrap()
    };

    let events: Vec<serde_json::Value> = fs::read_to_string(&log_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let names: Vec<&str> = events.iter().map(|e| e["event"].as_str().unwrap()).collect();

    assert_eq!(names.first(), Some(&"certification_start"));
    assert_eq!(names.last(), Some(&"certification_complete"));
    assert_eq!(names.iter().filter(|n| **n == "category_complete").count(), 5);

    let done = events.last().unwrap();
    assert_eq!(done["status"], "fail");
    assert_eq!(done["digest"], cert.report.digest().unwrap());
    assert_eq!(done["config_hash"], cert.report.context.config_hash);
}

#[test]
fn config_file_drives_the_certification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manas-cert.toml");
    let mut config = CertificationConfig::default();
    config.identity.implementation_id = "bench-reflex".to_string();
    fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = CertificationConfig::load(Some(&path)).unwrap();
    let cert = certify(&loaded, LinearReflexTarget::default());
    assert_eq!(cert.report.implementation_id, "bench-reflex");
    assert_eq!(cert.report.badges, loaded.identity.badges);
}
