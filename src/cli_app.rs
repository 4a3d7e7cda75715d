//! Top-level CLI definition and dispatch.

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use manas_conformance::core::config::CertificationConfig;
use manas_conformance::core::errors::ConformanceError;
use manas_conformance::logger::jsonl::{JsonlConfig, JsonlWriter};
use manas_conformance::reference::{LinearReflexTarget, QuantizedReflexTarget};
use manas_conformance::runner::target::ConformanceTarget;
use manas_conformance::suite::context::ConformanceConfigBundle;
use manas_conformance::suite::report::{Certification, ConformanceReport, ReportStatus};

/// Manas conformance certification for closed-loop control policies.
#[derive(Debug, Parser)]
#[command(
    name = "manas-cert",
    author,
    version,
    about = "Manas Conformance - behavioral certification for control policies",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Print the effective configuration as TOML.
    Init(InitArgs),
    /// Show how many families each category will run.
    Plan,
    /// Print the configuration hash that identifies a certification.
    Hash(HashArgs),
    /// Certify a built-in reference policy.
    Certify(CertifyArgs),
    /// Check a saved report for internal consistency and print its digest.
    Verify(VerifyArgs),
}

#[derive(Debug, Clone, Args)]
struct InitArgs {
    /// Write to this file instead of stdout.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct HashArgs {
    /// Also print the canonical JSON the hash is computed over.
    #[arg(long)]
    canonical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TargetKind {
    /// Smooth first-order reflex.
    Linear,
    /// Reflex with quantized drive output.
    Quantized,
}

#[derive(Debug, Clone, Args)]
struct CertifyArgs {
    /// Reference policy to certify.
    #[arg(long, value_enum, default_value_t = TargetKind::Linear)]
    target: TargetKind,
    /// Write the report JSON here.
    #[arg(long, value_name = "PATH")]
    out: Option<PathBuf>,
    /// Write the per-family results JSON here.
    #[arg(long, value_name = "PATH")]
    details: Option<PathBuf>,
    /// Append certification events to this JSONL file.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct VerifyArgs {
    /// Report JSON produced by `certify`.
    report: PathBuf,
    /// Fail unless the report digest equals this value.
    #[arg(long, value_name = "SHA256")]
    expect_digest: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// The certification ran and did not pass.
    #[error("{0}")]
    Failed(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::Failed(_) => 4,
        }
    }
}

impl From<ConformanceError> for CliError {
    fn from(err: ConformanceError) -> Self {
        if err.is_config_error() {
            Self::User(err.to_string())
        } else {
            Self::Runtime(err.to_string())
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Init(args) => run_init(cli, args),
        Command::Plan => run_plan(cli),
        Command::Hash(args) => run_hash(cli, args),
        Command::Certify(args) => run_certify(cli, args),
        Command::Verify(args) => run_verify(cli, args),
    }
}

fn load_config(cli: &Cli) -> Result<CertificationConfig, CliError> {
    Ok(CertificationConfig::load(cli.config.as_deref())?)
}

fn run_init(cli: &Cli, args: &InitArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let text = config.to_toml()?;
    match &args.out {
        Some(path) => {
            write_file(path, &text)?;
            if output_mode(cli) == OutputMode::Json {
                write_json_line(&json!({
                    "command": "init",
                    "path": path.to_string_lossy(),
                }))?;
            } else {
                println!("wrote {}", path.display());
            }
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn run_plan(cli: &Cli) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let runner = config.runner(LinearReflexTarget::default());
    let counts = config.certifier().engine().plan(&runner)?.counts();

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "plan",
            "counts": counts,
        })),
        OutputMode::Human => {
            println!("{}", "Certification plan".bold());
            println!("  continuity pairs       {}", counts.continuity_pairs);
            println!("  total variation        {}", counts.total_variation);
            println!("  snapping               {}", counts.snapping);
            println!("  phase                  {}", counts.phase);
            println!("  mode induction groups  {}", counts.mode_induction_groups);
            println!("  families (total)       {}", counts.total_families);
            Ok(())
        }
    }
}

fn run_hash(cli: &Cli, args: &HashArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let certifier = config.certifier();
    let bundle = certifier.bundle();
    let context = certifier.context()?;

    match output_mode(cli) {
        OutputMode::Json => {
            let mut payload = json!({ "command": "hash", "context": context });
            if args.canonical {
                payload["canonical"] = Value::String(bundle.canonical_json()?);
            }
            write_json_line(&payload)
        }
        OutputMode::Human => {
            println!("{}", context.config_hash);
            println!(
                "  oed {} {}, suite {}",
                context.oed_id, context.oed_version, context.suite_version
            );
            if args.canonical {
                println!("{}", bundle.canonical_json()?);
            }
            Ok(())
        }
    }
}

fn run_certify(cli: &Cli, args: &CertifyArgs) -> Result<(), CliError> {
    let config = load_config(cli)?;
    let certification = match args.target {
        TargetKind::Linear => certify(&config, LinearReflexTarget::default(), args.log.as_deref())?,
        TargetKind::Quantized => {
            certify(&config, QuantizedReflexTarget::default(), args.log.as_deref())?
        }
    };
    let report = &certification.report;
    let digest = report.digest()?;

    if let Some(path) = &args.out {
        write_file(path, &serde_json::to_string_pretty(report)?)?;
    }
    if let Some(path) = &args.details {
        write_file(path, &serde_json::to_string_pretty(&certification.suite)?)?;
    }

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "certify",
            "report": report,
            "digest": digest,
            "failures": certification.suite.failures.len(),
        }))?,
        OutputMode::Human => print_certification(&certification, &digest),
    }

    match report.status {
        ReportStatus::Pass => Ok(()),
        ReportStatus::Fail => Err(CliError::Failed(format!(
            "{} did not pass certification",
            report.implementation_id
        ))),
    }
}

fn certify<T: ConformanceTarget>(
    config: &CertificationConfig,
    target: T,
    log: Option<&Path>,
) -> Result<Certification, ConformanceError> {
    let mut runner = config.runner(target);
    let certifier = config.certifier();
    match log {
        Some(path) => {
            let mut writer = JsonlWriter::open(JsonlConfig::new(path));
            certifier.run_logged(&mut runner, &mut writer)
        }
        None => certifier.run(&mut runner),
    }
}

fn print_certification(certification: &Certification, digest: &str) {
    let report = &certification.report;
    println!(
        "{} {} (suite {}, oed {} {})",
        report.implementation_id.bold(),
        report.implementation_version,
        report.context.suite_version,
        report.context.oed_id,
        report.context.oed_version,
    );
    for (category, passes) in report.summary.categories() {
        let verdict = if passes { "pass".green() } else { "FAIL".red() };
        println!(
            "  {:<16} {verdict}  ({} results)",
            category.to_string(),
            certification.suite.result_count(category)
        );
    }
    for failure in &certification.suite.failures {
        println!("  {} {}: {}", failure.code.yellow(), failure.label, failure.message);
    }
    let status = match report.status {
        ReportStatus::Pass => "PASS".green().bold(),
        ReportStatus::Fail => "FAIL".red().bold(),
    };
    println!("status  {status}");
    println!("hash    {}", report.context.config_hash);
    println!("digest  {digest}");
}

fn run_verify(cli: &Cli, args: &VerifyArgs) -> Result<(), CliError> {
    let raw = fs::read_to_string(&args.report)
        .map_err(|e| CliError::Runtime(format!("{}: {e}", args.report.display())))?;
    let report: ConformanceReport = serde_json::from_str(&raw)
        .map_err(|e| CliError::User(format!("{}: not a report: {e}", args.report.display())))?;
    report.verify()?;
    let digest = report.digest()?;

    // Only compare the configuration when one was supplied explicitly.
    let config_matches = match &cli.config {
        Some(_) => {
            let config = load_config(cli)?;
            let bundle = ConformanceConfigBundle::new(config.coverage, config.suite);
            Some(report.context.matches(&bundle)?)
        }
        None => None,
    };

    match output_mode(cli) {
        OutputMode::Json => write_json_line(&json!({
            "command": "verify",
            "status": report.status,
            "digest": digest,
            "configMatches": config_matches,
        }))?,
        OutputMode::Human => {
            println!("{} {}", "consistent".green(), args.report.display());
            println!("status  {}", report.status);
            println!("digest  {digest}");
            if let Some(matches) = config_matches {
                let verdict = if matches { "match".green() } else { "MISMATCH".red() };
                println!("config  {verdict}");
            }
        }
    }

    if config_matches == Some(false) {
        return Err(CliError::User(
            "report was issued for a different configuration".to_string(),
        ));
    }
    if let Some(expected) = &args.expect_digest {
        if !expected.eq_ignore_ascii_case(&digest) {
            return Err(CliError::User(format!(
                "digest mismatch: expected {expected}, computed {digest}"
            )));
        }
    }
    Ok(())
}

fn write_file(path: &Path, text: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("MANAS_CERT_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "manas-cert",
            "--config",
            "/tmp/cert.toml",
            "--json",
            "--no-color",
            "plan",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["manas-cert", "hash", "--json", "--canonical"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_certify_and_verify() {
        let cli = Cli::try_parse_from([
            "manas-cert",
            "certify",
            "--target",
            "quantized",
            "--out",
            "report.json",
            "--log",
            "cert.jsonl",
        ])
        .unwrap();
        match cli.command {
            Command::Certify(args) => {
                assert_eq!(args.target, TargetKind::Quantized);
                assert_eq!(args.out, Some(PathBuf::from("report.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        assert!(Cli::try_parse_from(["manas-cert", "verify", "r.json", "--expect-digest", "ab"]).is_ok());
        assert!(Cli::try_parse_from(["manas-cert", "verify"]).is_err());
        assert!(Cli::try_parse_from(["manas-cert", "certify", "--target", "pid"]).is_err());
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(resolve_output_mode(true, Some("human"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("json"), true), OutputMode::Json);
        assert_eq!(resolve_output_mode(false, Some("human"), false), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, Some("auto"), true), OutputMode::Human);
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn config_errors_map_to_user_exit_code() {
        let err: CliError = ConformanceError::MissingContext.into();
        assert_eq!(err.exit_code(), 2);
        let err: CliError = ConformanceError::InvalidConfig {
            details: "x".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), 1);
        assert_eq!(CliError::Failed(String::new()).exit_code(), 4);
    }
}
