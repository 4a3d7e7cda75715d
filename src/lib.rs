#![forbid(unsafe_code)]

//! Manas conformance (mcf): certification of closed-loop control policies.
//!
//! A policy under test implements [`runner::target::ConformanceTarget`]. The
//! suite drives it through deterministic stimulus families and judges the
//! recorded trajectories on five behavioral categories:
//! 1. **Continuity**: bounded output change under small input perturbations
//! 2. **Total variation**: bounded cumulative output motion
//! 3. **Snapping**: outputs and phases must not collapse onto a few levels
//! 4. **Phase**: phase trajectories keep variance, bandwidth, and spread
//! 5. **Mode induction**: steady states track sustained input offsets
//!
//! The verdicts are sealed into a [`suite::report::ConformanceReport`] whose
//! configuration hash and SHA-256 digest make a certification reproducible.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use manas_conformance::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use manas_conformance::core::config::CertificationConfig;
//! use manas_conformance::reference::LinearReflexTarget;
//!
//! let config = CertificationConfig::default();
//! let mut runner = config.runner(LinearReflexTarget::default());
//! let certification = config.certifier().run(&mut runner).unwrap();
//! println!("{}", certification.report.status);
//! ```

pub mod prelude;

pub mod checks;
pub mod core;
pub mod logger;
pub mod plan;
pub mod reference;
pub mod runner;
pub mod signal;
pub mod suite;
