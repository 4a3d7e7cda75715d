//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use manas_conformance::prelude::*;
//! ```

// Core
pub use crate::core::channels::{
    DriveIndex, DriveIntent, EnergyIndex, EnergyState, PhaseIndex, PhaseState,
};
pub use crate::core::config::CertificationConfig;
pub use crate::core::errors::{ConformanceError, Result};

// Signals
pub use crate::signal::family::{FamilyCategory, FamilyLabel, InputFamily, InputFrame};
pub use crate::signal::generators::{SignalGenerator, SignalKind};

// Plan
pub use crate::plan::builder::{ConformancePlan, ConformancePlanBuilder};
pub use crate::plan::coverage::{Band, BandCoverage, ConformanceCoverageConfig, SamplingStrategy};

// Runner
pub use crate::runner::conformance::{ConformanceRun, ConformanceRunner};
pub use crate::runner::normalization::NormalizationMap;
pub use crate::runner::residual::{DriveLimit, DriveResidualModel};
pub use crate::runner::target::{ConformanceTarget, TargetError};

// Suite
pub use crate::suite::config::ConformanceSuiteConfig;
pub use crate::suite::context::{ConformanceConfigBundle, ConformanceSuiteContext};
pub use crate::suite::engine::{
    ConformanceSuiteEngine, ConformanceSuiteReport, ConformanceSuiteSummary, OperatingEnvelope,
};
pub use crate::suite::report::{
    Certification, ConformanceReport, ConformanceReportBuilder, ManasConformanceRunner,
    ReportIdentity, ReportStatus,
};

// Logging
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter};

// Reference policies
pub use crate::reference::{LinearReflexTarget, QuantizedReflexTarget, ReflexParams};
