//! MCF-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, ConformanceError>;

/// Top-level error type for conformance certification.
#[derive(Debug, Error)]
pub enum ConformanceError {
    #[error("[MCF-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[MCF-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[MCF-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[MCF-1101] invalid value for {field}: {details}")]
    InvalidValue { field: String, details: String },

    #[error("[MCF-1102] {field} must not be empty")]
    EmptyCollection { field: &'static str },

    #[error("[MCF-1103] normalization scale for {index} must be finite and > 0, got {scale}")]
    InvalidScale { index: String, scale: f64 },

    #[error("[MCF-2001] frame count mismatch: expected {expected}, got {actual}")]
    FrameCountMismatch { expected: usize, actual: usize },

    #[error(
        "[MCF-2002] delta time mismatch for {family}: controller expects {expected}s, family uses {actual}s"
    )]
    DeltaTimeMismatch {
        family: String,
        expected: f64,
        actual: f64,
    },

    #[error("[MCF-2003] missing value for {index}")]
    MissingValue { index: String },

    #[error("[MCF-2004] unexpected value for {index}")]
    UnexpectedValue { index: String },

    #[error("[MCF-2005] no drive limit configured for {index}")]
    MissingDriveLimit { index: String },

    #[error(
        "[MCF-2006] {family}: {channel} sample {value} outside physical range [{minimum}, {maximum}]"
    )]
    SignalOutOfRange {
        family: String,
        channel: String,
        value: f64,
        minimum: f64,
        maximum: f64,
    },

    #[error("[MCF-2007] certification context missing; cannot build report")]
    MissingContext,

    #[error("[MCF-2008] dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("[MCF-2009] empty trajectory in {context}")]
    EmptyTrajectory { context: &'static str },

    #[error("[MCF-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[MCF-3001] target policy failure: {source}")]
    Target {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("[MCF-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConformanceError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MCF-1001",
            Self::MissingConfig { .. } => "MCF-1002",
            Self::ConfigParse { .. } => "MCF-1003",
            Self::InvalidValue { .. } => "MCF-1101",
            Self::EmptyCollection { .. } => "MCF-1102",
            Self::InvalidScale { .. } => "MCF-1103",
            Self::FrameCountMismatch { .. } => "MCF-2001",
            Self::DeltaTimeMismatch { .. } => "MCF-2002",
            Self::MissingValue { .. } => "MCF-2003",
            Self::UnexpectedValue { .. } => "MCF-2004",
            Self::MissingDriveLimit { .. } => "MCF-2005",
            Self::SignalOutOfRange { .. } => "MCF-2006",
            Self::MissingContext => "MCF-2007",
            Self::DimensionMismatch { .. } => "MCF-2008",
            Self::EmptyTrajectory { .. } => "MCF-2009",
            Self::Serialization { .. } => "MCF-2101",
            Self::Target { .. } => "MCF-3001",
            Self::Io { .. } => "MCF-3002",
        }
    }

    /// Whether the failure can only be fixed by changing configuration.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidValue { .. }
                | Self::EmptyCollection { .. }
                | Self::InvalidScale { .. }
                | Self::DeltaTimeMismatch { .. }
                | Self::MissingDriveLimit { .. }
                | Self::SignalOutOfRange { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wrap a policy-defined error without altering it.
    #[must_use]
    pub fn target(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Target {
            source: source.into(),
        }
    }

    pub(crate) fn invalid(field: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            details: details.into(),
        }
    }
}

/// Reject NaN and infinities for a named numeric field.
pub(crate) fn ensure_finite(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConformanceError::invalid(
            field,
            format!("must be finite, got {value}"),
        ))
    }
}

/// Require a finite, strictly positive value.
pub(crate) fn ensure_positive(field: &str, value: f64) -> Result<f64> {
    ensure_finite(field, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ConformanceError::invalid(
            field,
            format!("must be > 0, got {value}"),
        ))
    }
}

/// Require a finite, non-negative value.
pub(crate) fn ensure_non_negative(field: &str, value: f64) -> Result<f64> {
    ensure_finite(field, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(ConformanceError::invalid(
            field,
            format!("must be >= 0, got {value}"),
        ))
    }
}

impl From<serde_json::Error> for ConformanceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConformanceError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
