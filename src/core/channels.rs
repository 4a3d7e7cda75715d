//! Channel indices and the value types exchanged with a target policy.
//!
//! Each value type validates its payload on construction, so an
//! `EnergyState` with a negative or non-finite value cannot exist.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::{ConformanceError, Result};

macro_rules! channel_index {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u8);

        impl $name {
            /// Raw index value.
            #[must_use]
            pub const fn raw(self) -> u8 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "[{}]"), self.0)
            }
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                Self(value)
            }
        }
    };
}

channel_index!(
    /// Index of a sensed energy channel.
    EnergyIndex,
    "energy"
);
channel_index!(
    /// Index of a sensed phase channel.
    PhaseIndex,
    "phase"
);
channel_index!(
    /// Index of a drive/actuator command.
    DriveIndex,
    "drive"
);

/// One sensed energy sample. Energies are non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EnergyStateRepr")]
pub struct EnergyState {
    index: EnergyIndex,
    value: f64,
}

#[derive(Deserialize)]
struct EnergyStateRepr {
    index: EnergyIndex,
    value: f64,
}

impl TryFrom<EnergyStateRepr> for EnergyState {
    type Error = ConformanceError;

    fn try_from(raw: EnergyStateRepr) -> Result<Self> {
        Self::new(raw.index, raw.value)
    }
}

impl EnergyState {
    pub fn new(index: EnergyIndex, value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(ConformanceError::invalid(
                index.to_string(),
                format!("energy must be finite and >= 0, got {value}"),
            ));
        }
        Ok(Self { index, value })
    }

    #[must_use]
    pub const fn index(&self) -> EnergyIndex {
        self.index
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

/// One sensed phase sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PhaseStateRepr")]
pub struct PhaseState {
    index: PhaseIndex,
    value: f64,
}

#[derive(Deserialize)]
struct PhaseStateRepr {
    index: PhaseIndex,
    value: f64,
}

impl TryFrom<PhaseStateRepr> for PhaseState {
    type Error = ConformanceError;

    fn try_from(raw: PhaseStateRepr) -> Result<Self> {
        Self::new(raw.index, raw.value)
    }
}

impl PhaseState {
    pub fn new(index: PhaseIndex, value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(ConformanceError::invalid(
                index.to_string(),
                format!("phase must be finite, got {value}"),
            ));
        }
        Ok(Self { index, value })
    }

    #[must_use]
    pub const fn index(&self) -> PhaseIndex {
        self.index
    }

    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }
}

/// One commanded activation for one drive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DriveIntentRepr")]
pub struct DriveIntent {
    index: DriveIndex,
    activation: f64,
}

#[derive(Deserialize)]
struct DriveIntentRepr {
    index: DriveIndex,
    activation: f64,
}

impl TryFrom<DriveIntentRepr> for DriveIntent {
    type Error = ConformanceError;

    fn try_from(raw: DriveIntentRepr) -> Result<Self> {
        Self::new(raw.index, raw.activation)
    }
}

impl DriveIntent {
    pub fn new(index: DriveIndex, activation: f64) -> Result<Self> {
        if !activation.is_finite() {
            return Err(ConformanceError::invalid(
                index.to_string(),
                format!("activation must be finite, got {activation}"),
            ));
        }
        Ok(Self { index, activation })
    }

    #[must_use]
    pub const fn index(&self) -> DriveIndex {
        self.index
    }

    #[must_use]
    pub const fn activation(&self) -> f64 {
        self.activation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_rejects_negative_and_nan() {
        assert!(EnergyState::new(EnergyIndex(0), -0.1).is_err());
        assert!(EnergyState::new(EnergyIndex(0), f64::NAN).is_err());
        let ok = EnergyState::new(EnergyIndex(2), 0.0).unwrap();
        assert_eq!(ok.index(), EnergyIndex(2));
        assert_eq!(ok.value(), 0.0);
    }

    #[test]
    fn phase_accepts_negative_but_not_infinite() {
        assert!(PhaseState::new(PhaseIndex(1), -3.0).is_ok());
        assert!(PhaseState::new(PhaseIndex(1), f64::INFINITY).is_err());
    }

    #[test]
    fn drive_rejects_non_finite() {
        let err = DriveIntent::new(DriveIndex(4), f64::NEG_INFINITY).unwrap_err();
        assert_eq!(err.code(), "MCF-1101");
        assert!(err.to_string().contains("drive[4]"));
    }

    #[test]
    fn deserialization_runs_range_validation() {
        let err = serde_json::from_str::<EnergyState>(r#"{"index":0,"value":-5.0}"#).unwrap_err();
        assert!(err.to_string().contains("energy must be finite and >= 0"));

        let energy: EnergyState = serde_json::from_str(r#"{"index":1,"value":0.25}"#).unwrap();
        assert_eq!(energy, EnergyState::new(EnergyIndex(1), 0.25).unwrap());

        let phase: PhaseState = serde_json::from_str(r#"{"index":2,"value":-1.5}"#).unwrap();
        assert_eq!(phase.value(), -1.5);

        let drive = DriveIntent::new(DriveIndex(3), 0.7).unwrap();
        let json = serde_json::to_string(&drive).unwrap();
        assert_eq!(serde_json::from_str::<DriveIntent>(&json).unwrap(), drive);
    }

    #[test]
    fn indices_order_by_raw_value() {
        let mut indices = vec![DriveIndex(3), DriveIndex(0), DriveIndex(1)];
        indices.sort();
        assert_eq!(indices, vec![DriveIndex(0), DriveIndex(1), DriveIndex(3)]);
        assert_eq!(DriveIndex(3).raw(), 3);
    }
}
