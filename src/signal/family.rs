//! Input families: named channels bound to generators over a fixed horizon.
//!
//! [`InputFamily::frames`] is the only place simulated time is discretized.

use std::fmt;

use serde::Serialize;

use crate::core::channels::{EnergyIndex, EnergyState, PhaseIndex, PhaseState};
use crate::core::errors::{ConformanceError, Result, ensure_positive};
use crate::signal::generators::{SignalGenerator, SignalKind};

/// Test category a family is executed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FamilyCategory {
    Continuity,
    TotalVariation,
    Snapping,
    Phase,
    ModeInduction,
}

impl fmt::Display for FamilyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continuity => "continuity",
            Self::TotalVariation => "total-variation",
            Self::Snapping => "snapping",
            Self::Phase => "phase",
            Self::ModeInduction => "mode-induction",
        };
        f.write_str(name)
    }
}

/// Identifies a family well enough to attribute a failure to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyLabel {
    pub category: FamilyCategory,
    pub kind: SignalKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_band: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl FamilyLabel {
    #[must_use]
    pub const fn new(category: FamilyCategory, kind: SignalKind) -> Self {
        Self {
            category,
            kind,
            amplitude: None,
            slope: None,
            frequency_hz: None,
            frequency_band: None,
            offset: None,
            seed: None,
        }
    }

    #[must_use]
    pub const fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = Some(amplitude);
        self
    }

    #[must_use]
    pub const fn with_slope(mut self, slope: f64) -> Self {
        self.slope = Some(slope);
        self
    }

    #[must_use]
    pub const fn with_frequency(mut self, frequency_hz: f64) -> Self {
        self.frequency_hz = Some(frequency_hz);
        self
    }

    #[must_use]
    pub const fn with_frequency_band(mut self, minimum: f64, maximum: f64) -> Self {
        self.frequency_band = Some((minimum, maximum));
        self
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl fmt::Display for FamilyLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.category, self.kind)?;
        if let Some(a) = self.amplitude {
            write!(f, " amplitude={a}")?;
        }
        if let Some(s) = self.slope {
            write!(f, " slope={s}")?;
        }
        if let Some(hz) = self.frequency_hz {
            write!(f, " frequency={hz}Hz")?;
        }
        if let Some((lo, hi)) = self.frequency_band {
            write!(f, " band=[{lo}, {hi}]Hz")?;
        }
        if let Some(o) = self.offset {
            write!(f, " offset={o}")?;
        }
        if let Some(seed) = self.seed {
            write!(f, " seed={seed}")?;
        }
        Ok(())
    }
}

/// One channel bound to exactly one generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalChannel<I> {
    pub index: I,
    pub generator: SignalGenerator,
}

impl<I> SignalChannel<I> {
    #[must_use]
    pub const fn new(index: I, generator: SignalGenerator) -> Self {
        Self { index, generator }
    }
}

/// One simulated instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputFrame {
    pub time: f64,
    pub energies: Vec<EnergyState>,
    pub phases: Vec<PhaseState>,
}

impl InputFrame {
    #[must_use]
    pub fn energy_values(&self) -> Vec<(EnergyIndex, f64)> {
        self.energies.iter().map(|e| (e.index(), e.value())).collect()
    }

    #[must_use]
    pub fn phase_values(&self) -> Vec<(PhaseIndex, f64)> {
        self.phases.iter().map(|p| (p.index(), p.value())).collect()
    }
}

/// Upper bound on frames per family. Longer horizons are configuration errors.
pub const MAX_FRAME_COUNT: usize = 10_000_000;

/// `floor(duration / delta_time) + 1`, rejected when it exceeds
/// [`MAX_FRAME_COUNT`] or cannot be represented.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn checked_frame_count(duration: f64, delta_time: f64) -> Result<usize> {
    let steps = (duration / delta_time).floor();
    let too_many = || {
        ConformanceError::invalid(
            "family.frameCount",
            format!(
                "duration {duration} at step {delta_time} exceeds {MAX_FRAME_COUNT} frames"
            ),
        )
    };
    if !steps.is_finite() || steps < 0.0 || steps >= MAX_FRAME_COUNT as f64 {
        return Err(too_many());
    }
    (steps as usize)
        .checked_add(1)
        .filter(|count| *count <= MAX_FRAME_COUNT)
        .ok_or_else(too_many)
}

/// A complete stimulus: channels, horizon, and step.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFamily {
    label: FamilyLabel,
    duration: f64,
    delta_time: f64,
    frame_count: usize,
    energy_channels: Vec<SignalChannel<EnergyIndex>>,
    phase_channels: Vec<SignalChannel<PhaseIndex>>,
}

impl InputFamily {
    pub fn new(
        label: FamilyLabel,
        duration: f64,
        delta_time: f64,
        energy_channels: Vec<SignalChannel<EnergyIndex>>,
        phase_channels: Vec<SignalChannel<PhaseIndex>>,
    ) -> Result<Self> {
        ensure_positive("family.duration", duration)?;
        ensure_positive("family.delta_time", delta_time)?;
        let frame_count = checked_frame_count(duration, delta_time)?;
        reject_duplicates(energy_channels.iter().map(|c| c.index))?;
        reject_duplicates(phase_channels.iter().map(|c| c.index))?;
        Ok(Self {
            label,
            duration,
            delta_time,
            frame_count,
            energy_channels,
            phase_channels,
        })
    }

    #[must_use]
    pub const fn label(&self) -> &FamilyLabel {
        &self.label
    }

    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub const fn delta_time(&self) -> f64 {
        self.delta_time
    }

    #[must_use]
    pub fn energy_channels(&self) -> &[SignalChannel<EnergyIndex>] {
        &self.energy_channels
    }

    #[must_use]
    pub fn phase_channels(&self) -> &[SignalChannel<PhaseIndex>] {
        &self.phase_channels
    }

    /// Re-tag the family for another category (used when one stimulus feeds
    /// two collections).
    #[must_use]
    pub fn recategorized(&self, category: FamilyCategory) -> Self {
        let mut copy = self.clone();
        copy.label.category = category;
        copy
    }

    /// `floor(duration / delta_time) + 1`, inclusive of both endpoints.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Lazily materialize frames. Advances generator state, so call once per run.
    pub fn frames(&mut self) -> Frames<'_> {
        let total = self.frame_count();
        Frames {
            family: self,
            step: 0,
            total,
        }
    }

    /// Collect every frame, failing on the first invalid sample.
    pub fn collect_frames(&mut self) -> Result<Vec<InputFrame>> {
        self.frames().collect()
    }
}

fn reject_duplicates<I: Ord + Copy + fmt::Display>(indices: impl Iterator<Item = I>) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for index in indices {
        if !seen.insert(index) {
            return Err(ConformanceError::invalid(
                index.to_string(),
                "channel bound more than once in one family",
            ));
        }
    }
    Ok(())
}

/// Iterator over the frames of one family run.
pub struct Frames<'a> {
    family: &'a mut InputFamily,
    step: usize,
    total: usize,
}

impl Iterator for Frames<'_> {
    type Item = Result<InputFrame>;

    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.total {
            return None;
        }
        let time = self.step as f64 * self.family.delta_time;
        self.step += 1;
        let dt = self.family.delta_time;

        let energies = self
            .family
            .energy_channels
            .iter_mut()
            .map(|channel| EnergyState::new(channel.index, channel.generator.sample(time, dt)))
            .collect::<Result<Vec<_>>>();
        let phases = self
            .family
            .phase_channels
            .iter_mut()
            .map(|channel| PhaseState::new(channel.index, channel.generator.sample(time, dt)))
            .collect::<Result<Vec<_>>>();

        Some(energies.and_then(|energies| {
            phases.map(|phases| InputFrame {
                time,
                energies,
                phases,
            })
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.step;
        (remaining, Some(remaining))
    }
}
