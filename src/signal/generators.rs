//! Scalar stimulus generators over continuous simulated time.
//!
//! Stochastic and filtered generators carry hidden state and must be sampled
//! in non-decreasing time order; sampling out of order is unspecified.

#![allow(missing_docs)]

use std::f64::consts::PI;

use rand::Rng;
use serde::Serialize;

use crate::core::errors::{ConformanceError, Result, ensure_finite, ensure_positive};
use crate::signal::filter::LowPassFilter;
use crate::signal::prng::SplitMix64;

/// Signal kind tag, recorded in family labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalKind {
    Step,
    Ramp,
    Chirp,
    Prbs,
    FilteredPrbs,
    BandLimitedNoise,
}

// ──────────────────── deterministic generators ────────────────────

/// `initial_value` before `step_time`, `step_value` from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSignal {
    initial_value: f64,
    step_value: f64,
    step_time: f64,
}

impl StepSignal {
    pub fn new(initial_value: f64, step_value: f64, step_time: f64) -> Result<Self> {
        Ok(Self {
            initial_value: ensure_finite("step.initial_value", initial_value)?,
            step_value: ensure_finite("step.step_value", step_value)?,
            step_time: ensure_finite("step.step_time", step_time)?,
        })
    }

    #[must_use]
    pub fn sample(&self, time: f64) -> f64 {
        if time < self.step_time {
            self.initial_value
        } else {
            self.step_value
        }
    }
}

/// `start_value + slope * time`.
#[derive(Debug, Clone, PartialEq)]
pub struct RampSignal {
    start_value: f64,
    slope: f64,
}

impl RampSignal {
    pub fn new(start_value: f64, slope: f64) -> Result<Self> {
        Ok(Self {
            start_value: ensure_finite("ramp.start_value", start_value)?,
            slope: ensure_finite("ramp.slope", slope)?,
        })
    }

    #[must_use]
    pub fn sample(&self, time: f64) -> f64 {
        self.slope.mul_add(time, self.start_value)
    }
}

/// Linear-sweep chirp from `start_hz` to `end_hz` over `duration`.
///
/// Time is clamped to `[0, duration]`, so sampling past the horizon holds the
/// final phase.
#[derive(Debug, Clone, PartialEq)]
pub struct ChirpSignal {
    amplitude: f64,
    start_hz: f64,
    end_hz: f64,
    duration: f64,
}

impl ChirpSignal {
    pub fn new(amplitude: f64, start_hz: f64, end_hz: f64, duration: f64) -> Result<Self> {
        Ok(Self {
            amplitude: ensure_finite("chirp.amplitude", amplitude)?,
            start_hz: ensure_finite("chirp.start_hz", start_hz)?,
            end_hz: ensure_finite("chirp.end_hz", end_hz)?,
            duration: ensure_positive("chirp.duration", duration)?,
        })
    }

    #[must_use]
    pub fn sample(&self, time: f64) -> f64 {
        let t = time.clamp(0.0, self.duration);
        let sweep_rate = (self.end_hz - self.start_hz) / self.duration;
        let cycles = (0.5 * sweep_rate * t).mul_add(t, self.start_hz * t);
        self.amplitude * (2.0 * PI * cycles).sin()
    }
}

// ──────────────────── stochastic generators ────────────────────

/// Pseudo-random binary sequence: a zero-order-held `±amplitude`.
///
/// The sign is redrawn from one PRNG bit whenever `time >= next_switch_time`,
/// after which the next switch is scheduled one period later.
#[derive(Debug, Clone, PartialEq)]
pub struct PrbsSignal {
    amplitude: f64,
    switch_period: f64,
    rng: SplitMix64,
    value: f64,
    next_switch_time: f64,
}

impl PrbsSignal {
    /// `switch_period` may be infinite (hold the first draw forever) but must
    /// be positive.
    pub fn new(amplitude: f64, switch_period: f64, seed: u64) -> Result<Self> {
        ensure_finite("prbs.amplitude", amplitude)?;
        if switch_period.is_nan() || switch_period <= 0.0 {
            return Err(ConformanceError::invalid(
                "prbs.switch_period",
                format!("must be > 0, got {switch_period}"),
            ));
        }
        Ok(Self {
            amplitude,
            switch_period,
            rng: SplitMix64::new(seed),
            value: 0.0,
            next_switch_time: f64::NEG_INFINITY,
        })
    }

    pub fn sample(&mut self, time: f64) -> f64 {
        if time >= self.next_switch_time {
            self.value = if self.rng.next_bit() {
                self.amplitude
            } else {
                -self.amplitude
            };
            self.next_switch_time = time + self.switch_period;
        }
        self.value
    }
}

/// PRBS passed through the shared low-pass filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPrbsSignal {
    prbs: PrbsSignal,
    filter: LowPassFilter,
}

impl FilteredPrbsSignal {
    pub fn new(amplitude: f64, switch_period: f64, cutoff_hz: f64, seed: u64) -> Result<Self> {
        Ok(Self {
            prbs: PrbsSignal::new(amplitude, switch_period, seed)?,
            filter: LowPassFilter::new(cutoff_hz)?,
        })
    }

    pub fn sample(&mut self, time: f64, delta_time: f64) -> f64 {
        let raw = self.prbs.sample(time);
        self.filter.apply(raw, delta_time)
    }
}

/// Uniform noise in `[-amplitude, amplitude)` passed through the low-pass filter.
#[derive(Debug, Clone, PartialEq)]
pub struct BandLimitedNoise {
    amplitude: f64,
    rng: SplitMix64,
    filter: LowPassFilter,
}

impl BandLimitedNoise {
    pub fn new(amplitude: f64, cutoff_hz: f64, seed: u64) -> Result<Self> {
        Ok(Self {
            amplitude: ensure_finite("noise.amplitude", amplitude)?,
            rng: SplitMix64::new(seed),
            filter: LowPassFilter::new(cutoff_hz)?,
        })
    }

    pub fn sample(&mut self, delta_time: f64) -> f64 {
        let unit: f64 = self.rng.random();
        let raw = self.amplitude * 2.0_f64.mul_add(unit, -1.0);
        self.filter.apply(raw, delta_time)
    }
}

// ──────────────────── closed generator set ────────────────────

/// Every generator kind a plan can wire to a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalGenerator {
    Step(StepSignal),
    Ramp(RampSignal),
    Chirp(ChirpSignal),
    Prbs(PrbsSignal),
    FilteredPrbs(FilteredPrbsSignal),
    Noise(BandLimitedNoise),
    /// Clamps negative samples of the inner generator to zero (energy channels).
    NonNegative(Box<SignalGenerator>),
}

impl SignalGenerator {
    /// Wrap so that every sample is `>= 0`.
    #[must_use]
    pub fn non_negative(self) -> Self {
        match self {
            already @ Self::NonNegative(_) => already,
            other => Self::NonNegative(Box::new(other)),
        }
    }

    /// Sample at `time`; `delta_time` is the family step used by filters.
    pub fn sample(&mut self, time: f64, delta_time: f64) -> f64 {
        match self {
            Self::Step(signal) => signal.sample(time),
            Self::Ramp(signal) => signal.sample(time),
            Self::Chirp(signal) => signal.sample(time),
            Self::Prbs(signal) => signal.sample(time),
            Self::FilteredPrbs(signal) => signal.sample(time, delta_time),
            Self::Noise(signal) => signal.sample(delta_time),
            Self::NonNegative(inner) => inner.sample(time, delta_time).max(0.0),
        }
    }

    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Step(_) => SignalKind::Step,
            Self::Ramp(_) => SignalKind::Ramp,
            Self::Chirp(_) => SignalKind::Chirp,
            Self::Prbs(_) => SignalKind::Prbs,
            Self::FilteredPrbs(_) => SignalKind::FilteredPrbs,
            Self::Noise(_) => SignalKind::BandLimitedNoise,
            Self::NonNegative(inner) => inner.kind(),
        }
    }
}
