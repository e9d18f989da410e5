//! Amplifier port trait
//!
//! The sequencer needs three things from the amplifier: the frequency its
//! CAT follower currently reports, the power/SWR readings after a tune, and
//! the matching network it stored for the segment.

use serde::{Deserialize, Serialize};

use crate::domain::{Frequency, TrainerError, TrainerResult};

/// Unit attached to a reported frequency value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyUnit {
    #[serde(alias = "hz", alias = "HZ")]
    Hz,
    #[serde(alias = "khz", alias = "KHZ", alias = "kHZ")]
    #[serde(rename = "kHz")]
    KHz,
    #[serde(alias = "mhz", alias = "MHZ", alias = "mHz")]
    #[serde(rename = "MHz")]
    MHz,
}

/// A frequency as the amplifier reports it: a value plus a unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportedFrequency {
    pub value: f64,
    pub unit: FrequencyUnit,
}

impl ReportedFrequency {
    pub fn new(value: f64, unit: FrequencyUnit) -> Self {
        Self { value, unit }
    }

    /// Whole kHz, truncated. A reading of 14070.9 kHz is 14070.
    pub fn truncated_khz(&self) -> TrainerResult<u64> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(TrainerError::Amplifier(format!(
                "nonsensical frequency reading {}",
                self.value
            )));
        }
        let khz = match self.unit {
            FrequencyUnit::Hz => self.value / 1_000.0,
            FrequencyUnit::KHz => self.value,
            FrequencyUnit::MHz => self.value * 1_000.0,
        };
        // Tiny epsilon so 14.07 MHz (stored as 14.069999..) is still 14070 kHz
        Ok((khz + 1e-6).floor() as u64)
    }

    /// True iff both frequencies fall on the same whole-kHz boundary.
    pub fn matches(&self, expected: Frequency) -> TrainerResult<bool> {
        Ok(self.truncated_khz()? == expected.truncated_khz())
    }
}

/// Power readings taken after a segment was tuned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmplifierReadings {
    pub forward_watts: f64,
    pub swr: f64,
}

/// Tuner state for the segment the amplifier is on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerSetting {
    pub tuned_khz: f64,
    pub segment_khz: f64,
    pub mode: String,
    pub setup: String,
    /// `None` when the amplifier bypassed the tuner on this segment
    pub inductance_nh: Option<f64>,
    pub capacitance_pf: Option<f64>,
}

impl TunerSetting {
    pub fn is_bypassed(&self) -> bool {
        self.inductance_nh.is_none() || self.capacitance_pf.is_none()
    }
}

/// Read-only view of the power amplifier
pub trait AmplifierMonitor: Send {
    /// The frequency the amplifier currently believes the radio is on
    fn reported_frequency(&mut self) -> TrainerResult<ReportedFrequency>;

    /// Drive and SWR readings; only meaningful right after a real carrier
    fn readings(&mut self) -> TrainerResult<AmplifierReadings>;

    /// L/C values stored for the current segment
    fn tuner_setting(&mut self) -> TrainerResult<TunerSetting>;
}
