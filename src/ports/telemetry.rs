//! Telemetry port trait

use crate::domain::{Frequency, TrainerResult};

use super::{AmplifierReadings, TunerSetting};

/// One finished segment, as handed to the telemetry sink
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    pub band: String,
    pub frequency: Frequency,
    /// Whether PTT was sensed automatically. Manual segments have no
    /// reliable carrier timing, so their readings are not meaningful.
    pub used_automatic_sensing: bool,
    pub readings: Option<AmplifierReadings>,
    /// Stored L/C for the segment, whenever the amplifier is reachable
    pub tuner: Option<TunerSetting>,
}

/// Write-only destination for per-segment results
pub trait TelemetrySink: Send {
    fn record_segment(&mut self, record: &SegmentRecord) -> TrainerResult<()>;
}
