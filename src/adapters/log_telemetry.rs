//! Telemetry sink that writes CSV-shaped records to the `tuner` log target.
//!
//! Route that target to its own file with env_logger filters, e.g.
//! `RUST_LOG=info,tuner=info`.

use crate::domain::TrainerResult;
use crate::ports::{SegmentRecord, TelemetrySink, TunerSetting};

pub const TUNER_TARGET: &str = "tuner";
pub const CSV_HEADER: &str =
    "band,freq_khz,auto_ptt,forward_w,swr,tuned_khz,segment_khz,tuner_mode,setup,L_nH,C_pF";

#[derive(Debug, Default)]
pub struct LogTelemetry {
    header_written: bool,
}

impl LogTelemetry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One CSV row. Readings are left empty for manual segments and the tuner
/// columns when the amplifier was not read. A bypassed tuner has `N/A` L/C.
pub fn csv_row(record: &SegmentRecord) -> String {
    let (forward, swr) = match &record.readings {
        Some(r) => (format!("{:.1}", r.forward_watts), format!("{:.2}", r.swr)),
        None => (String::new(), String::new()),
    };
    format!(
        "{},{:.3},{},{forward},{swr},{}",
        record.band,
        record.frequency.as_khz(),
        u8::from(record.used_automatic_sensing),
        tuner_columns(record.tuner.as_ref())
    )
}

fn tuner_columns(tuner: Option<&TunerSetting>) -> String {
    let Some(t) = tuner else {
        return ",,,,,".into();
    };
    let lc = |v: Option<f64>| v.map_or_else(|| "N/A".to_string(), |v| v.to_string());
    format!(
        "{},{},{},{},{},{}",
        t.tuned_khz,
        t.segment_khz,
        t.mode,
        t.setup,
        lc(t.inductance_nh),
        lc(t.capacitance_pf)
    )
}

impl TelemetrySink for LogTelemetry {
    fn record_segment(&mut self, record: &SegmentRecord) -> TrainerResult<()> {
        if !self.header_written {
            log::info!(target: TUNER_TARGET, "{CSV_HEADER}");
            self.header_written = true;
        }
        log::info!(target: TUNER_TARGET, "{}", csv_row(record));
        Ok(())
    }
}
