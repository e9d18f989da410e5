//! Core domain types

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{TrainerError, TrainerResult};

/// Frequency in whole Hz. All grid and verification math stays in integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Frequency(pub u64);

impl Frequency {
    pub fn hz(hz: u64) -> Self {
        Self(hz)
    }

    /// Convert a kHz value (as written in config files) to Hz, rounding once.
    pub fn khz(khz: f64) -> Self {
        Self((khz * 1_000.0).round().max(0.0) as u64)
    }

    pub fn mhz(mhz: f64) -> Self {
        Self((mhz * 1_000_000.0).round().max(0.0) as u64)
    }

    pub fn as_hz(&self) -> u64 {
        self.0
    }

    pub fn as_khz(&self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    pub fn as_mhz(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Whole kHz, truncated rather than rounded (14_070_999 Hz -> 14_070).
    pub fn truncated_khz(&self) -> u64 {
        self.0 / 1_000
    }

    /// Exact MHz text with six decimals, e.g. `7.090000`. No float formatting involved.
    pub fn mhz_text(&self) -> String {
        format!("{}.{:06}", self.0 / 1_000_000, self.0 % 1_000_000)
    }

    /// Parse a decimal MHz string such as `7.09` or `14.250000` without float drift.
    /// Digits beyond the Hz position are truncated.
    pub fn parse_mhz(text: &str) -> Option<Self> {
        let text = text.trim();
        let (whole, frac) = match text.split_once('.') {
            Some((w, f)) => (w, f),
            None => (text, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut frac: String = frac.chars().take(6).collect();
        while frac.len() < 6 {
            frac.push('0');
        }
        let frac: u64 = frac.parse().ok()?;
        whole
            .checked_mul(1_000_000)
            .and_then(|hz| hz.checked_add(frac))
            .map(Self)
    }
}

/// Renders as an `M.KKK.HHH` triplet, e.g. `5.354.800`.
impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mhz = self.0 / 1_000_000;
        let rem = self.0 % 1_000_000;
        write!(f, "{}.{:03}.{:03}", mhz, rem / 1_000, rem % 1_000)
    }
}

/// One band's limits and its position on the amplifier's segment grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandPlan {
    pub label: String,
    pub band_start: Frequency,
    pub band_end: Frequency,
    pub segment_size_hz: u64,
    /// Any center on the infinite grid `reference + k * segment_size`.
    pub grid_reference_center: Frequency,
    /// Per-band drive override; the sequencer falls back to its default.
    pub drive_power_watts: Option<u32>,
}

impl BandPlan {
    pub fn new(
        label: impl Into<String>,
        band_start: Frequency,
        band_end: Frequency,
        segment_size_hz: u64,
        grid_reference_center: Frequency,
    ) -> TrainerResult<Self> {
        let label = label.into();
        if band_end <= band_start {
            return Err(TrainerError::Config(format!(
                "band {label}: end {band_end} must be above start {band_start}"
            )));
        }
        if segment_size_hz == 0 {
            return Err(TrainerError::Config(format!(
                "band {label}: segment size must be > 0"
            )));
        }
        Ok(Self {
            label,
            band_start,
            band_end,
            segment_size_hz,
            grid_reference_center,
            drive_power_watts: None,
        })
    }

    pub fn with_drive_power(mut self, watts: u32) -> Self {
        self.drive_power_watts = Some(watts);
        self
    }

    pub fn width_hz(&self) -> u64 {
        self.band_end.0 - self.band_start.0
    }
}

/// A single stop in the run: which band, and where to park the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuningPoint {
    pub band: String,
    pub frequency: Frequency,
}

/// Snapshot of what a link can currently do. Read by the PTT selection logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFlags {
    pub ptt_readable: bool,
    pub supports_edge_wait: bool,
}

/// A flag that starts raised and can only ever be lowered.
///
/// Clones share the same underlying flag, so a background worker and the
/// foreground link observe the same latch.
#[derive(Debug, Clone)]
pub struct Latch(Arc<AtomicBool>);

impl Latch {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_up(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Lower the latch. Returns `true` only for the call that actually lowered it.
    pub fn trip(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-instance capability state of one radio link.
#[derive(Debug, Clone, Default)]
pub struct LinkCapabilities {
    ptt_readable: Latch,
    edge_wait: Latch,
}

impl LinkCapabilities {
    pub fn new(edge_wait: bool) -> Self {
        let caps = Self::default();
        if !edge_wait {
            caps.edge_wait.trip();
        }
        caps
    }

    pub fn snapshot(&self) -> CapabilityFlags {
        CapabilityFlags {
            ptt_readable: self.ptt_readable.is_up(),
            supports_edge_wait: self.edge_wait.is_up(),
        }
    }

    /// Without readable PTT there can be no edges either.
    pub fn mark_ptt_unreadable(&self) -> bool {
        self.edge_wait.trip();
        self.ptt_readable.trip()
    }

    pub fn mark_edge_wait_unsupported(&self) -> bool {
        self.edge_wait.trip()
    }

    pub fn ptt_readable(&self) -> bool {
        self.ptt_readable.is_up()
    }

    pub fn edge_wait(&self) -> bool {
        self.edge_wait.is_up()
    }
}

/// Mirror of one receiver/transmitter slice on an event-driven radio.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceState {
    pub id: u32,
    pub mode: Option<String>,
    pub frequency: Option<Frequency>,
    pub transmitting: bool,
}

/// First-observed radio state, used to put things back at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSnapshot {
    pub channel_id: Option<u32>,
    pub mode: Option<String>,
    pub frequency: Option<Frequency>,
}

impl RestoreSnapshot {
    pub fn is_complete(&self) -> bool {
        self.mode.is_some() && self.frequency.is_some()
    }
}

impl fmt::Display for RestoreSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = self.channel_id {
            write!(f, "slice={id} ")?;
        }
        write!(f, "mode={}", self.mode.as_deref().unwrap_or("unknown"))?;
        if let Some(freq) = self.frequency {
            write!(f, " freq={freq}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_from_khz_rounds_once() {
        assert_eq!(Frequency::khz(5351.5).as_hz(), 5_351_500);
        assert_eq!(Frequency::khz(14_070.25).as_hz(), 14_070_250);
    }

    #[test]
    fn frequency_truncates_to_khz() {
        assert_eq!(Frequency::hz(14_070_999).truncated_khz(), 14_070);
        assert_eq!(Frequency::hz(14_070_000).truncated_khz(), 14_070);
    }

    #[test]
    fn frequency_displays_as_triplet() {
        assert_eq!(Frequency::hz(5_354_800).to_string(), "5.354.800");
        assert_eq!(Frequency::hz(14_000_050).to_string(), "14.000.050");
    }

    #[test]
    fn mhz_text_is_exact() {
        assert_eq!(Frequency::hz(7_090_000).mhz_text(), "7.090000");
        assert_eq!(Frequency::hz(5_353_250).mhz_text(), "5.353250");
    }

    #[test]
    fn parse_mhz_without_float_drift() {
        assert_eq!(Frequency::parse_mhz("7.09"), Some(Frequency::hz(7_090_000)));
        assert_eq!(Frequency::parse_mhz("14.250000"), Some(Frequency::hz(14_250_000)));
        assert_eq!(Frequency::parse_mhz("5.3532505"), Some(Frequency::hz(5_353_250)));
        assert_eq!(Frequency::parse_mhz("28"), Some(Frequency::hz(28_000_000)));
        assert_eq!(Frequency::parse_mhz("abc"), None);
        assert_eq!(Frequency::parse_mhz(""), None);
    }

    #[test]
    fn band_plan_rejects_inverted_limits() {
        let err = BandPlan::new(
            "40m",
            Frequency::khz(7200.0),
            Frequency::khz(7000.0),
            25_000,
            Frequency::khz(7012.5),
        );
        assert!(matches!(err, Err(TrainerError::Config(_))));
    }

    #[test]
    fn band_plan_rejects_zero_segment() {
        let err = BandPlan::new(
            "40m",
            Frequency::khz(7000.0),
            Frequency::khz(7200.0),
            0,
            Frequency::khz(7012.5),
        );
        assert!(matches!(err, Err(TrainerError::Config(_))));
    }

    #[test]
    fn latch_only_goes_down() {
        let latch = Latch::new();
        let shared = latch.clone();
        assert!(latch.is_up());
        assert!(shared.trip());
        assert!(!latch.is_up());
        assert!(!latch.trip(), "second trip reports no change");
    }

    #[test]
    fn losing_ptt_also_loses_edge_wait() {
        let caps = LinkCapabilities::new(true);
        assert_eq!(
            caps.snapshot(),
            CapabilityFlags {
                ptt_readable: true,
                supports_edge_wait: true
            }
        );
        caps.mark_ptt_unreadable();
        assert_eq!(
            caps.snapshot(),
            CapabilityFlags {
                ptt_readable: false,
                supports_edge_wait: false
            }
        );
    }

    #[test]
    fn snapshot_display_omits_unknown_frequency() {
        let snap = RestoreSnapshot {
            channel_id: Some(0),
            mode: Some("LSB".into()),
            frequency: None,
        };
        assert_eq!(snap.to_string(), "slice=0 mode=LSB");
        assert!(!snap.is_complete());
    }
}
