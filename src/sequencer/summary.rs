//! End-of-run statistics

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Bands in the order they were first touched
    pub bands: Vec<String>,
    pub segments_tuned: usize,
    pub segments_skipped: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn touch_band(&mut self, label: &str) {
        if !self.bands.iter().any(|b| b == label) {
            self.bands.push(label.to_string());
        }
    }

    pub fn average_per_segment(&self) -> Duration {
        match u32::try_from(self.segments_tuned) {
            Ok(n) if n > 0 => self.elapsed / n,
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== TUNING COMPLETE ===")?;
        writeln!(f, "Bands tuned      : {}", self.bands.len())?;
        writeln!(f, "Segments tuned   : {}", self.segments_tuned)?;
        writeln!(f, "Segments skipped : {}", self.segments_skipped)?;
        writeln!(f, "Total time       : {}", pretty_duration(self.elapsed))?;
        writeln!(
            f,
            "Avg time/segment : {}",
            pretty_duration(self.average_per_segment())
        )?;
        write!(f, "=======================")
    }
}

/// `850 ms`, `3.40 s`, `22m 03s`, `1h 2m 05s`
pub fn pretty_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 0.001 {
        return "0 ms".into();
    }
    if secs < 1.0 {
        return format!("{:.0} ms", secs * 1_000.0);
    }
    if secs < 60.0 {
        return format!("{secs:.2} s");
    }
    let total = secs.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}
