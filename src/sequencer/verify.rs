//! Amplifier frequency verification gate.
//!
//! The amplifier follows the radio over CAT. Before anyone keys a carrier
//! we make sure it actually sees the frequency we just set, compared on
//! whole-kHz boundaries. If it never does, the run stops.

use std::time::Duration;

use crate::domain::{Frequency, TrainerError, TrainerResult};
use crate::ports::AmplifierMonitor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifySettings {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_secs(2),
        }
    }
}

/// Poll the amplifier until its reported frequency truncates to the same kHz
/// as `expected`. Read failures count as failed attempts. Exhausting the
/// budget is a `Safety` error.
pub fn verify_amplifier_frequency(
    amplifier: &mut dyn AmplifierMonitor,
    expected: Frequency,
    settings: &VerifySettings,
) -> TrainerResult<()> {
    let attempts = settings.max_attempts.max(1);
    let mut last_seen = String::from("no reading");

    for attempt in 1..=attempts {
        match amplifier
            .reported_frequency()
            .and_then(|r| r.matches(expected).map(|ok| (r, ok)))
        {
            Ok((_, true)) => {
                log::debug!("[RF2K-S] frequency {} kHz confirmed", expected.truncated_khz());
                return Ok(());
            }
            Ok((reported, false)) => {
                last_seen = format!("{} {:?}", reported.value, reported.unit);
                log::warn!(
                    "[RF2K-S] attempt {attempt}/{attempts}: amplifier reports {last_seen}, expected {} kHz",
                    expected.truncated_khz()
                );
            }
            Err(e) => {
                last_seen = e.to_string();
                log::warn!("[RF2K-S] attempt {attempt}/{attempts}: {e}");
            }
        }
        if attempt < attempts {
            std::thread::sleep(settings.delay);
        }
    }

    Err(TrainerError::Safety(format!(
        "amplifier frequency check failed for {} MHz after {attempts} attempts (last: {last_seen})",
        expected.mhz_text()
    )))
}
