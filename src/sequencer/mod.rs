//! TuningSequencer: walks the plan, one segment at a time.
//!
//! Per band: mode and drive power. Per segment: tune, let the amplifier's
//! CAT follower catch up, verify it sees the same kHz, run a PTT cycle,
//! hand the result to telemetry. A failed verification or a dead console
//! stops the run; anything else skips the segment.

pub mod briefing;
pub mod summary;
pub mod verify;

pub use briefing::show_instructions;
pub use summary::{pretty_duration, RunSummary};
pub use verify::{verify_amplifier_frequency, VerifySettings};

use std::time::{Duration, Instant};

use crate::domain::{BandPlan, TrainerConfig, TrainerError, TrainerResult, TuningPoint};
use crate::plan::TuningPlan;
use crate::ports::{AmplifierMonitor, OperatorConsole, RadioLink, SegmentRecord, TelemetrySink};
use crate::ptt::{PttAcquisition, PttSettings};

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerSettings {
    /// Set `mode`/`bandwidth_hz` at each band change
    pub auto_set_mode: bool,
    pub mode: String,
    pub bandwidth_hz: u32,
    /// Used for bands without their own drive power
    pub default_drive_watts: u32,
    /// `None` disables the amplifier frequency gate
    pub verify: Option<VerifySettings>,
    /// Pause after tuning so the amplifier's CAT follower sees the change
    pub cat_settle: Duration,
    pub use_beep: bool,
}

impl SequencerSettings {
    pub fn from_config(config: &TrainerConfig) -> Self {
        let amp = &config.amplifier;
        // A simulated radio has no RF for the amplifier to follow
        let verify = (amp.can_verify_frequency() && !config.radio.is_simulation()).then(
            || VerifySettings {
                max_attempts: amp.verify_max_attempts,
                delay: Duration::from_millis(amp.verify_delay_ms),
            },
        );
        Self {
            auto_set_mode: config.defaults.auto_set_cw_mode,
            mode: config.defaults.mode.clone(),
            bandwidth_hz: config.defaults.bandwidth_hz,
            default_drive_watts: config.defaults.drive_power,
            verify,
            cat_settle: Duration::from_millis(amp.cat_settle_ms),
            use_beep: config.defaults.use_beep,
        }
    }
}

pub struct TuningSequencer {
    link: Box<dyn RadioLink>,
    amplifier: Option<Box<dyn AmplifierMonitor>>,
    telemetry: Box<dyn TelemetrySink>,
    console: Box<dyn OperatorConsole>,
    ptt: PttAcquisition,
    settings: SequencerSettings,
}

impl TuningSequencer {
    /// `link` must already be connected; PTT sensing is chosen from its capabilities now.
    ///
    /// Asking for frequency verification without an amplifier to read is a
    /// `Config` error: the safety gate would silently never run.
    pub fn new(
        mut link: Box<dyn RadioLink>,
        amplifier: Option<Box<dyn AmplifierMonitor>>,
        telemetry: Box<dyn TelemetrySink>,
        console: Box<dyn OperatorConsole>,
        settings: SequencerSettings,
        ptt_settings: PttSettings,
    ) -> TrainerResult<Self> {
        if settings.verify.is_some() && amplifier.is_none() {
            return Err(TrainerError::Config(
                "amplifier frequency verification needs an amplifier reader".into(),
            ));
        }
        let ptt = PttAcquisition::start(link.as_mut(), ptt_settings);
        Ok(Self {
            link,
            amplifier,
            telemetry,
            console,
            ptt,
            settings,
        })
    }

    pub fn ptt(&self) -> &PttAcquisition {
        &self.ptt
    }

    pub fn link_mut(&mut self) -> &mut dyn RadioLink {
        self.link.as_mut()
    }

    /// Give the link back, e.g. for a final `shutdown`.
    pub fn into_link(self) -> Box<dyn RadioLink> {
        self.link
    }

    /// Walk every point in order. `Safety` and `Console` errors abort
    /// immediately; any other per-segment problem is logged and the segment
    /// counted as skipped.
    pub fn run(&mut self, plan: &TuningPlan) -> TrainerResult<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut last_band: Option<&str> = None;

        for point in plan.points() {
            if last_band != Some(point.band.as_str()) {
                last_band = Some(point.band.as_str());
                summary.touch_band(&point.band);
                self.console.say("");
                log::info!("=== Band: {} ===", point.band);
                if let Err(e) = self.prepare_band(plan.band(&point.band)) {
                    log::error!("[RADIO] Band prep failed for {}: {e}", point.band);
                    summary.segments_skipped += 1;
                    continue;
                }
            }

            match self.tune_segment(point) {
                Ok(()) => summary.segments_tuned += 1,
                Err(e) if e.is_abort() => {
                    log::error!("[RUN] aborting at {} @ {}: {e}", point.band, point.frequency);
                    return Err(e);
                }
                Err(e) => {
                    log::error!(
                        "[RADIO] segment {} @ {} skipped: {e}",
                        point.band,
                        point.frequency
                    );
                    summary.segments_skipped += 1;
                }
            }
        }

        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn prepare_band(&mut self, band: Option<&BandPlan>) -> TrainerResult<()> {
        if self.settings.auto_set_mode {
            self.link
                .set_mode(&self.settings.mode, self.settings.bandwidth_hz)?;
        }
        let watts = band
            .and_then(|b| b.drive_power_watts)
            .unwrap_or(self.settings.default_drive_watts);
        self.link.set_drive_power(watts)
    }

    fn tune_segment(&mut self, point: &TuningPoint) -> TrainerResult<()> {
        self.link.set_frequency(point.frequency)?;

        if let (Some(verify), Some(amp)) = (self.settings.verify, self.amplifier.as_mut()) {
            std::thread::sleep(self.settings.cat_settle);
            verify_amplifier_frequency(amp.as_mut(), point.frequency, &verify)?;
        }

        self.console.say(&format!(
            "=== Tuning {} band @ {} MHz ===",
            point.band,
            point.frequency.mhz_text()
        ));
        self.console
            .say("Key a steady carrier, tune and store the match on the amplifier, then unkey.");
        if self.settings.use_beep {
            self.console.beep();
        }

        let automatic = self
            .ptt
            .run_cycle(self.link.as_mut(), self.console.as_mut())?;

        let (readings, tuner) = match self.amplifier.as_mut() {
            Some(amp) => {
                let readings = if automatic {
                    amp.readings()
                        .map_err(|e| log::debug!("[LOG] amplifier readings unavailable: {e}"))
                        .ok()
                } else {
                    None
                };
                let tuner = amp
                    .tuner_setting()
                    .map_err(|e| log::debug!("[LOG] tuner readout failed: {e}"))
                    .ok();
                (readings, tuner)
            }
            None => (None, None),
        };
        let record = SegmentRecord {
            band: point.band.clone(),
            frequency: point.frequency,
            used_automatic_sensing: automatic,
            readings,
            tuner,
        };
        if let Err(e) = self.telemetry.record_segment(&record) {
            log::debug!("[LOG] telemetry write failed: {e}");
        }
        Ok(())
    }
}
