//! The per-segment "key a carrier, tune, unkey" cycle.

use std::time::{Duration, Instant};

use crate::domain::{TrainerError, TrainerResult};
use crate::ports::{OperatorConsole, RadioLink, WaitPhase};

use super::{select_mode, PttSettings, SessionMode};

/// Outcome of a single automatic wait
enum Sensed {
    Edge,
    Timeout,
    /// The link stopped offering PTT while we waited
    Lost,
}

/// PTT acquisition for one session. Once `Manual`, always `Manual`.
pub struct PttAcquisition {
    mode: SessionMode,
    settings: PttSettings,
    manual_announced: bool,
}

impl PttAcquisition {
    /// Read PTT once, then evaluate the selection rules against the
    /// connected link. A backend that cannot report PTT says so on this
    /// first read instead of in the middle of the first segment.
    pub fn start(link: &mut dyn RadioLink, settings: PttSettings) -> Self {
        if !settings.force_manual && link.capabilities().ptt_readable {
            match link.get_ptt() {
                Ok(on) => log::debug!("[PTT] startup read: {}", if on { "TX" } else { "RX" }),
                Err(e) => log::debug!("[PTT] startup read failed (ignored): {e}"),
            }
        }
        let (mode, reason) = select_mode(link.capabilities(), &settings);
        match reason {
            Some(reason) => log::warn!(
                "[PTT] Immediate MANUAL mode: {reason}. Using manual prompts for this and remaining segments."
            ),
            None => log::info!("[PTT] {mode} PTT sensing on {}", link.description()),
        }
        Self {
            mode,
            settings,
            manual_announced: false,
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn settings(&self) -> &PttSettings {
        &self.settings
    }

    /// Move to `next` if that is a legal demotion. Returns whether the tier changed.
    fn demote_to(&mut self, next: SessionMode) -> bool {
        match self.mode.demoted_to(next) {
            Some(mode) if mode != self.mode => {
                self.mode = mode;
                true
            }
            Some(_) => false,
            None => {
                log::error!("[PTT] refusing to move from {} back up to {next}", self.mode);
                false
            }
        }
    }

    /// One-way latch to `Manual`; the link is told to stop offering sensing.
    fn fall_back_to_manual(&mut self, link: &mut dyn RadioLink, why: &str) {
        if !self.demote_to(SessionMode::Manual) {
            return;
        }
        log::warn!("[PTT] {why}. Falling back to MANUAL prompts for this and remaining segments.");
        link.disable_ptt_sensing();
    }

    /// Run one acquire-then-release cycle.
    ///
    /// Returns `true` only if both the key-down and the unkey were sensed
    /// automatically. Manual cycles, and automatic cycles that fell back to
    /// manual or missed the unkey, return `false`.
    pub fn run_cycle(
        &mut self,
        link: &mut dyn RadioLink,
        console: &mut dyn OperatorConsole,
    ) -> TrainerResult<bool> {
        if self.mode.is_automatic() && !link.capabilities().ptt_readable {
            self.fall_back_to_manual(link, "link reports PTT is no longer readable");
        }
        if !self.mode.is_automatic() {
            self.manual_cycle(console)?;
            return Ok(false);
        }

        let window = self.settings.key_down_window();
        match self.sense(link, console, WaitPhase::Carrier, window) {
            Sensed::Edge => {}
            Sensed::Timeout => {
                let why = format!(
                    "No PTT change detected within {:.1}s",
                    window.as_secs_f64()
                );
                self.fall_back_to_manual(link, &why);
                self.manual_cycle(console)?;
                return Ok(false);
            }
            Sensed::Lost => {
                self.fall_back_to_manual(link, "PTT sensing became unavailable");
                self.manual_cycle(console)?;
                return Ok(false);
            }
        }

        console.say("[PTT] Carrier detected, radio is transmitting. Tune the amplifier now.");
        console.say("       Keep transmitting! Unkey only AFTER tuning is complete and stored.");

        let unkey_timeout = self.settings.wait_unkey_timeout;
        match self.sense(link, console, WaitPhase::Unkey, unkey_timeout) {
            Sensed::Edge => {
                console.say("[PTT] Carrier stopped.");
                Ok(true)
            }
            Sensed::Timeout => {
                log::warn!("[WAIT] Timeout waiting for unkey. Continuing.");
                Ok(false)
            }
            Sensed::Lost => {
                self.fall_back_to_manual(link, "PTT sensing became unavailable");
                console.confirm("Press ENTER AFTER you have UNKEYED (stopped transmitting)...")?;
                Ok(false)
            }
        }
    }

    /// Wait for one edge with console feedback, using this session's tier.
    fn sense(
        &self,
        link: &mut dyn RadioLink,
        console: &mut dyn OperatorConsole,
        phase: WaitPhase,
        timeout: Duration,
    ) -> Sensed {
        let started = Instant::now();
        let deadline = started + timeout;
        let want_tx = phase == WaitPhase::Carrier;

        let outcome = loop {
            let now = Instant::now();
            if now >= deadline {
                break Sensed::Timeout;
            }
            console.waiting(phase, started.elapsed().as_secs_f64());

            let step_result = match self.mode {
                SessionMode::EventDriven => {
                    let step = self.settings.wait_step.min(deadline - now);
                    let seen = if want_tx {
                        link.wait_for_tx(step)
                    } else {
                        link.wait_for_unkey(step)
                    };
                    if seen {
                        Some(Sensed::Edge)
                    } else if !link.capabilities().ptt_readable {
                        Some(Sensed::Lost)
                    } else {
                        None
                    }
                }
                SessionMode::Polling => {
                    let result = match link.get_ptt() {
                        Ok(on) if on == want_tx => Some(Sensed::Edge),
                        Ok(_) => None,
                        Err(TrainerError::Capability(_)) => Some(Sensed::Lost),
                        Err(e) => {
                            log::warn!("[WAIT] radio error, retrying: {e}");
                            None
                        }
                    };
                    if result.is_none() {
                        let left = deadline.saturating_duration_since(Instant::now());
                        std::thread::sleep(self.settings.poll_interval.min(left));
                    }
                    result
                }
                SessionMode::Manual => Some(Sensed::Lost),
            };
            if let Some(outcome) = step_result {
                break outcome;
            }
        };

        console.wait_finished(phase, matches!(outcome, Sensed::Edge));
        outcome
    }

    fn manual_cycle(&mut self, console: &mut dyn OperatorConsole) -> TrainerResult<()> {
        if !self.manual_announced {
            console.say("[PTT] Manual mode engaged.");
            console.say("     This backend does not provide reliable PTT status.");
            self.manual_announced = true;
        }
        console.confirm("When you are READY to key a steady carrier, press ENTER, then key down.")?;
        console.say("Begin transmitting a steady carrier (key down), then tune and store on the amplifier.");
        console.confirm("Press ENTER AFTER you have UNKEYED (stopped transmitting)...")?;
        console.say("[PTT] Carrier stopped (manual).");
        Ok(())
    }
}
