//! Mock radio adapter for dry runs and tests without hardware.
//!
//! Select it with `"type": "mock"` in the radio section of the config.
//! Every `RadioLink` call is logged at INFO level and appended to a shared
//! command log, so you can see exactly what a real radio would be sent.
//! It has no RF path, so PTT is never readable and sessions run in manual mode.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::domain::{CapabilityFlags, Frequency, LinkCapabilities, RestoreSnapshot, TrainerResult};
use crate::net::lock;
use crate::ports::RadioLink;

/// Default frequency: 20m CW
const DEFAULT_FREQ_HZ: u64 = 14_060_000;
const DEFAULT_MODE: &str = "USB";

pub struct MockRadioLink {
    frequency: Frequency,
    mode: String,
    drive_watts: Option<u32>,
    snapshot: Option<RestoreSnapshot>,
    caps: LinkCapabilities,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockRadioLink {
    pub fn new() -> Self {
        let caps = LinkCapabilities::new(false);
        caps.mark_ptt_unreadable();
        Self {
            frequency: Frequency::hz(DEFAULT_FREQ_HZ),
            mode: DEFAULT_MODE.to_string(),
            drive_watts: None,
            snapshot: None,
            caps,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared handle to every command this radio has accepted
    pub fn command_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    fn record(&self, entry: String) {
        log::info!("[MOCK RADIO] {entry}");
        lock(&self.log).push(entry);
    }
}

impl Default for MockRadioLink {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioLink for MockRadioLink {
    fn connect(&mut self) -> TrainerResult<()> {
        let snap = RestoreSnapshot {
            channel_id: None,
            mode: Some(self.mode.clone()),
            frequency: Some(self.frequency),
        };
        log::info!("[MOCK RADIO] connected; [SNAPSHOT] {snap}");
        self.snapshot = Some(snap);
        Ok(())
    }

    fn set_mode(&mut self, mode: &str, bandwidth_hz: u32) -> TrainerResult<()> {
        if self.mode.eq_ignore_ascii_case(mode) {
            return Ok(());
        }
        self.record(format!("SET MODE {mode} {bandwidth_hz}"));
        self.mode = mode.to_ascii_uppercase();
        Ok(())
    }

    fn set_frequency(&mut self, freq: Frequency) -> TrainerResult<()> {
        if self.frequency == freq {
            return Ok(());
        }
        self.record(format!("SET FREQ {}", freq.as_hz()));
        self.frequency = freq;
        Ok(())
    }

    fn set_drive_power(&mut self, watts: u32) -> TrainerResult<()> {
        if self.drive_watts == Some(watts) {
            return Ok(());
        }
        self.record(format!("SET POWER {watts}"));
        self.drive_watts = Some(watts);
        Ok(())
    }

    fn get_ptt(&mut self) -> TrainerResult<bool> {
        Ok(false)
    }

    fn wait_for_tx(&mut self, _timeout: Duration) -> bool {
        false
    }

    fn wait_for_unkey(&mut self, _timeout: Duration) -> bool {
        true
    }

    fn capabilities(&self) -> CapabilityFlags {
        self.caps.snapshot()
    }

    fn disable_ptt_sensing(&mut self) {
        self.caps.mark_ptt_unreadable();
    }

    fn description(&self) -> &str {
        "Mock radio (no hardware)"
    }

    fn disconnect(&mut self) {
        log::info!("[MOCK RADIO] disconnected");
    }

    fn shutdown(&mut self, restore: bool) {
        if restore {
            if let Some(snap) = self.snapshot.clone() {
                if let Some(mode) = &snap.mode {
                    self.mode = mode.clone();
                }
                if let Some(freq) = snap.frequency {
                    self.frequency = freq;
                }
                self.record(format!("RESTORE {snap}"));
            }
        }
        self.disconnect();
    }
}
