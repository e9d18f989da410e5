//! PTT acquisition: how we find out that the operator keyed and unkeyed.
//!
//! Three sensing tiers, picked once per session from the link's
//! capabilities and the configuration:
//! - `EventDriven`: block on the link's PTT edges
//! - `Polling`: sample `get_ptt` at a fixed interval
//! - `Manual`: the operator confirms key-down and unkey at the console
//!
//! The only transition is a one-way fall back to `Manual`.

pub mod acquisition;

pub use acquisition::PttAcquisition;

use std::fmt;
use std::time::Duration;

use crate::domain::{CapabilityFlags, RadioSettings, SessionDefaults};

/// Floor for the wait step so a zero in the config cannot spin the CPU
const MIN_STEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    EventDriven,
    Polling,
    Manual,
}

impl SessionMode {
    pub fn is_automatic(&self) -> bool {
        !matches!(self, SessionMode::Manual)
    }

    /// The tier after a requested change, or `None` if the change would
    /// climb back up. Dropping to `Manual` is the only real move.
    pub fn demoted_to(self, next: SessionMode) -> Option<SessionMode> {
        match next {
            _ if next == self => Some(self),
            SessionMode::Manual => Some(SessionMode::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::EventDriven => "event-driven",
            SessionMode::Polling => "polling",
            SessionMode::Manual => "manual",
        };
        f.write_str(name)
    }
}

/// Timing and override knobs for PTT acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct PttSettings {
    pub force_manual: bool,
    /// Backend is a simulator with no real PTT (e.g. Hamlib dummy rig)
    pub simulation: bool,
    /// No key-down within this window drops the session to `Manual`
    pub adaptive_fallback_after: Duration,
    pub wait_tx_timeout: Duration,
    pub wait_unkey_timeout: Duration,
    /// Slice length for event-driven waits; also the status refresh period
    pub wait_step: Duration,
    pub poll_interval: Duration,
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

impl PttSettings {
    pub fn from_config(defaults: &SessionDefaults, radio: &RadioSettings) -> Self {
        Self {
            force_manual: defaults.force_manual_ptt,
            simulation: radio.is_simulation(),
            adaptive_fallback_after: secs(defaults.ptt_adaptive_fallback_after_s),
            wait_tx_timeout: secs(defaults.wait_tx_timeout_s),
            wait_unkey_timeout: secs(defaults.wait_unkey_timeout_s),
            wait_step: secs(defaults.wait_step_s).max(MIN_STEP),
            poll_interval: secs(defaults.poll_interval_s).max(MIN_STEP),
        }
    }

    /// How long to wait for key-down before giving up on automatic sensing
    pub fn key_down_window(&self) -> Duration {
        self.adaptive_fallback_after.min(self.wait_tx_timeout)
    }
}

impl Default for PttSettings {
    fn default() -> Self {
        Self::from_config(&SessionDefaults::default(), &RadioSettings::default())
    }
}

/// Pick the sensing tier for a new session, with the reason for `Manual`.
pub fn select_mode(caps: CapabilityFlags, settings: &PttSettings) -> (SessionMode, Option<&'static str>) {
    if settings.force_manual {
        return (SessionMode::Manual, Some("force_manual_ptt=true"));
    }
    if !caps.ptt_readable {
        return (SessionMode::Manual, Some("backend has no readable PTT"));
    }
    if settings.simulation {
        return (SessionMode::Manual, Some("simulated radio"));
    }
    if caps.supports_edge_wait {
        (SessionMode::EventDriven, None)
    } else {
        (SessionMode::Polling, None)
    }
}
