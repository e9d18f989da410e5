//! Radio link port trait

use std::time::Duration;

use crate::domain::{CapabilityFlags, Frequency, TrainerResult};

/// Trait for the radio backends the sequencer drives (mode, frequency, drive, PTT).
///
/// `set_*` calls are no-ops when the link already knows the radio is in the
/// requested state. The `wait_*` calls never fail: they return `true` if the
/// edge was seen before `timeout` and `false` otherwise.
pub trait RadioLink: Send {
    /// Open the connection and capture the restore snapshot (best effort)
    fn connect(&mut self) -> TrainerResult<()>;

    /// Set operating mode (e.g. "CW") and passband width in Hz
    fn set_mode(&mut self, mode: &str, bandwidth_hz: u32) -> TrainerResult<()>;

    /// Tune the active channel
    fn set_frequency(&mut self, freq: Frequency) -> TrainerResult<()>;

    /// Set transmit drive. Backends that cannot do this log and return `Ok`.
    fn set_drive_power(&mut self, watts: u32) -> TrainerResult<()>;

    /// Instantaneous PTT state
    fn get_ptt(&mut self) -> TrainerResult<bool>;

    /// Block until the radio starts transmitting, or `timeout` elapses
    fn wait_for_tx(&mut self, timeout: Duration) -> bool;

    /// Block until the radio stops transmitting, or `timeout` elapses
    fn wait_for_unkey(&mut self, timeout: Duration) -> bool;

    /// Current (possibly downgraded) capabilities
    fn capabilities(&self) -> CapabilityFlags;

    /// Permanently stop offering automatic PTT sensing for this session
    fn disable_ptt_sensing(&mut self);

    /// Human-readable backend name for logs
    fn description(&self) -> &str;

    /// Close the connection without touching radio state
    fn disconnect(&mut self);

    /// Stop background workers, optionally put the radio back as it was found,
    /// then disconnect. Never fails; problems are logged.
    fn shutdown(&mut self, restore: bool);
}
