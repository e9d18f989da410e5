//! Operator console port trait
//!
//! Everything the operator sees or confirms goes through this trait, so the
//! PTT state machine and the sequencer can run against a scripted console in
//! tests.

use crate::domain::TrainerResult;

/// What the console is currently waiting on, for status-line rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Waiting for the operator to key a carrier
    Carrier,
    /// Carrier is up; waiting for the operator to unkey
    Unkey,
}

pub trait OperatorConsole: Send {
    /// Print an informational line
    fn say(&mut self, message: &str);

    /// Block until the operator acknowledges `prompt`
    fn confirm(&mut self, prompt: &str) -> TrainerResult<()>;

    /// Called repeatedly while a PTT wait is in progress
    fn waiting(&mut self, phase: WaitPhase, elapsed_secs: f64);

    /// Clear any in-place status after a wait finishes
    fn wait_finished(&mut self, phase: WaitPhase, observed: bool);

    /// Short audible cue before a segment
    fn beep(&mut self) {}
}
