//! Hamlib rigctld backend.
//!
//! This module separates the concerns of talking to rigctld:
//! - `encode`: translate RigctlCommand → wire line (pure, no I/O)
//! - `decode`: translate reply lines → RigctlReply (pure, no I/O)
//! - `session`: own the TCP connection, reconnect once, read follow-up lines
//! - `poller`: optional background PTT sampler with edge notification
//! - `link`: `PollingRadioLink`, the `RadioLink` implementation
//!
//! The encode/decode functions are pure so they can be tested without a
//! socket.

pub mod decode;
pub mod encode;
pub mod link;
pub mod poller;
pub mod session;

pub use decode::decode;
pub use encode::encode;
pub use link::PollingRadioLink;
pub use poller::{PttPoller, PttSignal};
pub use session::RigctlSession;

use crate::domain::Frequency;

/// rigctld's "feature not available" report code
pub const RPRT_FEATURE_UNAVAILABLE: i32 = -11;

/// Commands this client sends to rigctld.
#[derive(Debug, PartialEq, Clone)]
pub enum RigctlCommand {
    SetFrequency(Frequency),
    /// Mode name e.g. "CW", passband in Hz
    SetMode { mode: String, passband_hz: u32 },
    GetFrequency,
    GetMode,
    GetPtt,
}

impl RigctlCommand {
    /// Queries answer with a value; sets answer with `RPRT <code>`.
    pub fn expects_value(&self) -> bool {
        matches!(
            self,
            RigctlCommand::GetFrequency | RigctlCommand::GetMode | RigctlCommand::GetPtt
        )
    }
}

/// Parsed replies from rigctld.
#[derive(Debug, PartialEq, Clone)]
pub enum RigctlReply {
    /// `RPRT 0`, or a set command answered with nothing at all
    Ok,
    Frequency(Frequency),
    Mode {
        mode: String,
        passband_hz: Option<u32>,
    },
    Ptt(bool),
    /// `RPRT -11`
    FeatureUnavailable,
}
