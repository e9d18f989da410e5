//! Domain error types

use thiserror::Error;

/// Errors that can occur while sequencing the radio and amplifier
#[derive(Error, Debug)]
pub enum TrainerError {
    /// Socket failure, closed connection or unusable stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// No correlated acknowledgement arrived before the deadline
    #[error("ACK timeout after {waited_ms} ms for command '{command}'")]
    AckTimeout { command: String, waited_ms: u64 },

    /// The radio answered, but with a non-zero or unparseable return code
    #[error("Command '{command}' rejected: {code}")]
    Rejected { command: String, code: String },

    /// The backend reported that a feature is not available
    #[error("Capability unavailable: {0}")]
    Capability(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Amplifier frequency verification exhausted its budget. Always fatal.
    #[error("Safety violation: {0}")]
    Safety(String),

    #[error("Amplifier error: {0}")]
    Amplifier(String),

    #[error("Operator console error: {0}")]
    Console(String),
}

impl TrainerError {
    /// A safety violation: the amplifier may not be following the radio.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TrainerError::Safety(_))
    }

    /// Errors that end a run instead of skipping one segment. A dead
    /// operator console cannot confirm anything further.
    pub fn is_abort(&self) -> bool {
        matches!(self, TrainerError::Safety(_) | TrainerError::Console(_))
    }

    /// Errors that mean the link itself is gone rather than the command being refused.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TrainerError::Transport(_) | TrainerError::AckTimeout { .. }
        )
    }
}

impl From<std::io::Error> for TrainerError {
    fn from(e: std::io::Error) -> Self {
        TrainerError::Transport(e.to_string())
    }
}

/// Result type alias for trainer operations
pub type TrainerResult<T> = Result<T, TrainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_safety_is_fatal() {
        assert!(TrainerError::Safety("mismatch".into()).is_fatal());
        assert!(!TrainerError::Transport("reset".into()).is_fatal());
        assert!(!TrainerError::Capability("RPRT -11".into()).is_fatal());
    }

    #[test]
    fn console_loss_aborts_but_is_not_a_safety_issue() {
        let closed = TrainerError::Console("input closed".into());
        assert!(closed.is_abort());
        assert!(!closed.is_fatal());
        assert!(TrainerError::Safety("mismatch".into()).is_abort());
        assert!(!TrainerError::Rejected {
            command: "slice tune 0 7.012500".into(),
            code: "50000015".into(),
        }
        .is_abort());
    }

    #[test]
    fn ack_timeout_counts_as_transport() {
        let e = TrainerError::AckTimeout {
            command: "slice tune 0 7.100000".into(),
            waited_ms: 5000,
        };
        assert!(e.is_transport());
        assert!(e.to_string().contains("5000 ms"));
    }
}
