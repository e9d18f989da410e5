//! Pure decoding: reply lines + command context → RigctlReply.
//!
//! rigctld answers sets with `RPRT <code>` and queries with the value, but
//! some builds send `RPRT 0` before the value and some split a mode reply
//! over two lines. The session collects those lines; this module only
//! interprets them.

use crate::domain::{Frequency, TrainerError, TrainerResult};

use super::{encode, RigctlCommand, RigctlReply, RPRT_FEATURE_UNAVAILABLE};

/// `Some(code)` if `line` is an `RPRT <code>` report.
pub fn report_code(line: &str) -> Option<i32> {
    let rest = line.trim();
    let rest = rest
        .strip_prefix("RPRT")
        .or_else(|| rest.strip_prefix("rprt"))?;
    rest.split_whitespace().next()?.parse().ok()
}

/// Decode the reply lines received for `cmd`.
pub fn decode(lines: &[String], cmd: &RigctlCommand) -> TrainerResult<RigctlReply> {
    let wire = encode(cmd);

    // An error report anywhere wins over a value that follows it
    for line in lines {
        match report_code(line) {
            Some(RPRT_FEATURE_UNAVAILABLE) => return Ok(RigctlReply::FeatureUnavailable),
            Some(code) if code < 0 => {
                return Err(TrainerError::Rejected {
                    command: wire,
                    code: format!("RPRT {code}"),
                })
            }
            _ => {}
        }
    }

    let values: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && report_code(l).is_none())
        .collect();

    if !cmd.expects_value() {
        if let Some(extra) = values.first() {
            log::debug!("[rigctl] unexpected text after '{wire}': '{extra}'");
        }
        return Ok(RigctlReply::Ok);
    }

    let Some(first) = values.first() else {
        return Err(TrainerError::Transport(format!(
            "no value in reply to '{wire}'"
        )));
    };

    match cmd {
        RigctlCommand::GetFrequency => parse_frequency(first)
            .map(RigctlReply::Frequency)
            .ok_or_else(|| unexpected(&wire, first)),
        RigctlCommand::GetPtt => first
            .split_whitespace()
            .next()
            .and_then(|t| t.parse::<i64>().ok())
            .map(|v| RigctlReply::Ptt(v != 0))
            .ok_or_else(|| unexpected(&wire, first)),
        RigctlCommand::GetMode => {
            let mut parts = first.split_whitespace();
            let mode = parts
                .next()
                .map(str::to_ascii_uppercase)
                .ok_or_else(|| unexpected(&wire, first))?;
            let passband_hz = parts
                .next()
                .or_else(|| values.get(1).and_then(|l| l.split_whitespace().next()))
                .and_then(|w| w.parse::<u32>().ok());
            Ok(RigctlReply::Mode { mode, passband_hz })
        }
        _ => Ok(RigctlReply::Ok),
    }
}

/// rigctld prints Hz, occasionally with a fractional part (`7090000.000000`).
fn parse_frequency(text: &str) -> Option<Frequency> {
    let token = text.split_whitespace().next()?;
    let whole = token.split('.').next()?;
    whole.parse::<u64>().ok().map(Frequency::hz)
}

fn unexpected(wire: &str, reply: &str) -> TrainerError {
    TrainerError::Rejected {
        command: wire.to_string(),
        code: format!("unexpected reply '{reply}'"),
    }
}
