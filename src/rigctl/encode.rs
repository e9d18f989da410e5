//! Pure encoding: RigctlCommand → rigctld wire line (without the newline).

use super::RigctlCommand;

pub fn encode(cmd: &RigctlCommand) -> String {
    use RigctlCommand::*;
    match cmd {
        SetFrequency(freq) => format!("F {}", freq.as_hz()),
        SetMode { mode, passband_hz } => format!("M {} {passband_hz}", mode.to_ascii_uppercase()),
        GetFrequency => "f".into(),
        GetMode => "m".into(),
        GetPtt => "t".into(),
    }
}
