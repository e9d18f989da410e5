//! Adapters: concrete implementations of the port traits
//!
//! - `terminal_console`: stdin/stdout operator console
//! - `log_telemetry`: CSV records on the `tuner` log target
//! - `rf2ks`: RF2K-S amplifier REST reader
//! - `mock_radio`: hardware-free radio for dry runs

pub mod log_telemetry;
pub mod mock_radio;
pub mod rf2ks;
pub mod terminal_console;

pub use log_telemetry::LogTelemetry;
pub use mock_radio::MockRadioLink;
pub use rf2ks::{OperateMode, Rf2ksClient};
pub use terminal_console::TerminalConsole;

use crate::domain::{RadioSettings, RadioType};
use crate::flex::EventDrivenRadioLink;
use crate::ports::RadioLink;
use crate::rigctl::PollingRadioLink;

/// Build the (not yet connected) link for the configured backend.
pub fn open_radio_link(settings: &RadioSettings) -> Box<dyn RadioLink> {
    log::debug!(
        "[RADIO] backend {:?} at {}:{}",
        settings.radio_type,
        settings.host,
        settings.port()
    );
    match settings.radio_type {
        RadioType::Flex => Box::new(EventDrivenRadioLink::new(settings)),
        RadioType::Rigctl => Box::new(PollingRadioLink::new(settings)),
        RadioType::Mock => Box::new(MockRadioLink::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_backend_by_type() {
        let mock = RadioSettings {
            radio_type: RadioType::Mock,
            ..Default::default()
        };
        assert_eq!(open_radio_link(&mock).description(), "Mock radio (no hardware)");

        let rigctl = RadioSettings::default();
        let link = open_radio_link(&rigctl);
        assert!(link.description().contains("rigctl"));
    }
}
