//! PollingRadioLink: a rig behind Hamlib's rigctld.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::domain::{
    CapabilityFlags, Frequency, LinkCapabilities, RadioSettings, RestoreSnapshot, TrainerError,
    TrainerResult,
};
use crate::net::lock;
use crate::ports::RadioLink;

use super::{PttPoller, PttSignal, RigctlCommand, RigctlReply, RigctlSession};

/// Sampling period for waits that fall back to one-shot `get_ptt`
const SAMPLE_INTERVAL: Duration = Duration::from_millis(200);

pub struct PollingRadioLink {
    session: Arc<Mutex<RigctlSession>>,
    caps: LinkCapabilities,
    signal: Arc<PttSignal>,
    poller: Option<PttPoller>,
    use_poller: bool,
    mode: Option<String>,
    passband_hz: Option<u32>,
    frequency: Option<Frequency>,
    snapshot: Option<RestoreSnapshot>,
    snapshot_passband_hz: Option<u32>,
    drive_warned: bool,
    description: String,
}

impl PollingRadioLink {
    pub fn new(settings: &RadioSettings) -> Self {
        let session = RigctlSession::new(
            settings.host.clone(),
            settings.port(),
            Duration::from_millis(settings.connect_timeout_ms),
        );
        let model = settings
            .model
            .as_deref()
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        Self {
            session: Arc::new(Mutex::new(session)),
            // Edge waits exist only while the background poller runs
            caps: LinkCapabilities::new(settings.ptt_poller),
            signal: Arc::new(PttSignal::new()),
            poller: None,
            use_poller: settings.ptt_poller,
            mode: None,
            passband_hz: None,
            frequency: None,
            snapshot: None,
            snapshot_passband_hz: None,
            drive_warned: false,
            description: format!(
                "Hamlib rigctld at {}:{}{model}",
                settings.host,
                settings.port()
            ),
        }
    }

    fn session(&self) -> MutexGuard<'_, RigctlSession> {
        lock(&self.session)
    }

    fn execute(&self, cmd: &RigctlCommand) -> TrainerResult<RigctlReply> {
        self.session().execute(cmd)
    }

    /// Query mode/width and frequency once; cache them and keep them for restore.
    fn snapshot_state(&mut self) {
        match self.execute(&RigctlCommand::GetMode) {
            Ok(RigctlReply::Mode { mode, passband_hz }) => {
                self.mode = Some(mode);
                self.passband_hz = passband_hz;
            }
            Ok(other) => log::debug!("[GET MODE] unexpected: {other:?}"),
            Err(e) => log::debug!("[GET MODE] failed: {e}"),
        }
        match self.execute(&RigctlCommand::GetFrequency) {
            Ok(RigctlReply::Frequency(freq)) => self.frequency = Some(freq),
            Ok(other) => log::debug!("[GET FREQ] unexpected: {other:?}"),
            Err(e) => log::debug!("[GET FREQ] failed: {e}"),
        }

        let mut line = format!("[SNAPSHOT] mode={}", self.mode.as_deref().unwrap_or("unknown"));
        if let Some(width) = self.passband_hz {
            line.push_str(&format!(" width={width}Hz"));
        }
        if let Some(freq) = self.frequency {
            line.push_str(&format!(" freq={freq}"));
        }
        log::info!("{line}");

        self.snapshot_passband_hz = self.passband_hz;
        self.snapshot = Some(RestoreSnapshot {
            channel_id: None,
            mode: self.mode.clone(),
            frequency: self.frequency,
        });
    }

    fn start_poller(&mut self) {
        match PttPoller::spawn(
            Arc::clone(&self.session),
            self.caps.clone(),
            Arc::clone(&self.signal),
        ) {
            Ok(poller) => self.poller = Some(poller),
            Err(e) => {
                log::warn!("[PTT] could not start poller ({e}); using one-shot polling");
                self.caps.mark_edge_wait_unsupported();
            }
        }
    }

    fn stop_poller(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }

    fn poller_running(&self) -> bool {
        self.caps.edge_wait() && self.poller.as_ref().is_some_and(PttPoller::is_running)
    }

    /// One PTT read. With a deadline, the query and any reconnect give up
    /// when it passes.
    fn read_ptt(&self, deadline: Option<Instant>) -> TrainerResult<bool> {
        if !self.caps.ptt_readable() {
            return Err(TrainerError::Capability("PTT state is not readable".into()));
        }
        if self.poller_running() {
            return Ok(self.signal.current());
        }
        let reply = match deadline {
            Some(deadline) => self.session().execute_by(&RigctlCommand::GetPtt, deadline)?,
            None => self.execute(&RigctlCommand::GetPtt)?,
        };
        match reply {
            RigctlReply::Ptt(on) => Ok(on),
            RigctlReply::FeatureUnavailable => {
                if self.caps.mark_ptt_unreadable() {
                    log::debug!("[PTT] rig/rigctld does not support reading PTT (RPRT -11)");
                }
                Err(TrainerError::Capability("PTT read (RPRT -11)".into()))
            }
            other => Err(TrainerError::Rejected {
                command: "t".into(),
                code: format!("unexpected reply {other:?}"),
            }),
        }
    }

    /// Wait for PTT == `target`: on the poller's edges while it runs, by
    /// sampling `get_ptt` otherwise. Never fails; gives up at the deadline.
    fn wait_for_state(&mut self, target: bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        if self.poller_running() {
            if let Some(reached) = self.signal.wait_for(target, deadline) {
                return reached;
            }
            log::debug!("[WAIT] poller stopped mid-wait; sampling instead");
        }
        loop {
            match self.read_ptt(Some(deadline)) {
                Ok(on) if on == target => return true,
                Ok(_) => {}
                Err(TrainerError::Capability(_)) => return false,
                Err(e) => log::warn!("[WAIT] radio error, retrying: {e}"),
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(SAMPLE_INTERVAL.min(deadline - now));
        }
    }
}

impl RadioLink for PollingRadioLink {
    fn connect(&mut self) -> TrainerResult<()> {
        self.session().connect()?;
        self.snapshot_state();
        if self.use_poller && self.caps.edge_wait() {
            self.start_poller();
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: &str, bandwidth_hz: u32) -> TrainerResult<()> {
        let mode = mode.to_ascii_uppercase();
        if self.mode.as_deref() == Some(mode.as_str()) && self.passband_hz == Some(bandwidth_hz) {
            log::debug!("[MODE] already {mode} {bandwidth_hz}; skipping");
            return Ok(());
        }
        match self.execute(&RigctlCommand::SetMode {
            mode: mode.clone(),
            passband_hz: bandwidth_hz,
        })? {
            RigctlReply::FeatureUnavailable => {
                return Err(TrainerError::Capability(format!("set mode {mode} (RPRT -11)")))
            }
            _ => log::info!("[MODE] Setting {mode} {bandwidth_hz}"),
        }
        self.mode = Some(mode);
        self.passband_hz = Some(bandwidth_hz);
        Ok(())
    }

    fn set_frequency(&mut self, freq: Frequency) -> TrainerResult<()> {
        if self.frequency == Some(freq) {
            log::debug!("[FREQ] already at {freq}; skipping");
            return Ok(());
        }
        if self.execute(&RigctlCommand::SetFrequency(freq))? == RigctlReply::FeatureUnavailable {
            return Err(TrainerError::Capability(format!("set frequency {freq} (RPRT -11)")));
        }
        log::info!("[FREQ] Setting {freq}");
        self.frequency = Some(freq);
        Ok(())
    }

    fn set_drive_power(&mut self, watts: u32) -> TrainerResult<()> {
        if !self.drive_warned {
            log::warn!(
                "Drive power ({watts} W) cannot be set portably via rigctl, configure TX power on the radio."
            );
            self.drive_warned = true;
        }
        Ok(())
    }

    fn get_ptt(&mut self) -> TrainerResult<bool> {
        self.read_ptt(None)
    }

    fn wait_for_tx(&mut self, timeout: Duration) -> bool {
        self.wait_for_state(true, timeout)
    }

    fn wait_for_unkey(&mut self, timeout: Duration) -> bool {
        self.wait_for_state(false, timeout)
    }

    fn capabilities(&self) -> CapabilityFlags {
        self.caps.snapshot()
    }

    fn disable_ptt_sensing(&mut self) {
        self.caps.mark_ptt_unreadable();
        self.stop_poller();
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn disconnect(&mut self) {
        self.stop_poller();
        self.session().close();
        log::info!("Disconnected from rigctld");
    }

    fn shutdown(&mut self, restore: bool) {
        self.stop_poller();
        if restore {
            let connected = self.session().is_connected();
            match self.snapshot.clone() {
                Some(snap) if connected => {
                    if let Some(mode) = &snap.mode {
                        // 0 asks rigctld for the mode's default passband
                        let passband_hz = self.snapshot_passband_hz.unwrap_or(0);
                        let cmd = RigctlCommand::SetMode {
                            mode: mode.clone(),
                            passband_hz,
                        };
                        match self.execute(&cmd) {
                            Ok(_) => log::info!("[RESTORE] mode={mode}"),
                            Err(e) => log::warn!("[RESTORE] mode failed: {e}"),
                        }
                    }
                    match snap.frequency {
                        Some(freq) => match self.execute(&RigctlCommand::SetFrequency(freq)) {
                            Ok(_) => log::info!("[RESTORE] freq={freq}"),
                            Err(e) => log::warn!("[RESTORE] freq failed: {e}"),
                        },
                        None => log::info!("[RESTORE] freq is unknown; skipping frequency restore."),
                    }
                }
                Some(_) => log::info!("[RESTORE] skipped: not connected."),
                None => log::info!("[RESTORE] skipped: no snapshot was taken earlier."),
            }
        }
        self.disconnect();
    }
}
