//! EventDrivenRadioLink: a SmartSDR radio driven over AckTransport.
//!
//! The listener thread feeds every status line through the parser into a
//! mirror of slice, interlock and transmit-power state. The foreground
//! thread reads that mirror to short-circuit redundant commands and to wait
//! for PTT edges. The mirror sits behind a mutex with a condvar that is
//! signalled on every applied event. Live radio state is dropped when the
//! connection goes away; the restore snapshot is not.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::domain::{
    CapabilityFlags, Frequency, LinkCapabilities, RadioSettings, RestoreSnapshot, SliceState,
    TrainerError, TrainerResult,
};
use crate::net::lock;
use crate::ports::RadioLink;

use super::parser::{interlock_is_transmitting, parse_line, FlexEvent, SliceUpdate};
use super::transport::{Ack, AckTransport, LineObserver};

/// Granularity of PTT waits
const WAIT_SLICE: Duration = Duration::from_millis(30);

/// How long connect waits for the first slice report
const FIRST_SLICE_WAIT: Duration = Duration::from_secs(1);

/// Bounded wait for a complete snapshot at connect time
const SNAPSHOT_WAIT: Duration = Duration::from_secs(1);

const CLIENT_PROGRAM: &str = "rf2k-trainer";

/// Everything we know about the radio, as last reported by it.
#[derive(Debug, Default)]
pub struct FlexMirror {
    pub slices: BTreeMap<u32, SliceState>,
    pub tx_slice: Option<u32>,
    pub interlock: Option<String>,
    pub ptt_active: bool,
    pub nickname: Option<String>,
    pub callsign: Option<String>,
    pub rfpower: Option<u32>,
    pub tunepower: Option<u32>,
    pub snapshot: Option<RestoreSnapshot>,
    /// False before connect and after the link is lost or closed
    pub connected: bool,
}

impl FlexMirror {
    /// TX slice if known, else the lowest known slice id, else 0.
    pub fn active_slice(&self) -> u32 {
        self.tx_slice
            .or_else(|| self.slices.keys().next().copied())
            .unwrap_or(0)
    }

    /// Forget everything the radio reported over the lost connection.
    /// The snapshot survives so a later restore still knows the original state.
    pub fn forget_live_state(&mut self) {
        self.connected = false;
        self.slices.clear();
        self.tx_slice = None;
        self.interlock = None;
        self.ptt_active = false;
        self.rfpower = None;
        self.tunepower = None;
    }

    pub fn apply(&mut self, event: FlexEvent) {
        match event {
            FlexEvent::Identity { nickname, callsign } => {
                if nickname.is_some() {
                    self.nickname = nickname;
                }
                if callsign.is_some() {
                    self.callsign = callsign;
                }
            }
            FlexEvent::Slice { id, update } => self.apply_slice(id, update),
            FlexEvent::Interlock { state } => {
                let active = interlock_is_transmitting(&state);
                if active != self.ptt_active {
                    log::debug!("[PTT] interlock {state} -> {}", if active { "TX" } else { "RX" });
                }
                self.ptt_active = active;
                self.interlock = Some(state);
            }
            FlexEvent::TransmitPower { rfpower, tunepower } => {
                if rfpower.is_some() {
                    self.rfpower = rfpower;
                }
                if tunepower.is_some() {
                    self.tunepower = tunepower;
                }
            }
        }
    }

    fn apply_slice(&mut self, id: u32, update: SliceUpdate) {
        let slice = self.slices.entry(id).or_insert_with(|| SliceState {
            id,
            ..Default::default()
        });
        if let Some(freq) = update.frequency {
            slice.frequency = Some(freq);
        }
        if let Some(mode) = update.mode {
            slice.mode = Some(mode);
        }
        if let Some(tx) = update.transmit {
            slice.transmitting = tx;
            if tx && self.tx_slice != Some(id) {
                self.tx_slice = Some(id);
                log::info!("[SLICE] TX slice now: {id}");
            }
        }

        let (mode, freq) = (slice.mode.clone(), slice.frequency);
        match &mut self.snapshot {
            None => {
                if let (Some(mode), Some(freq)) = (mode, freq.filter(|f| f.as_hz() > 0)) {
                    let snap = RestoreSnapshot {
                        channel_id: Some(id),
                        mode: Some(mode),
                        frequency: Some(freq),
                    };
                    log::info!("[SNAPSHOT] {snap}");
                    self.snapshot = Some(snap);
                }
            }
            // Backfill only; never replace what was captured first
            Some(snap) if snap.channel_id == Some(id) && snap.frequency.is_none() => {
                if let Some(freq) = freq.filter(|f| f.as_hz() > 0) {
                    log::debug!("[SNAPSHOT] frequency backfilled: {freq}");
                    snap.frequency = Some(freq);
                }
            }
            Some(_) => {}
        }
    }
}

/// Mirror plus the condvar the listener signals after each line
#[derive(Default)]
struct MirrorCell {
    state: Mutex<FlexMirror>,
    changed: Condvar,
}

impl MirrorCell {
    fn lock(&self) -> MutexGuard<'_, FlexMirror> {
        lock(&self.state)
    }

    /// Block until `done` holds or `timeout` passes; re-checks in short slices.
    fn wait_until<F>(&self, timeout: Duration, done: F) -> bool
    where
        F: Fn(&FlexMirror) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        loop {
            if done(&guard) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            guard = match self.changed.wait_timeout(guard, slice) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Bridges the transport's raw lines into the mirror.
struct MirrorObserver {
    cell: Arc<MirrorCell>,
    caps: LinkCapabilities,
}

impl LineObserver for MirrorObserver {
    fn on_line(&self, line: &str) {
        let events = parse_line(line);
        if events.is_empty() {
            return;
        }
        {
            let mut mirror = self.cell.lock();
            for event in events {
                mirror.apply(event);
            }
        }
        self.cell.changed.notify_all();
    }

    fn on_disconnect(&self) {
        {
            let mut mirror = self.cell.lock();
            // Still marked connected means the radio went away, not us
            if mirror.connected {
                log::error!("[PTT] connection to the radio lost; PTT state is no longer known");
                self.caps.mark_ptt_unreadable();
            }
            mirror.forget_live_state();
        }
        self.cell.changed.notify_all();
    }
}

pub struct EventDrivenRadioLink {
    host: String,
    port: u16,
    connect_timeout: Duration,
    ack_timeout: Duration,
    transport: Option<AckTransport>,
    mirror: Arc<MirrorCell>,
    caps: LinkCapabilities,
    description: String,
}

impl EventDrivenRadioLink {
    pub fn new(settings: &RadioSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port(),
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            ack_timeout: Duration::from_millis(settings.ack_timeout_ms),
            transport: None,
            mirror: Arc::new(MirrorCell::default()),
            caps: LinkCapabilities::new(true),
            description: format!("FlexRadio SmartSDR at {}:{}", settings.host, settings.port()),
        }
    }

    fn transport(&self) -> TrainerResult<&AckTransport> {
        self.transport
            .as_ref()
            .filter(|t| t.is_connected())
            .ok_or_else(|| TrainerError::Transport("not connected to FlexRadio".into()))
    }

    /// Send and require return code 0.
    fn send_checked(&self, command: &str) -> TrainerResult<Ack> {
        let ack = self.transport()?.send_command(command)?;
        if !ack.is_ok() {
            log::warn!("[ACK] rc={} cmd='{command}' resp='{}'", ack.code_text(), ack.raw);
            return Err(TrainerError::Rejected {
                command: command.to_string(),
                code: ack.code_text(),
            });
        }
        Ok(ack)
    }

    /// Send for optional, firmware-dependent commands. Never fails.
    fn send_soft(&self, command: &str) {
        match self.transport().and_then(|t| t.send_command(command)) {
            Ok(ack) if !ack.is_ok() => {
                log::debug!("[HANDSHAKE] '{command}' rc={}", ack.code_text())
            }
            Ok(_) => {}
            Err(e) => log::debug!("[HANDSHAKE] '{command}' failed: {e}"),
        }
    }

    /// Take the one-time snapshot if the listener has not already done so.
    /// Waits up to `wait` for the active slice to report mode and frequency,
    /// then keeps whatever it has, even partial.
    fn snapshot_state(&self, wait: Duration) {
        if self.mirror.lock().snapshot.is_some() {
            return;
        }
        let sid = self.mirror.lock().active_slice();
        self.mirror.wait_until(wait, |m| {
            m.snapshot.is_some()
                || m.slices
                    .get(&sid)
                    .is_some_and(|s| s.mode.is_some() && s.frequency.is_some())
        });

        let mut mirror = self.mirror.lock();
        if mirror.snapshot.is_some() {
            return;
        }
        let slice = mirror.slices.get(&sid).cloned().unwrap_or_default();
        let snap = RestoreSnapshot {
            channel_id: Some(sid),
            mode: slice.mode,
            frequency: slice.frequency.filter(|f| f.as_hz() > 0),
        };
        log::info!("[SNAPSHOT] {snap}");
        mirror.snapshot = Some(snap);
    }

    pub fn snapshot(&self) -> Option<RestoreSnapshot> {
        self.mirror.lock().snapshot.clone()
    }

    fn restore_state(&self) -> TrainerResult<()> {
        let Some(snap) = self.snapshot() else {
            log::info!("[RESTORE] skipped: no snapshot was taken earlier.");
            return Ok(());
        };
        let Some(sid) = snap.channel_id else {
            log::info!("[RESTORE] skipped: snapshot has no slice.");
            return Ok(());
        };
        if let Some(mode) = &snap.mode {
            log::info!("[RESTORE] mode={mode} on slice {sid}");
            self.send_checked(&format!("slice set {sid} mode={mode}"))?;
        }
        match snap.frequency {
            Some(freq) => {
                log::info!("[RESTORE] freq={freq} on slice {sid}");
                self.send_checked(&format!("slice tune {sid} {}", freq.mhz_text()))?;
            }
            None => log::info!("[RESTORE] freq is unknown; skipping frequency restore."),
        }
        log::info!("[RESTORE] done");
        Ok(())
    }

    /// Wait for an interlock edge. A dead link ends the wait at once and
    /// never counts as an edge in either direction.
    fn wait_for_ptt(&self, target: bool, timeout: Duration) -> bool {
        if self.transport().is_err() {
            return false;
        }
        self.mirror
            .wait_until(timeout, |m| !m.connected || m.ptt_active == target);
        let m = self.mirror.lock();
        m.connected && m.ptt_active == target
    }

    fn log_state(&self, tag: &str) {
        let m = self.mirror.lock();
        log::info!(
            "[STATE:{tag}] tx_slice={:?} tx_state={} rfpower={:?} tunepower={:?}",
            m.tx_slice,
            m.interlock.as_deref().unwrap_or("UNKNOWN"),
            m.rfpower,
            m.tunepower
        );
    }
}

impl RadioLink for EventDrivenRadioLink {
    fn connect(&mut self) -> TrainerResult<()> {
        let observer = Arc::new(MirrorObserver {
            cell: Arc::clone(&self.mirror),
            caps: self.caps.clone(),
        });
        let transport = AckTransport::connect(
            &self.host,
            self.port,
            self.connect_timeout,
            self.ack_timeout,
            observer,
        )?;
        self.transport = Some(transport);
        self.mirror.lock().connected = true;
        log::info!("Connected to FlexRadio at {}:{}", self.host, self.port);

        self.send_soft(&format!("client program {CLIENT_PROGRAM}"));
        for cmd in ["sub slice all", "sub interlock all", "sub transmit all"] {
            if let Err(e) = self.send_checked(cmd) {
                log::debug!("[HANDSHAKE] '{cmd}' failed: {e}");
            }
        }

        self.mirror
            .wait_until(FIRST_SLICE_WAIT, |m| m.tx_slice.is_some());
        self.snapshot_state(SNAPSHOT_WAIT);
        self.log_state("after-connect");

        let m = self.mirror.lock();
        if let (Some(nick), Some(call)) = (&m.nickname, &m.callsign) {
            log::info!("[RADIO] {nick} ({call})");
        }
        Ok(())
    }

    fn set_mode(&mut self, mode: &str, _bandwidth_hz: u32) -> TrainerResult<()> {
        let (sid, current) = {
            let m = self.mirror.lock();
            let sid = m.active_slice();
            (sid, m.slices.get(&sid).and_then(|s| s.mode.clone()))
        };
        if current.is_some_and(|c| c.eq_ignore_ascii_case(mode)) {
            log::debug!("[MODE] already {mode} on slice {sid}; skipping");
            return Ok(());
        }
        log::info!("[MODE] Setting mode={mode} on slice {sid}");
        self.send_checked(&format!("slice set {sid} mode={mode}"))?;
        let mut m = self.mirror.lock();
        let slice = m.slices.entry(sid).or_insert_with(|| SliceState {
            id: sid,
            ..Default::default()
        });
        slice.mode = Some(mode.to_ascii_uppercase());
        Ok(())
    }

    fn set_frequency(&mut self, freq: Frequency) -> TrainerResult<()> {
        let (sid, current) = {
            let m = self.mirror.lock();
            let sid = m.active_slice();
            (sid, m.slices.get(&sid).and_then(|s| s.frequency))
        };
        if current == Some(freq) {
            log::debug!("[TUNE] already at {freq} on slice {sid}; skipping");
            return Ok(());
        }
        log::info!("[TUNE] Setting slice {sid} to {freq}");
        self.send_checked(&format!("slice tune {sid} {}", freq.mhz_text()))?;
        let mut m = self.mirror.lock();
        let slice = m.slices.entry(sid).or_insert_with(|| SliceState {
            id: sid,
            ..Default::default()
        });
        slice.frequency = Some(freq);
        Ok(())
    }

    fn set_drive_power(&mut self, watts: u32) -> TrainerResult<()> {
        {
            let m = self.mirror.lock();
            if m.rfpower == Some(watts) && m.tunepower == Some(watts) {
                log::debug!("[POWER] already {watts}W (rf & tune); skipping");
                return Ok(());
            }
        }
        log::info!("[POWER] Setting tunepower={watts}W and rfpower={watts}W");
        self.send_checked(&format!("transmit set tunepower={watts} rfpower={watts}"))?;
        let mut m = self.mirror.lock();
        m.rfpower = Some(watts);
        m.tunepower = Some(watts);
        Ok(())
    }

    fn get_ptt(&mut self) -> TrainerResult<bool> {
        self.transport()?;
        Ok(self.mirror.lock().ptt_active)
    }

    fn wait_for_tx(&mut self, timeout: Duration) -> bool {
        self.wait_for_ptt(true, timeout)
    }

    fn wait_for_unkey(&mut self, timeout: Duration) -> bool {
        self.wait_for_ptt(false, timeout)
    }

    fn capabilities(&self) -> CapabilityFlags {
        self.caps.snapshot()
    }

    fn disable_ptt_sensing(&mut self) {
        if self.caps.mark_ptt_unreadable() {
            log::warn!("[PTT] automatic sensing disabled for the rest of this session");
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn disconnect(&mut self) {
        // Cleared first so the listener's exit is not taken for a lost radio
        self.mirror.lock().forget_live_state();
        if let Some(transport) = self.transport.take() {
            transport.disconnect();
            log::info!("TCP connection closed");
        }
        self.mirror.changed.notify_all();
    }

    fn shutdown(&mut self, restore: bool) {
        if restore {
            if let Err(e) = self.restore_state() {
                log::warn!("[RESTORE] failed: {e}");
            }
        }
        self.disconnect();
    }
}
