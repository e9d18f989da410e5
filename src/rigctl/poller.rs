//! Background PTT sampler for rigctld.
//!
//! rigctld has no push notifications, so a worker thread asks `t` at an
//! adaptive cadence (faster while transmitting) and publishes the result
//! through `PttSignal`, a mutex + condvar pair that lets the foreground
//! block on a real edge. The worker shares the session with the foreground
//! link under a mutex, so commands never interleave on the wire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::domain::{LinkCapabilities, TrainerResult};
use crate::net::{join_bounded, lock};

use super::{RigctlCommand, RigctlReply, RigctlSession};

/// Sampling period while receiving
pub const IDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Sampling period while transmitting, so the unkey edge is seen quickly
pub const ACTIVE_INTERVAL: Duration = Duration::from_millis(75);

/// Waits re-check their own deadline at least this often
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Sleep granularity so a stop request is noticed promptly
const STOP_CHECK: Duration = Duration::from_millis(25);

const JOIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct PttState {
    transmitting: bool,
    /// False once the worker has exited for any reason
    running: bool,
}

/// Last sampled PTT state, with edge notification.
#[derive(Debug, Default)]
pub struct PttSignal {
    state: Mutex<PttState>,
    changed: Condvar,
}

impl PttSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> bool {
        lock(&self.state).transmitting
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn publish(&self, transmitting: bool) {
        let mut state = lock(&self.state);
        if state.transmitting != transmitting {
            log::debug!("[PTT] edge -> {}", if transmitting { "TX" } else { "RX" });
        }
        state.transmitting = transmitting;
        drop(state);
        self.changed.notify_all();
    }

    fn set_running(&self, running: bool) {
        lock(&self.state).running = running;
        self.changed.notify_all();
    }

    /// Block until the PTT equals `target`.
    ///
    /// `Some(true)` when reached, `Some(false)` when `deadline` passed, and
    /// `None` when the sampler stopped first so the caller must fall back.
    pub fn wait_for(&self, target: bool, deadline: Instant) -> Option<bool> {
        let mut state = lock(&self.state);
        loop {
            if state.transmitting == target {
                return Some(true);
            }
            if !state.running {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return Some(false);
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            state = match self.changed.wait_timeout(state, slice) {
                Ok((s, _)) => s,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Owns the sampler thread.
pub struct PttPoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    signal: Arc<PttSignal>,
}

impl PttPoller {
    pub fn spawn(
        session: Arc<Mutex<RigctlSession>>,
        caps: LinkCapabilities,
        signal: Arc<PttSignal>,
    ) -> TrainerResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        signal.set_running(true);

        let worker_stop = Arc::clone(&stop);
        let worker_signal = Arc::clone(&signal);
        let spawned = thread::Builder::new()
            .name("rigctl-ptt".into())
            .spawn(move || {
                poll_loop(&session, &caps, &worker_signal, &worker_stop);
                worker_signal.set_running(false);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                signal.set_running(false);
                return Err(e.into());
            }
        };

        log::info!("[PTT] background poller started");
        Ok(Self {
            stop,
            handle: Some(handle),
            signal,
        })
    }

    pub fn is_running(&self) -> bool {
        self.signal.is_running()
    }

    /// Ask the worker to exit and join it with a bounded wait.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            join_bounded(handle, JOIN_TIMEOUT);
        }
    }
}

impl Drop for PttPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(
    session: &Mutex<RigctlSession>,
    caps: &LinkCapabilities,
    signal: &PttSignal,
    stop: &AtomicBool,
) {
    while !stop.load(Ordering::SeqCst) {
        // The session's own reconnect-once is this worker's single retry
        let reply = lock(session).execute(&RigctlCommand::GetPtt);
        match reply {
            Ok(RigctlReply::Ptt(on)) => signal.publish(on),
            Ok(RigctlReply::FeatureUnavailable) => {
                if caps.mark_ptt_unreadable() {
                    log::debug!("[PTT] rig/rigctld does not support reading PTT (RPRT -11)");
                }
                return;
            }
            Ok(other) => log::debug!("[PTT] poller ignored reply {other:?}"),
            Err(e) if e.is_transport() => {
                log::warn!("[PTT] poller lost rigctld ({e}); falling back to one-shot polling");
                caps.mark_edge_wait_unsupported();
                return;
            }
            Err(e) => log::debug!("[PTT] poller: {e}"),
        }

        let interval = if signal.current() {
            ACTIVE_INTERVAL
        } else {
            IDLE_INTERVAL
        };
        let wake = Instant::now() + interval;
        while Instant::now() < wake {
            if stop.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(STOP_CHECK.min(wake.saturating_duration_since(Instant::now())));
        }
    }
}
