//! AckTransport: one TCP connection to a SmartSDR radio, with ACK correlation.
//!
//! Outbound commands are framed `C<seq>|<text>\n`. The radio answers each
//! with `R<seq>|<hex rc>[|payload]`. A background listener reads lines,
//! hands each `R` line to the caller waiting on that exact sequence number,
//! and forwards every line (ACKs included) to a `LineObserver`.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};

use crate::domain::{TrainerError, TrainerResult};
use crate::net::{connect_tcp, is_timeout, join_bounded, lock, LineReader};

/// Listener read timeout. Short so stop requests are noticed quickly.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// How long `disconnect` waits for the listener to exit
const LISTENER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Receives every inbound line, in arrival order, on the listener thread.
pub trait LineObserver: Send + Sync {
    fn on_line(&self, line: &str);

    /// The connection is gone and will not come back on its own.
    fn on_disconnect(&self) {}
}

/// A correlated acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub sequence: u32,
    /// `None` when the field is missing or not hex
    pub return_code: Option<u32>,
    pub raw: String,
}

impl Ack {
    pub fn is_ok(&self) -> bool {
        self.return_code == Some(0)
    }

    /// Return code rendered the way the radio sent it, for error messages
    pub fn code_text(&self) -> String {
        match self.return_code {
            Some(rc) => format!("{rc:08X}"),
            None => format!("unparseable ack '{}'", self.raw),
        }
    }
}

/// Parse `R<seq>|<hex rc>[|payload]`. Anything else is not an ACK.
pub fn parse_ack(line: &str) -> Option<Ack> {
    let rest = line.strip_prefix('R')?;
    let mut parts = rest.splitn(3, '|');
    let sequence = parts.next()?.trim().parse::<u32>().ok()?;
    let return_code = parts
        .next()
        .and_then(|rc| u32::from_str_radix(rc.trim(), 16).ok());
    Some(Ack {
        sequence,
        return_code,
        raw: line.to_string(),
    })
}

/// State shared between callers and the listener thread
struct Shared {
    pending: Mutex<HashMap<u32, Sender<Ack>>>,
    connected: AtomicBool,
    stop: AtomicBool,
}

impl Shared {
    /// Mark the link dead and wake every waiting caller with a disconnect.
    fn tear_down(&self) {
        self.connected.store(false, Ordering::SeqCst);
        lock(&self.pending).clear();
    }
}

pub struct AckTransport {
    peer: String,
    writer: Mutex<TcpStream>,
    shared: Arc<Shared>,
    next_seq: AtomicU32,
    ack_timeout: Duration,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl AckTransport {
    /// Connect and start the listener thread.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        ack_timeout: Duration,
        observer: Arc<dyn LineObserver>,
    ) -> TrainerResult<Self> {
        let stream = connect_tcp(host, port, connect_timeout, RECV_TIMEOUT)?;
        let reader = stream.try_clone()?;
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            stop: AtomicBool::new(false),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("flex-listener".into())
            .spawn(move || listener_loop(reader, worker_shared, observer))?;

        log::info!("[NET] connected to {host}:{port}");
        Ok(Self {
            peer: format!("{host}:{port}"),
            writer: Mutex::new(stream),
            shared,
            next_seq: AtomicU32::new(1),
            ack_timeout,
            listener: Mutex::new(Some(handle)),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Send one command and block until its own ACK arrives or the ack timeout passes.
    ///
    /// A non-zero return code is not an error here; the caller decides.
    pub fn send_command(&self, command: &str) -> TrainerResult<Ack> {
        self.send_command_with_timeout(command, self.ack_timeout)
    }

    pub fn send_command_with_timeout(&self, command: &str, timeout: Duration) -> TrainerResult<Ack> {
        if !self.is_connected() {
            return Err(TrainerError::Transport(format!(
                "not connected to {}",
                self.peer
            )));
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = bounded(1);
        lock(&self.shared.pending).insert(seq, tx);

        let frame = format!("C{seq}|{command}\n");
        let started = Instant::now();
        let written = {
            let mut writer = lock(&self.writer);
            log::debug!("[SEND] {}", frame.trim_end());
            writer.write_all(frame.as_bytes()).and_then(|_| writer.flush())
        };
        if let Err(e) = written {
            lock(&self.shared.pending).remove(&seq);
            log::error!("[NET] failed to send command '{command}': {e}");
            return Err(TrainerError::Transport(format!(
                "send of '{command}' failed: {e}"
            )));
        }

        match rx.recv_timeout(timeout) {
            Ok(ack) => {
                let ms = started.elapsed().as_millis();
                if ack.is_ok() {
                    log::debug!("[ACK] rc=0 in {ms} ms  cmd='{command}'");
                } else {
                    log::debug!(
                        "[ACK] rc={} in {ms} ms  cmd='{command}'  resp='{}'",
                        ack.code_text(),
                        ack.raw
                    );
                }
                Ok(ack)
            }
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.shared.pending).remove(&seq);
                let waited_ms = started.elapsed().as_millis() as u64;
                log::error!(
                    "[ACK] timeout after {waited_ms} ms waiting for ACK of cmd='{command}' (ack_timeout={:.1}s)",
                    timeout.as_secs_f64()
                );
                Err(TrainerError::AckTimeout {
                    command: command.to_string(),
                    waited_ms,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(TrainerError::Transport(format!(
                "connection lost while waiting for ACK of '{command}'"
            ))),
        }
    }

    /// Stop the listener (bounded join) and close the socket. Safe to call twice.
    pub fn disconnect(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Err(e) = lock(&self.writer).shutdown(Shutdown::Both) {
            log::debug!("[NET] socket shutdown: {e}");
        }
        if let Some(handle) = lock(&self.listener).take() {
            join_bounded(handle, LISTENER_JOIN_TIMEOUT);
        }
        self.shared.tear_down();
    }
}

impl Drop for AckTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn listener_loop(mut stream: TcpStream, shared: Arc<Shared>, observer: Arc<dyn LineObserver>) {
    let mut reader = LineReader::new();
    let mut chunk = [0u8; 4096];

    while !shared.stop.load(Ordering::SeqCst) {
        match stream.read(&mut chunk) {
            Ok(0) => {
                if !shared.stop.load(Ordering::SeqCst) {
                    log::error!("[NET] connection closed by radio");
                }
                break;
            }
            Ok(n) => {
                if let Err(e) = reader.push(&chunk[..n]) {
                    log::error!("[NET] {e}. Closing connection.");
                    break;
                }
            }
            Err(e) if is_timeout(&e) => continue,
            Err(e) => {
                if !shared.stop.load(Ordering::SeqCst) {
                    log::error!("[NET] listener error: {e}. Closing connection.");
                }
                break;
            }
        }

        while let Some(line) = reader.next_line() {
            if line.is_empty() {
                continue;
            }
            log::trace!("[RECV] {line}");
            if let Some(ack) = parse_ack(&line) {
                route_ack(&shared, ack);
            }
            observer.on_line(&line);
        }
    }

    shared.tear_down();
    observer.on_disconnect();
}

/// Hand an ACK to whoever is waiting on exactly that sequence number.
fn route_ack(shared: &Shared, ack: Ack) {
    let waiter = lock(&shared.pending).remove(&ack.sequence);
    match waiter {
        Some(tx) => {
            // Receiver may have just timed out; nothing to do then
            let _ = tx.try_send(ack);
        }
        None => log::debug!("[ACK] unsolicited or late ACK for seq {}", ack.sequence),
    }
}
