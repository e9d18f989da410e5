//! RigctlSession: owns the rigctld TCP connection and drives I/O timing.
//!
//! Pure translation lives in `encode` / `decode`. The session writes one
//! command line, reads the first reply line, then opportunistically reads a
//! follow-up line inside a short grace window when the reply shape calls
//! for it. A transport failure triggers exactly one reconnect and resend.

use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use crate::domain::{TrainerError, TrainerResult};
use crate::net::{connect_tcp, LineReader};

use super::{decode, encode, RigctlCommand, RigctlReply};

/// Wait for the first reply line
const REPLY_TIMEOUT: Duration = Duration::from_millis(2500);

/// Grace window for a value that follows `RPRT 0`
const VALUE_FOLLOW_UP: Duration = Duration::from_millis(300);

/// Grace window for a passband width sent on its own line
const WIDTH_FOLLOW_UP: Duration = Duration::from_millis(500);

pub struct RigctlSession {
    host: String,
    port: u16,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    reader: LineReader,
    /// Connected by the caller and not closed since, even while the socket
    /// itself is waiting to be reopened
    open: bool,
}

impl RigctlSession {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            stream: None,
            reader: LineReader::new(),
            open: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.open
    }

    pub fn connect(&mut self) -> TrainerResult<()> {
        let stream = connect_tcp(&self.host, self.port, self.connect_timeout, REPLY_TIMEOUT)
            .map_err(|e| {
                log::error!(
                    "Failed to connect to rigctld at {}:{}. Is rigctld running? {e}",
                    self.host,
                    self.port
                );
                e
            })?;
        self.stream = Some(stream);
        self.reader.clear();
        self.open = true;
        log::info!("Connected to rigctld at {}:{}", self.host, self.port);
        Ok(())
    }

    /// Drop the current socket and open a fresh one.
    pub fn reconnect(&mut self) -> TrainerResult<()> {
        self.reconnect_within(self.connect_timeout)
    }

    fn reconnect_within(&mut self, connect_timeout: Duration) -> TrainerResult<()> {
        self.drop_socket();
        let stream = connect_tcp(&self.host, self.port, connect_timeout, REPLY_TIMEOUT)?;
        self.stream = Some(stream);
        self.open = true;
        log::info!("[rigctl] reconnected {}:{}", self.host, self.port);
        Ok(())
    }

    pub fn close(&mut self) {
        self.drop_socket();
        self.open = false;
    }

    fn drop_socket(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                log::debug!("[rigctl] socket shutdown: {e}");
            }
        }
        self.reader.clear();
    }

    /// Send a command and decode its reply.
    pub fn execute(&mut self, cmd: &RigctlCommand) -> TrainerResult<RigctlReply> {
        let lines = self.exchange(cmd, None)?;
        decode(&lines, cmd)
    }

    /// Like `execute`, but every read, the reconnect and the resend all fit
    /// inside `deadline`. Running out of time is a transport error.
    pub fn execute_by(&mut self, cmd: &RigctlCommand, deadline: Instant) -> TrainerResult<RigctlReply> {
        let lines = self.exchange(cmd, Some(deadline))?;
        decode(&lines, cmd)
    }

    /// Send a command and return the raw reply lines, reconnecting once on transport failure.
    fn exchange(&mut self, cmd: &RigctlCommand, deadline: Option<Instant>) -> TrainerResult<Vec<String>> {
        match self.try_exchange(cmd, deadline) {
            Ok(lines) => Ok(lines),
            Err(first) if first.is_transport() => {
                let connect_timeout = within(deadline, self.connect_timeout);
                if connect_timeout.is_zero() {
                    // A late reply must not answer the next command
                    self.drop_socket();
                    return Err(first);
                }
                log::debug!("[rigctl] comm error, attempting reconnect: {first}");
                self.reconnect_within(connect_timeout)?;
                self.try_exchange(cmd, deadline).map_err(|_| {
                    TrainerError::Transport(format!("communication error with rigctld: {first}"))
                })
            }
            Err(e) => Err(e),
        }
    }

    fn try_exchange(&mut self, cmd: &RigctlCommand, deadline: Option<Instant>) -> TrainerResult<Vec<String>> {
        let wire = encode(cmd);
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TrainerError::Transport("not connected to rigctld".into()))?;

        log::trace!("[rigctl] > {wire}");
        stream.write_all(format!("{wire}\n").as_bytes())?;

        let first = self
            .reader
            .read_line(stream, within(deadline, REPLY_TIMEOUT))?
            .ok_or_else(|| TrainerError::Transport(format!("no reply to '{wire}'")))?;
        log::trace!("[rigctl] < {first}");

        let follow_up = if !cmd.expects_value() {
            None
        } else if first.is_empty() || first == "RPRT 0" {
            Some(VALUE_FOLLOW_UP)
        } else if *cmd == RigctlCommand::GetMode && first.split_whitespace().count() == 1 {
            Some(WIDTH_FOLLOW_UP)
        } else {
            None
        };

        let mut lines = vec![first];
        if let Some(grace) = follow_up {
            // A missing follow-up is normal, so only a hard error counts here
            if let Some(extra) = self.reader.read_line(stream, within(deadline, grace))? {
                log::trace!("[rigctl] << {extra}");
                lines.push(extra);
            }
        }
        Ok(lines)
    }
}

/// `cap`, shortened to whatever is left before `deadline`.
fn within(deadline: Option<Instant>, cap: Duration) -> Duration {
    match deadline {
        Some(deadline) => deadline.saturating_duration_since(Instant::now()).min(cap),
        None => cap,
    }
}

impl Drop for RigctlSession {
    fn drop(&mut self) {
        self.close();
    }
}
