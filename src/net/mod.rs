//! TCP plumbing shared by the radio links
//!
//! Both radio protocols are ASCII, newline-terminated, over plain TCP.
//! `LineReader` keeps a persistent receive buffer so bytes that arrive after
//! a complete line are kept for the next read instead of being dropped.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::domain::{TrainerError, TrainerResult};

/// Chunk size for each socket read call
const READ_CHUNK_SIZE: usize = 4096;

/// Smallest read timeout we ever hand to the socket (zero means "block forever")
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// How often a bounded join checks whether the worker has finished
const JOIN_POLL: Duration = Duration::from_millis(10);

/// Longest unterminated line we keep buffering. Real status lines are a few hundred bytes.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accumulates raw bytes and hands out complete, trimmed lines.
#[derive(Debug, Default)]
pub struct LineReader {
    buf: Vec<u8>,
}

impl LineReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer `bytes`. A trailing partial line longer than `MAX_LINE_LEN`
    /// is a transport error and the buffer is dropped.
    pub fn push(&mut self, bytes: &[u8]) -> TrainerResult<()> {
        self.buf.extend_from_slice(bytes);
        let partial = match self.buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => self.buf.len() - pos - 1,
            None => self.buf.len(),
        };
        if partial > MAX_LINE_LEN {
            self.buf.clear();
            return Err(TrainerError::Transport(format!(
                "peer sent more than {MAX_LINE_LEN} bytes without a line break"
            )));
        }
        Ok(())
    }

    /// Pop the next complete line, without its terminator and surrounding whitespace.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Read from `stream` until one full line is buffered or `wait` elapses.
    ///
    /// `Ok(None)` means the deadline passed without a complete line. A peer
    /// close or hard socket error is a transport error.
    pub fn read_line(&mut self, stream: &mut TcpStream, wait: Duration) -> TrainerResult<Option<String>> {
        let deadline = Instant::now() + wait;
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            if let Some(line) = self.next_line() {
                return Ok(Some(line));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            stream.set_read_timeout(Some((deadline - now).max(MIN_READ_TIMEOUT)))?;
            match stream.read(&mut chunk) {
                Ok(0) => return Err(TrainerError::Transport("connection closed by peer".into())),
                Ok(n) => self.push(&chunk[..n])?,
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Short read timeouts surface as either kind depending on the platform.
pub fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Resolve `host:port` and connect to the first address that answers in time.
/// The stream comes back with `TCP_NODELAY` set and `read_timeout` applied.
pub fn connect_tcp(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> TrainerResult<TcpStream> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| TrainerError::Transport(format!("cannot resolve {host}:{port}: {e}")))?
        .collect();

    let mut last_err: Option<io::Error> = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, connect_timeout) {
            Ok(stream) => {
                // Low latency matters more than throughput for one-line commands
                if let Err(e) = stream.set_nodelay(true) {
                    log::debug!("[NET] TCP_NODELAY not applied: {e}");
                }
                stream.set_read_timeout(Some(read_timeout.max(MIN_READ_TIMEOUT)))?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    let reason = match last_err {
        Some(e) if is_timeout(&e) => format!(
            "connect timeout after {:.1}s to {host}:{port}",
            connect_timeout.as_secs_f64()
        ),
        Some(e) => format!("connect error to {host}:{port}: {e}"),
        None => format!("no address found for {host}:{port}"),
    };
    log::error!("[NET] {reason}");
    Err(TrainerError::Transport(reason))
}

/// Join a worker thread, but give up after `timeout`. Returns whether it joined.
pub fn join_bounded(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            log::warn!(
                "[NET] worker '{}' did not stop within {} ms; leaving it behind",
                handle.thread().name().unwrap_or("unnamed"),
                timeout.as_millis()
            );
            return false;
        }
        std::thread::sleep(JOIN_POLL);
    }
    if handle.join().is_err() {
        log::error!("[NET] worker thread panicked");
    }
    true
}

/// Lock a mutex, carrying on with the inner value if another thread panicked while holding it.
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn splits_lines_and_keeps_remainder() {
        let mut reader = LineReader::new();
        reader.push(b"R1|0|\nS0|slice 0 mo").unwrap();
        assert_eq!(reader.next_line().as_deref(), Some("R1|0|"));
        assert_eq!(reader.next_line(), None);
        assert!(reader.has_partial());
        reader.push(b"de=CW\r\n").unwrap();
        assert_eq!(reader.next_line().as_deref(), Some("S0|slice 0 mode=CW"));
        assert!(!reader.has_partial());
    }

    #[test]
    fn empty_lines_come_back_empty() {
        let mut reader = LineReader::new();
        reader.push(b"\n\nRPRT 0\n").unwrap();
        assert_eq!(reader.next_line().as_deref(), Some(""));
        assert_eq!(reader.next_line().as_deref(), Some(""));
        assert_eq!(reader.next_line().as_deref(), Some("RPRT 0"));
    }

    #[test]
    fn runaway_line_is_a_transport_error() {
        let mut reader = LineReader::new();
        reader.push(b"RPRT 0\n").unwrap();
        let flood = vec![b'x'; MAX_LINE_LEN];
        reader.push(&flood).unwrap();
        let err = reader.push(b"xx").unwrap_err();
        assert!(err.is_transport());
        assert!(!reader.has_partial(), "buffer is dropped");
        assert_eq!(reader.next_line(), None);
    }

    #[test]
    fn long_input_is_fine_while_lines_keep_ending() {
        let mut reader = LineReader::new();
        let mut chunk = vec![b'y'; MAX_LINE_LEN - 1];
        chunk.push(b'\n');
        for _ in 0..3 {
            reader.push(&chunk).unwrap();
        }
        assert_eq!(reader.next_line().map(|l| l.len()), Some(MAX_LINE_LEN - 1));
    }

    #[test]
    fn read_line_times_out_then_delivers() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut peer, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_millis(150));
            peer.write_all(b"7090000\n").unwrap();
            std::thread::sleep(Duration::from_millis(100));
        });

        let mut stream = connect_tcp(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_millis(50),
        )
        .unwrap();
        let mut reader = LineReader::new();
        assert_eq!(reader.read_line(&mut stream, Duration::from_millis(20)).unwrap(), None);
        let line = reader.read_line(&mut stream, Duration::from_secs(2)).unwrap();
        assert_eq!(line.as_deref(), Some("7090000"));
        server.join().unwrap();
    }

    #[test]
    fn peer_close_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (peer, _) = listener.accept().unwrap();
            drop(peer);
        });
        let mut stream = connect_tcp(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            Duration::from_millis(50),
        )
        .unwrap();
        server.join().unwrap();
        let mut reader = LineReader::new();
        let err = reader.read_line(&mut stream, Duration::from_secs(2)).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn bounded_join_gives_up_on_stuck_worker() {
        let stuck = std::thread::spawn(|| std::thread::sleep(Duration::from_millis(500)));
        assert!(!join_bounded(stuck, Duration::from_millis(30)));
        let quick = std::thread::spawn(|| {});
        assert!(join_bounded(quick, Duration::from_secs(1)));
    }
}
