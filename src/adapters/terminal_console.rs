//! Operator console on a terminal
//!
//! Prompts block on a line of input. While a PTT wait is running, a single
//! status line is redrawn in place (ANSI colours when attached to a tty).

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::{Duration, Instant};

use crate::domain::{TrainerError, TrainerResult};
use crate::ports::{OperatorConsole, WaitPhase};

const REDRAW_EVERY: Duration = Duration::from_millis(100);
const HEARTBEAT_SECS: f64 = 5.0;

const CLEAR_LINE: &str = "\r\x1b[2K";
const READY_STYLE: &str = "\x1b[1;30;42m";
const TX_STYLE: &str = "\x1b[1;97;41m";
const RESET: &str = "\x1b[0m";

pub struct TerminalConsole<R, W> {
    input: R,
    output: W,
    color: bool,
    last_draw: Option<Instant>,
}

impl TerminalConsole<io::BufReader<io::Stdin>, io::Stdout> {
    pub fn stdio() -> Self {
        let color = io::stdout().is_terminal();
        Self::new(io::BufReader::new(io::stdin()), io::stdout(), color)
    }
}

impl<R: BufRead + Send, W: Write + Send> TerminalConsole<R, W> {
    pub fn new(input: R, output: W, color: bool) -> Self {
        Self {
            input,
            output,
            color,
            last_draw: None,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn status_text(&self, phase: WaitPhase, elapsed_secs: f64) -> String {
        let (style, label, hint) = match phase {
            WaitPhase::Carrier => (READY_STYLE, "AUTO-PTT READY", "key a steady carrier"),
            WaitPhase::Unkey => (TX_STYLE, "TX ACTIVE", "tune & store, then UNKEY"),
        };
        let badge = if self.color {
            format!("{style} {label} {RESET}")
        } else {
            format!("[{label}]")
        };
        let heartbeat = if elapsed_secs >= HEARTBEAT_SECS {
            " (still waiting)"
        } else {
            ""
        };
        format!("{badge} {hint} {elapsed_secs:.0}s{heartbeat}")
    }

    fn write_raw(&mut self, text: &str) {
        // Write failures are ignored; prompts still block on input
        let _ = self.output.write_all(text.as_bytes());
        let _ = self.output.flush();
    }
}

impl<R: BufRead + Send, W: Write + Send> OperatorConsole for TerminalConsole<R, W> {
    fn say(&mut self, message: &str) {
        self.write_raw(&format!("{message}\n"));
    }

    fn confirm(&mut self, prompt: &str) -> TrainerResult<()> {
        self.write_raw(&format!("{prompt} "));
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => Err(TrainerError::Console("input closed".into())),
            Ok(_) => Ok(()),
            Err(e) => Err(TrainerError::Console(e.to_string())),
        }
    }

    fn waiting(&mut self, phase: WaitPhase, elapsed_secs: f64) {
        let now = Instant::now();
        if self
            .last_draw
            .is_some_and(|t| now.duration_since(t) < REDRAW_EVERY)
        {
            return;
        }
        self.last_draw = Some(now);
        let status = self.status_text(phase, elapsed_secs);
        self.write_raw(&format!("{CLEAR_LINE}{status}"));
    }

    fn wait_finished(&mut self, phase: WaitPhase, observed: bool) {
        let drew = self.last_draw.take().is_some();
        let outcome = match (phase, observed) {
            (WaitPhase::Carrier, true) => "[WAIT] Carrier detected.",
            (WaitPhase::Unkey, true) => "[WAIT] Unkey detected.",
            (_, false) => "[WAIT] timeout.",
        };
        let prefix = if drew { CLEAR_LINE } else { "" };
        self.write_raw(&format!("{prefix}{outcome}\n"));
    }

    fn beep(&mut self) {
        self.write_raw("\x07");
    }
}
