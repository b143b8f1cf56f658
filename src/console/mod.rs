//! # Console I/O
//!
//! Keyboard input is read by one blocking task that waits on `stdin` and
//! pushes every raw line into a bounded channel. The receiving end of that
//! channel is wrapped in [`ConsoleInput`], a cloneable handle whose
//! [`next_line`] is cancel-safe: a task aborted while waiting for a line
//! neither loses nor consumes it, so the next owner gets it instead.
//!
//! Output goes through [`Printer`], which writes one whole line per call.
//!
//! ```text
//! ┌───────┐ read_until ┌───────────────┐  mpsc  ┌──────────────┐
//! │ stdin │───────────►│ blocking task │───────►│ ConsoleInput │──► idle handler | sender
//! └───────┘            └───────────────┘        └──────────────┘
//! ```
//!
//! [`next_line`]: ConsoleInput::next_line

pub mod router;

pub use router::{ConsoleMode, ConsoleRouter, IdleExit};

use std::collections::VecDeque;
use std::io::{BufRead, ErrorKind, Write};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, warn};

/// Lines buffered between the stdin reader and the current consumer.
const INPUT_QUEUE: usize = 64;

struct Lines {
    rx: mpsc::Receiver<String>,
    /// Lines handed back by a consumer that stopped before acting on them.
    returned: VecDeque<String>,
}

/// Shared handle on the process-wide console line stream.
#[derive(Clone)]
pub struct ConsoleInput {
    lines: Arc<Mutex<Lines>>,
}

impl ConsoleInput {
    /// Starts the stdin reader and returns the input handle.
    ///
    /// The reader stays blocked on `stdin` until the process exits, so the
    /// runtime is never shut down gracefully; `main` exits the process.
    pub fn stdin() -> Self {
        let (tx, input) = Self::channel();
        tokio::task::spawn_blocking(move || {
            let stdin = std::io::stdin();
            pump_lines(stdin.lock(), &tx);
        });
        input
    }

    /// Creates an input handle fed by the returned sender instead of stdin.
    pub fn channel() -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(INPUT_QUEUE);
        let lines = Lines {
            rx,
            returned: VecDeque::new(),
        };
        (
            tx,
            Self {
                lines: Arc::new(Mutex::new(lines)),
            },
        )
    }

    /// Waits for the next raw line, terminator included.
    ///
    /// Returns `None` once the input is closed. Cancel-safe.
    pub async fn next_line(&self) -> Option<String> {
        let mut lines = self.lines.lock().await;
        if let Some(line) = lines.returned.pop_front() {
            return Some(line);
        }
        lines.rx.recv().await
    }

    /// Puts a line back so the next [`next_line`](Self::next_line) call
    /// returns it first.
    pub async fn give_back(&self, line: String) {
        self.lines.lock().await.returned.push_front(line);
    }
}

/// Forwards raw lines from `reader` into `tx` until end of input, a read
/// error, or until nobody listens anymore. Bytes that are not valid UTF-8
/// are replaced rather than ending the input.
fn pump_lines<R: BufRead>(mut reader: R, tx: &mpsc::Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("stdin reached end of file");
                return;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                if tx.blocking_send(line).is_err() {
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Failed to read from stdin: {}", e);
                return;
            }
        }
    }
}

/// Line-oriented console output.
#[derive(Clone)]
pub enum Printer {
    Stdout,
    /// Collects lines instead of printing them.
    Channel(mpsc::UnboundedSender<String>),
}

impl Printer {
    /// A printer that records every line into the returned receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Printer::Channel(tx), rx)
    }

    /// Prints one line. The line is written under a single stdout lock so
    /// concurrent writers never split it. A closed stdout is not fatal.
    pub fn line(&self, text: impl Into<String>) {
        let text = text.into();
        match self {
            Printer::Stdout => {
                let mut stdout = std::io::stdout().lock();
                if let Err(e) = writeln!(stdout, "{text}").and_then(|_| stdout.flush()) {
                    debug!("Failed to write to stdout: {}", e);
                }
            }
            Printer::Channel(tx) => {
                let _ = tx.send(text);
            }
        }
    }
}
