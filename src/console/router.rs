//! Ownership of console input across connection lifecycle.
//!
//! While no peer is connected an idle task owns the keyboard and only reacts to
//! `STATUS` and `QUIT`. When a session starts the idle task is aborted and the
//! input handle goes to the session's sender. Abort is safe here because the
//! idle task is always parked in [`ConsoleInput::next_line`], which is
//! cancel-safe: a line is consumed by exactly one owner.

use super::{ConsoleInput, Printer};
use crate::protocol::{Command, Endpoints};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Who currently consumes console lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleMode {
    /// No peer; local commands only.
    Idle,
    /// A session's sender owns the input.
    Bound,
}

/// Why the idle handler stopped on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleExit {
    /// The user typed `QUIT`.
    Quit,
    /// Console input reached end of file.
    Closed,
}

pub struct ConsoleRouter {
    input: ConsoleInput,
    output: Printer,
    mode: ConsoleMode,
    idle: Option<JoinHandle<IdleExit>>,
}

impl ConsoleRouter {
    /// Creates a router in idle mode with no idle handler running yet.
    pub fn new(input: ConsoleInput, output: Printer) -> Self {
        Self {
            input,
            output,
            mode: ConsoleMode::Idle,
            idle: None,
        }
    }

    pub fn mode(&self) -> ConsoleMode {
        self.mode
    }

    pub fn output(&self) -> &Printer {
        &self.output
    }

    /// Hands the console to a fresh idle handler.
    ///
    /// `endpoints` is what `STATUS` reports while idle. Must only be called
    /// once the previous consumer has finished.
    pub fn switch_to_idle(&mut self, endpoints: Endpoints) {
        if let Some(previous) = self.idle.take() {
            previous.abort();
        }
        let input = self.input.clone();
        let output = self.output.clone();
        self.idle = Some(tokio::spawn(run_idle(input, output, endpoints)));
        self.mode = ConsoleMode::Idle;
        debug!("Console switched to idle mode");
    }

    /// Takes the console away from the idle handler.
    ///
    /// Returns the input handle for the session's sender, or `None` when the
    /// idle handler had already exited (the user quit before the peer
    /// arrived), in which case the caller should shut down.
    pub async fn switch_to_bound(&mut self) -> Option<ConsoleInput> {
        if let Some(handle) = self.idle.take() {
            handle.abort();
            match handle.await {
                Ok(exit) => {
                    debug!("Idle handler exited before bind: {:?}", exit);
                    return None;
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    warn!("Idle console handler failed: {}", e);
                    return None;
                }
            }
        }
        self.mode = ConsoleMode::Bound;
        debug!("Console switched to bound mode");
        Some(self.input.clone())
    }

    /// Resolves when the idle handler stops by itself. Pends forever if no
    /// idle handler is running. Cancel-safe.
    pub async fn idle_finished(&mut self) -> IdleExit {
        let Some(handle) = self.idle.as_mut() else {
            return std::future::pending().await;
        };
        let result = handle.await;
        self.idle = None;
        match result {
            Ok(exit) => exit,
            Err(e) => {
                warn!("Idle console handler failed: {}", e);
                IdleExit::Closed
            }
        }
    }
}

impl Drop for ConsoleRouter {
    fn drop(&mut self) {
        if let Some(handle) = self.idle.take() {
            handle.abort();
        }
    }
}

async fn run_idle(input: ConsoleInput, output: Printer, endpoints: Endpoints) -> IdleExit {
    loop {
        let Some(raw) = input.next_line().await else {
            return IdleExit::Closed;
        };
        match Command::parse(&raw) {
            Some(Command::Quit) => return IdleExit::Quit,
            Some(Command::Status) => output.line(endpoints.to_string()),
            Some(Command::Text(_)) => debug!("No peer connected, dropping console line"),
            None => {}
        }
    }
}
