//! # Peer entry point
//!
//! Turns a [`Config`] into a running chat: a client connects and runs one
//! session, a server hands control to the listen loop, and auto mode lets the
//! negotiator pick between the two.
//!
//! ```text
//!            ┌──────────┐ connected ┌────────────────┐
//!  Auto ────►│negotiate │──────────►│ client session │
//!            └──────────┘           └────────────────┘
//!                 │ refused
//!                 ▼
//!            ┌──────────┐  accept   ┌────────────────┐
//!  Server ──►│  listen  │──────────►│ server session │──┐
//!            └──────────┘◄──────────└────────────────┘  │ local quit
//!                          peer left                     ▼
//!                                                       exit
//! ```

use crate::config::{Config, Mode, Role};
use crate::console::{ConsoleInput, ConsoleRouter, Printer};
use crate::listen::{self, ListenOutcome};
use crate::negotiate::{self, Negotiated};
use crate::session::{self, SessionEnd};
use anyhow::{Context, Result};
use tokio::net::TcpStream;
use tracing::info;

/// What a finished run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finished {
    Server(ListenOutcome),
    Client(SessionEnd),
}

impl Finished {
    pub fn role(&self) -> Role {
        match self {
            Finished::Server(_) => Role::Server,
            Finished::Client(_) => Role::Client,
        }
    }
}

/// Runs the chat described by `config` until it is over.
///
/// Fatal problems (bind failure, refused connect outside auto mode, failed
/// negotiation) are returned as errors; the way a session ended is not an
/// error.
pub async fn run_peer(config: &Config, input: ConsoleInput, output: Printer) -> Result<Finished> {
    let mut router = ConsoleRouter::new(input, output);
    let address = config.address();

    match config.mode {
        Mode::Server => {
            let outcome = listen::run_server(config, &mut router).await?;
            Ok(Finished::Server(outcome))
        }
        Mode::Client => {
            let stream = negotiate::connect(&address, config.connect_timeout).await?;
            run_client(config, stream, &mut router).await
        }
        Mode::Auto => match negotiate::negotiate(&address, config.connect_timeout).await? {
            Negotiated::Client(stream) => run_client(config, stream, &mut router).await,
            Negotiated::Server => {
                let outcome = listen::run_server(config, &mut router).await?;
                Ok(Finished::Server(outcome))
            }
        },
    }
}

async fn run_client(
    config: &Config,
    stream: TcpStream,
    router: &mut ConsoleRouter,
) -> Result<Finished> {
    let peer = stream.peer_addr().context("Failed to read peer address")?;
    let output = router.output().clone();
    info!("Connected to {}", peer);
    output.line(format!("Connected to {peer}"));

    let input = router
        .switch_to_bound()
        .await
        .context("Console input is no longer available")?;
    let drain_timeout = config.drain_timeout;
    let end =
        session::run_session(stream, Role::Client, input, output.clone(), drain_timeout).await?;

    match end {
        SessionEnd::LocalQuit => {}
        SessionEnd::RemoteQuit => output.line("Peer ended the session"),
        SessionEnd::Disconnected => output.line("Connection closed by peer"),
    }
    Ok(Finished::Client(end))
}
