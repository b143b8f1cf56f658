//! # Session supervision
//!
//! A session is one live TCP connection with a peer. The supervisor splits the
//! stream, runs a [`receiver`] and a [`sender`] task side by side and watches
//! the shared [`ShutdownToken`]:
//!
//! ```text
//!  Starting ──► Active ──► Draining ──► Closed
//!                 │            ▲
//!                 │ token set  │ abort sender if it is still
//!                 └────────────┘ blocked on console input
//! ```
//!
//! The sender may be parked on a console read when the peer quits. Nothing it
//! could read would ever be sent, so it is aborted rather than left to hold
//! the keyboard until the next keystroke.

pub mod receiver;
pub mod sender;
pub mod shutdown;

pub use receiver::ReceiverExit;
pub use sender::SenderExit;
pub use shutdown::{ShutdownCause, ShutdownToken};

use crate::config::Role;
use crate::console::{ConsoleInput, Printer};
use crate::protocol::Endpoints;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// How a finished session ended, as seen from this side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The local user quit. A server stops listening after this.
    LocalQuit,
    /// The peer sent `QUIT`.
    RemoteQuit,
    /// The connection dropped without a `QUIT`.
    Disconnected,
}

impl From<ShutdownCause> for SessionEnd {
    fn from(cause: ShutdownCause) -> Self {
        match cause {
            ShutdownCause::LocalQuit => SessionEnd::LocalQuit,
            ShutdownCause::RemoteQuit => SessionEnd::RemoteQuit,
            ShutdownCause::Disconnected => SessionEnd::Disconnected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Starting,
    Active,
    Draining,
    Closed,
}

/// Runs one session over `stream` to completion.
///
/// `input` must be the console handle obtained from the router for this
/// session. `drain_timeout` bounds how long the connection is kept open for
/// the peer to hang up after the session ended. Errors are only returned for
/// failures of the supervisor itself (address lookup, a panicked task);
/// network trouble ends the session as [`SessionEnd::Disconnected`].
pub async fn run_session(
    stream: TcpStream,
    role: Role,
    input: ConsoleInput,
    output: Printer,
    drain_timeout: Duration,
) -> Result<SessionEnd> {
    let local = stream.local_addr().context("Failed to read local address")?;
    let peer = stream.peer_addr().context("Failed to read peer address")?;
    let mut supervisor = Supervisor::new(peer);

    let endpoints = session_endpoints(role, local, peer);
    let shutdown = ShutdownToken::new();
    let (read_half, write_half) = stream.into_split();

    let mut receiver = tokio::spawn(receiver::run_receiver(
        read_half,
        shutdown.clone(),
        output.clone(),
    ));
    let mut sender = tokio::spawn(sender::run_sender(
        input,
        write_half,
        shutdown.clone(),
        endpoints,
        output,
    ));
    supervisor.enter(SessionState::Active);

    let sender_finished = tokio::select! {
        result = &mut sender => Some(result),
        cause = shutdown.triggered() => {
            debug!("Session with {} ending: {:?}", peer, cause);
            None
        }
    };
    supervisor.enter(SessionState::Draining);

    let sender_exit = match sender_finished {
        Some(result) => result.context("Sender task failed")?,
        None => cancel_sender(sender).await?,
    };
    debug!("Sender finished: {:?}", sender_exit);

    let receiver_exit = drain_receiver(&mut receiver, drain_timeout).await?;
    debug!("Receiver finished: {:?}", receiver_exit);
    supervisor.enter(SessionState::Closed);

    // Every sender and receiver exit path sets the token first.
    let end = shutdown
        .cause()
        .map_or(SessionEnd::Disconnected, SessionEnd::from);
    info!("Session with {} ended: {:?}", peer, end);
    Ok(end)
}

/// Client/server addresses for `STATUS`, from this side's point of view.
fn session_endpoints(role: Role, local: SocketAddr, peer: SocketAddr) -> Endpoints {
    match role {
        Role::Server => Endpoints {
            client: Some(peer),
            server: Some(local),
        },
        Role::Client => Endpoints {
            client: Some(local),
            server: Some(peer),
        },
    }
}

/// Aborts the sender and waits until it is gone. If it finished on its own in
/// the meantime, its real exit is returned.
async fn cancel_sender(sender: JoinHandle<SenderExit>) -> Result<SenderExit> {
    sender.abort();
    match sender.await {
        Ok(exit) => Ok(exit),
        Err(e) if e.is_cancelled() => Ok(SenderExit::Cancelled),
        Err(e) => Err(e).context("Sender task failed"),
    }
}

/// Gives the peer `drain_timeout` to close its end, then closes ours.
async fn drain_receiver(
    receiver: &mut JoinHandle<ReceiverExit>,
    drain_timeout: Duration,
) -> Result<Option<ReceiverExit>> {
    match tokio::time::timeout(drain_timeout, &mut *receiver).await {
        Ok(result) => Ok(Some(result.context("Receiver task failed")?)),
        Err(_) => {
            debug!("Peer still connected after {:?}, closing", drain_timeout);
            receiver.abort();
            let _ = (&mut *receiver).await;
            Ok(None)
        }
    }
}

struct Supervisor {
    peer: SocketAddr,
    state: SessionState,
}

impl Supervisor {
    fn new(peer: SocketAddr) -> Self {
        debug!("Session with {} starting", peer);
        Self {
            peer,
            state: SessionState::Starting,
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug!("Session with {}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }
}
