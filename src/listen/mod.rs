//! # Server listen loop
//!
//! Binds once, then serves one peer at a time. Between peers the console is
//! idle and only `STATUS`/`QUIT` do anything. A session ended by the local
//! user stops the loop; a peer quitting or dropping off sends the server back
//! to waiting for the next connection.

use crate::config::{Config, Role};
use crate::console::ConsoleRouter;
use crate::protocol::Endpoints;
use crate::session::{self, SessionEnd};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Why the listen loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenOutcome {
    /// The user quit during a session.
    SessionQuit,
    /// The user quit (or the console closed) while no peer was connected.
    IdleQuit,
}

/// Binds the configured address and serves peers until the user quits.
pub async fn run_server(config: &Config, router: &mut ConsoleRouter) -> Result<ListenOutcome> {
    let listener = bind(&config.address()).await?;
    serve(listener, router, config.drain_timeout).await
}

pub async fn bind(address: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Server unable to listen on {address}"))?;
    info!("Listening on {}", address);
    Ok(listener)
}

/// Accept loop over an already bound listener.
pub async fn serve(
    listener: TcpListener,
    router: &mut ConsoleRouter,
    drain_timeout: Duration,
) -> Result<ListenOutcome> {
    let local = listener
        .local_addr()
        .context("Failed to read listening address")?;
    let output = router.output().clone();
    output.line(format!("Listening on {local}"));

    loop {
        router.switch_to_idle(Endpoints::listening(local));

        let (stream, peer) = loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(pair) => break pair,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                exit = router.idle_finished() => {
                    info!("Console finished while waiting for a peer: {:?}", exit);
                    return Ok(ListenOutcome::IdleQuit);
                }
            }
        };
        stream.set_nodelay(true).ok();

        let Some(input) = router.switch_to_bound().await else {
            info!("Console quit as {} connected, dropping it", peer);
            return Ok(ListenOutcome::IdleQuit);
        };

        info!("Connection initiated by {}", peer);
        output.line(format!("Connection initiated by {peer}"));

        let end =
            session::run_session(stream, Role::Server, input, output.clone(), drain_timeout).await;
        match end {
            Ok(SessionEnd::LocalQuit) => return Ok(ListenOutcome::SessionQuit),
            Ok(SessionEnd::RemoteQuit) => output.line("Peer ended the session"),
            Ok(SessionEnd::Disconnected) => debug!("Peer {} disconnected", peer),
            Err(e) => error!("Session with {} failed: {:#}", peer, e),
        }
        info!("Waiting for the next peer on {}", local);
    }
}
