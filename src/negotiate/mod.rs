//! # Connecting and role negotiation
//!
//! A plain client makes one connect attempt and treats any failure as fatal.
//! In auto mode the same single attempt decides the role: if a peer is
//! already listening this process becomes the client, if the connection is
//! refused it becomes the server. Anything else (timeout, unreachable host,
//! bad address) is fatal in both cases. There is no retry.

use anyhow::{Context, Result, bail};
use std::io::{self, ErrorKind};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::info;

/// Result of auto-mode negotiation.
#[derive(Debug)]
pub enum Negotiated {
    /// A peer was listening; talk to it over this stream.
    Client(TcpStream),
    /// Nobody was listening; bind and wait for a peer.
    Server,
}

enum Attempt {
    Connected(TcpStream),
    Refused(io::Error),
}

/// Connects to `address` as a client.
pub async fn connect(address: &str, connect_timeout: Duration) -> Result<TcpStream> {
    match attempt(address, connect_timeout).await? {
        Attempt::Connected(stream) => Ok(stream),
        Attempt::Refused(e) => Err(e).with_context(|| {
            format!("Client unable to communicate with server at {address}: connection refused")
        }),
    }
}

/// Resolves the role for auto mode with one connect attempt.
pub async fn negotiate(address: &str, connect_timeout: Duration) -> Result<Negotiated> {
    match attempt(address, connect_timeout).await? {
        Attempt::Connected(stream) => {
            info!("Peer found at {}, acting as client", address);
            Ok(Negotiated::Client(stream))
        }
        Attempt::Refused(_) => {
            info!("No peer at {}, acting as server", address);
            Ok(Negotiated::Server)
        }
    }
}

async fn attempt(address: &str, connect_timeout: Duration) -> Result<Attempt> {
    info!("Connecting to {}", address);
    match tokio::time::timeout(connect_timeout, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => {
            stream.set_nodelay(true).ok();
            Ok(Attempt::Connected(stream))
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => Ok(Attempt::Refused(e)),
        Ok(Err(e)) => Err(e).with_context(|| format!("Failed to connect to {address}")),
        Err(_) => bail!("Timed out connecting to {address} after {connect_timeout:?}"),
    }
}
