//! # Configuration
//!
//! Command-line arguments and the immutable [`Config`] built from them. The
//! config is constructed once in `main` and handed down by reference; nothing
//! in the crate mutates host or port after startup.

use anyhow::{Result, ensure};
use clap::Parser;
use std::fmt;
use std::time::Duration;

/// Default port used when `--port` is not given.
pub const DEFAULT_PORT: u16 = 3000;

/// Default peer/bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bound on the outbound connect attempt, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Default wait for the peer to hang up after a session ends, in milliseconds.
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 1000;

/// Command-line arguments for `talk`
///
/// Without `--server` or `--auto` the process connects to `HOST` as a client.
///
/// # Examples
///
/// ```bash
/// # Wait for a peer on port 4000
/// talk --server --port 4000
///
/// # Connect to that peer
/// talk 127.0.0.1 --port 4000
///
/// # Either side can use auto mode: connect if someone listens, listen otherwise
/// talk --auto --port 4000
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Line-based chat with a single peer over TCP")]
pub struct Args {
    /// Host to connect to (client/auto) or bind to (server)
    #[arg(default_value = DEFAULT_HOST)]
    pub host: String,

    /// Listen for a peer instead of connecting
    #[arg(short, long, conflicts_with = "auto")]
    pub server: bool,

    /// Connect if a peer is listening, otherwise become the listener
    #[arg(short, long)]
    pub auto: bool,

    /// Port to connect to or listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Timeout for the outbound connect attempt, in milliseconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,

    /// How long to wait for the peer to close after the session ends, in milliseconds
    #[arg(long, default_value_t = DEFAULT_DRAIN_TIMEOUT_MS)]
    pub drain_timeout_ms: u64,

    /// Mirror log output to stderr in addition to the log file
    #[arg(short, long)]
    pub verbose: bool,
}

/// How the process decides its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Server,
    Client,
    /// Try connecting first, listen if the connection is refused.
    Auto,
}

/// The side of the connection this process ended up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server => f.write_str("server"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mode: Mode,
    pub connect_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, mode: Mode) -> Self {
        Self {
            host: host.into(),
            port,
            mode,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            drain_timeout: Duration::from_millis(DEFAULT_DRAIN_TIMEOUT_MS),
        }
    }

    /// `host:port` as used for connect and bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        ensure!(args.port != 0, "Invalid port: 0");
        ensure!(!args.host.trim().is_empty(), "Invalid host: empty");
        ensure!(
            args.connect_timeout_ms > 0,
            "Connect timeout must be greater than zero"
        );

        let mode = if args.server {
            Mode::Server
        } else if args.auto {
            Mode::Auto
        } else {
            Mode::Client
        };

        Ok(Self {
            host: args.host,
            port: args.port,
            mode,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            drain_timeout: Duration::from_millis(args.drain_timeout_ms),
        })
    }
}
