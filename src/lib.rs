//! # Talk - peer-to-peer line chat
//!
//! Talk connects two terminals over a single TCP connection. Each line typed
//! on one side shows up on the other as `[remote] <line>`.
//!
//! ## Quick Start
//!
//! ```bash
//! # Terminal 1: wait for a peer
//! talk --server --port 50000
//!
//! # Terminal 2: connect to it
//! talk 127.0.0.1 --port 50000
//!
//! # Or run the same command on both sides; the first one listens
//! talk --auto --port 50000
//! ```
//!
//! Typing `QUIT` ends the session on both sides, `STATUS` prints the local and
//! remote addresses without sending anything.
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use talk::config::{Config, Mode};
//! use talk::console::{ConsoleInput, Printer};
//! use talk::peer::run_peer;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::new("127.0.0.1", 50000, Mode::Auto);
//! let finished = run_peer(&config, ConsoleInput::stdin(), Printer::Stdout).await?;
//! println!("ran as {}", finished.role());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **[Console](console)**: stdin reader thread and the router that decides who
//!   owns keyboard input
//! - **[Session](session)**: sender, receiver and the supervisor tying them to
//!   one connection
//! - **[Negotiate](negotiate)**: client connect and auto-mode role resolution
//! - **[Listen](listen)**: server accept loop
//! - **[Peer](peer)**: entry point combining the above
//!
//! ## Limitations
//!
//! - One peer at a time; a server serves peers one after another.
//! - Messages are newline-delimited and read at most 4096 bytes at a time, see
//!   [`protocol`].
//! - No encryption or authentication.

pub mod config;
pub mod console;
pub mod listen;
pub mod negotiate;
pub mod peer;
pub mod protocol;
pub mod session;
