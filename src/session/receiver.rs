//! Socket → console half of a session.

use super::shutdown::{ShutdownCause, ShutdownToken};
use crate::console::Printer;
use crate::protocol::{self, Inbound, RECV_BUFFER_SIZE, REMOTE_PREFIX};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, trace, warn};

/// How the receive loop ended. A clean `QUIT` and a dropped connection lead to
/// different outcomes for the caller, so they are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverExit {
    RemoteQuit,
    Disconnected,
}

/// Prints everything the peer sends until it quits or the connection goes
/// away. The reader is dropped on return, closing this side of the stream.
pub async fn run_receiver<R>(
    mut reader: R,
    shutdown: ShutdownToken,
    output: Printer,
) -> ReceiverExit
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; RECV_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!("Peer closed the connection");
                return disconnected(&shutdown);
            }
            Ok(n) => n,
            Err(e) if is_peer_drop(e.kind()) => {
                debug!("Connection dropped by peer: {}", e);
                return disconnected(&shutdown);
            }
            Err(e) => {
                warn!("Failed to read from peer: {}", e);
                return disconnected(&shutdown);
            }
        };

        for message in protocol::decode_chunk(&buffer[..n]) {
            match message {
                Inbound::Quit => {
                    info!("Peer sent quit");
                    shutdown.trigger(ShutdownCause::RemoteQuit);
                    return ReceiverExit::RemoteQuit;
                }
                Inbound::Heartbeat => trace!("Heartbeat from peer"),
                Inbound::Text(text) => output.line(format!("{REMOTE_PREFIX}{text}")),
            }
        }
    }
}

fn is_peer_drop(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted)
}

fn disconnected(shutdown: &ShutdownToken) -> ReceiverExit {
    shutdown.trigger(ShutdownCause::Disconnected);
    ReceiverExit::Disconnected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_prints_remote_lines_until_quit() {
        let (printer, mut out) = Printer::channel();
        let (mut remote, local) = tokio::io::duplex(RECV_BUFFER_SIZE);
        let token = ShutdownToken::new();

        remote.write_all(b"hello\n").await.unwrap();
        remote.write_all("\u{5}\n".as_bytes()).await.unwrap();
        remote.write_all(b"how are you\nQUIT\nignored\n").await.unwrap();

        let exit = run_receiver(local, token.clone(), printer).await;
        assert_eq!(exit, ReceiverExit::RemoteQuit);
        assert_eq!(token.cause(), Some(ShutdownCause::RemoteQuit));
        assert_eq!(out.recv().await.as_deref(), Some("[remote] hello"));
        assert_eq!(out.recv().await.as_deref(), Some("[remote] how are you"));
        assert!(out.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_eof_is_disconnect_not_quit() {
        let (printer, mut out) = Printer::channel();
        let (mut remote, local) = tokio::io::duplex(RECV_BUFFER_SIZE);
        let token = ShutdownToken::new();

        remote.write_all(b"bye\n").await.unwrap();
        drop(remote);

        let exit = run_receiver(local, token.clone(), printer).await;
        assert_eq!(exit, ReceiverExit::Disconnected);
        assert_eq!(token.cause(), Some(ShutdownCause::Disconnected));
        assert_eq!(out.recv().await.as_deref(), Some("[remote] bye"));
    }

    #[tokio::test]
    async fn test_disconnect_keeps_earlier_cause() {
        let (printer, _out) = Printer::channel();
        let (remote, local) = tokio::io::duplex(RECV_BUFFER_SIZE);
        let token = ShutdownToken::new();
        token.trigger(ShutdownCause::LocalQuit);
        drop(remote);

        assert_eq!(
            run_receiver(local, token.clone(), printer).await,
            ReceiverExit::Disconnected
        );
        assert_eq!(token.cause(), Some(ShutdownCause::LocalQuit));
    }

    #[tokio::test]
    async fn test_oversized_line_is_split_at_buffer_size() {
        let (printer, mut out) = Printer::channel();
        let (mut remote, local) = tokio::io::duplex(RECV_BUFFER_SIZE * 2);
        let token = ShutdownToken::new();

        let long = "x".repeat(RECV_BUFFER_SIZE + 10);
        remote.write_all(long.as_bytes()).await.unwrap();
        remote.write_all(b"\n").await.unwrap();
        drop(remote);

        run_receiver(local, token, printer).await;
        let first = out.recv().await.unwrap();
        let second = out.recv().await.unwrap();
        assert_eq!(first.len(), REMOTE_PREFIX.len() + RECV_BUFFER_SIZE);
        assert_eq!(second, format!("{REMOTE_PREFIX}{}", "x".repeat(10)));
    }
}
