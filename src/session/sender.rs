//! Console → socket half of a session.

use super::shutdown::{ShutdownCause, ShutdownToken};
use crate::console::{ConsoleInput, Printer};
use crate::protocol::{self, Command, Endpoints};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// How the sender loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderExit {
    /// `QUIT` was typed (or the console closed) and the sentinel was sent.
    LocalQuit,
    /// The session was already ending when the next line arrived.
    Stopped,
    /// Writing to the peer failed.
    Disconnected,
    /// Aborted by the supervisor while waiting for console input.
    Cancelled,
}

/// Forwards console lines to `writer` until the session ends.
///
/// `endpoints` is printed for `STATUS`. Every transmitted line goes out in a
/// single `write_all`, and nothing is written once `shutdown` is set. The
/// writer is never shut down here; closing the connection belongs to the
/// supervisor.
pub async fn run_sender<W>(
    input: ConsoleInput,
    mut writer: W,
    shutdown: ShutdownToken,
    endpoints: Endpoints,
    output: Printer,
) -> SenderExit
where
    W: AsyncWrite + Unpin,
{
    loop {
        // Checked first so a line typed after the session ended stays queued
        // for the next console owner.
        let next = tokio::select! {
            biased;
            _ = shutdown.triggered() => {
                debug!("Session ending, releasing console");
                return SenderExit::Stopped;
            }
            line = input.next_line() => line,
        };

        let (raw, command) = match next {
            Some(raw) => match Command::parse(&raw) {
                Some(command) => (Some(raw), command),
                None => continue,
            },
            None => {
                debug!("Console closed, ending session");
                (None, Command::Quit)
            }
        };

        if shutdown.is_triggered() {
            if let Some(raw) = raw {
                hand_back(&input, raw, &command).await;
            }
            return SenderExit::Stopped;
        }

        match command {
            Command::Status => output.line(endpoints.to_string()),
            Command::Quit => {
                if let Err(e) = send_line(&mut writer, protocol::QUIT).await {
                    warn!("Failed to send quit to peer: {}", e);
                }
                shutdown.trigger(ShutdownCause::LocalQuit);
                info!("Local quit sent");
                return SenderExit::LocalQuit;
            }
            Command::Text(text) => {
                if let Err(e) = send_line(&mut writer, &text).await {
                    debug!("Failed to send line to peer: {}", e);
                    shutdown.trigger(ShutdownCause::Disconnected);
                    return SenderExit::Disconnected;
                }
            }
        }
    }
}

/// Deals with a line read just as the session ended. Text is dropped since
/// nothing may be sent anymore; `QUIT` and `STATUS` go back to the console so
/// the next owner acts on them.
async fn hand_back(input: &ConsoleInput, raw: String, command: &Command) {
    match command {
        Command::Quit | Command::Status => input.give_back(raw).await,
        Command::Text(_) => debug!("Session already ending, dropping console line"),
    }
}

async fn send_line<W>(writer: &mut W, payload: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&protocol::encode_line(payload)).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn read_all<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> String {
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_text_and_quit_are_transmitted() {
        let (tx, input) = ConsoleInput::channel();
        let (printer, _out) = Printer::channel();
        let (local, remote) = tokio::io::duplex(1024);
        let token = ShutdownToken::new();

        for line in ["hello\n", "\n", "second line\n", "QUIT\n", "never sent\n"] {
            tx.send(line.into()).await.unwrap();
        }

        let exit = run_sender(input, local, token.clone(), Endpoints::default(), printer).await;
        assert_eq!(exit, SenderExit::LocalQuit);
        assert_eq!(token.cause(), Some(ShutdownCause::LocalQuit));
        assert_eq!(read_all(remote).await, "hello\nsecond line\nQUIT\n");
    }

    #[tokio::test]
    async fn test_status_is_printed_not_sent() {
        let (tx, input) = ConsoleInput::channel();
        let (printer, mut out) = Printer::channel();
        let (local, remote) = tokio::io::duplex(1024);
        let endpoints = Endpoints {
            client: Some("127.0.0.1:41000".parse().unwrap()),
            server: Some("127.0.0.1:50000".parse().unwrap()),
        };

        for line in ["STATUS\n", "STATUS\n", "QUIT\n"] {
            tx.send(line.into()).await.unwrap();
        }

        run_sender(input, local, ShutdownToken::new(), endpoints, printer).await;
        assert_eq!(read_all(remote).await, "QUIT\n");
        let expected = "[STATUS] Client: 127.0.0.1:41000; Server: 127.0.0.1:50000";
        assert_eq!(out.recv().await.as_deref(), Some(expected));
        assert_eq!(out.recv().await.as_deref(), Some(expected));
    }

    #[tokio::test]
    async fn test_nothing_sent_after_shutdown() {
        let (tx, input) = ConsoleInput::channel();
        let (printer, _out) = Printer::channel();
        let (local, remote) = tokio::io::duplex(1024);
        let token = ShutdownToken::new();
        token.trigger(ShutdownCause::RemoteQuit);

        tx.send("late\n".into()).await.unwrap();
        let endpoints = Endpoints::default();
        let exit = run_sender(input.clone(), local, token.clone(), endpoints, printer).await;
        assert_eq!(exit, SenderExit::Stopped);
        assert_eq!(token.cause(), Some(ShutdownCause::RemoteQuit));
        assert_eq!(read_all(remote).await, "");
        // Not consumed: the next console owner still gets it.
        assert_eq!(input.next_line().await.as_deref(), Some("late\n"));
    }

    #[tokio::test]
    async fn test_console_eof_quits() {
        let (tx, input) = ConsoleInput::channel();
        let (printer, _out) = Printer::channel();
        let (local, remote) = tokio::io::duplex(1024);
        let token = ShutdownToken::new();
        drop(tx);

        let exit = run_sender(input, local, token.clone(), Endpoints::default(), printer).await;
        assert_eq!(exit, SenderExit::LocalQuit);
        assert_eq!(read_all(remote).await, "QUIT\n");
    }

    #[tokio::test]
    async fn test_write_failure_is_disconnect() {
        let (tx, input) = ConsoleInput::channel();
        let (printer, _out) = Printer::channel();
        let (local, remote) = tokio::io::duplex(1024);
        drop(remote);
        let token = ShutdownToken::new();

        tx.send("anyone there?\n".into()).await.unwrap();
        let exit = run_sender(input, local, token.clone(), Endpoints::default(), printer).await;
        assert_eq!(exit, SenderExit::Disconnected);
        assert_eq!(token.cause(), Some(ShutdownCause::Disconnected));
    }

    #[tokio::test]
    async fn test_commands_read_while_ending_go_back_to_console() {
        let (_tx, input) = ConsoleInput::channel();

        hand_back(&input, "typed late\n".into(), &Command::Text("typed late".into())).await;
        hand_back(&input, "STATUS\n".into(), &Command::Status).await;
        hand_back(&input, "QUIT\n".into(), &Command::Quit).await;

        // Most recent first; the text line is gone.
        assert_eq!(input.next_line().await.as_deref(), Some("QUIT\n"));
        assert_eq!(input.next_line().await.as_deref(), Some("STATUS\n"));
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), input.next_line())
                .await
                .is_err()
        );
    }
}
