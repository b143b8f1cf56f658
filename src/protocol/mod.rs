//! # Wire and console protocol
//!
//! Everything on the wire is UTF-8 text terminated by `\n`. Two lines are
//! reserved and intercepted before they reach the network or the screen:
//!
//! | Line     | Meaning                                              |
//! |----------|------------------------------------------------------|
//! | `QUIT`   | end the session; sent to the peer, then sending stops |
//! | `STATUS` | print local connection info; never sent              |
//!
//! A third, non-printable line ([`HEARTBEAT`]) is reserved for liveness
//! checks and is dropped by the receiving side.
//!
//! ## Framing
//!
//! The receiver reads at most [`RECV_BUFFER_SIZE`] bytes at a time. Every
//! complete line in a read is one message, and an unterminated tail of a read
//! is delivered as a message of its own. A line that straddles two reads is
//! therefore delivered in two pieces.

use std::fmt;
use std::net::SocketAddr;

/// Ends the session.
pub const QUIT: &str = "QUIT";

/// Prints local connection details.
pub const STATUS: &str = "STATUS";

/// Reserved liveness line, discarded by the receiver.
pub const HEARTBEAT: &str = "\u{5}";

/// Maximum number of bytes consumed per socket read.
pub const RECV_BUFFER_SIZE: usize = 4096;

/// Prefix put in front of every line printed on behalf of the peer.
pub const REMOTE_PREFIX: &str = "[remote] ";

/// A console line after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Text(String),
    Status,
    Quit,
}

impl Command {
    /// Classifies one console line.
    ///
    /// A single trailing line terminator is removed first. `QUIT` must match
    /// exactly, `STATUS` may carry surrounding whitespace. Returns `None` for
    /// empty lines, which are never sent.
    pub fn parse(raw: &str) -> Option<Command> {
        let line = strip_terminator(raw);
        if line == QUIT {
            return Some(Command::Quit);
        }
        if line.trim() == STATUS {
            return Some(Command::Status);
        }
        if line.is_empty() {
            return None;
        }
        Some(Command::Text(line.to_string()))
    }
}

/// A message decoded from the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Heartbeat,
    Quit,
}

/// Splits one socket read into messages.
///
/// Empty lines are skipped. Decoding is lossy so a peer sending invalid UTF-8
/// still gets its text shown.
pub fn decode_chunk(chunk: &[u8]) -> Vec<Inbound> {
    let text = String::from_utf8_lossy(chunk);
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| match line {
            QUIT => Inbound::Quit,
            HEARTBEAT => Inbound::Heartbeat,
            other => Inbound::Text(other.to_string()),
        })
        .collect()
}

/// Appends the line terminator used on the wire.
pub fn encode_line(payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 1);
    out.extend_from_slice(payload.as_bytes());
    out.push(b'\n');
    out
}

fn strip_terminator(raw: &str) -> &str {
    raw.strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(raw)
}

/// The two ends of a (possibly not yet existing) connection, as shown by
/// `STATUS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub client: Option<SocketAddr>,
    pub server: Option<SocketAddr>,
}

impl Endpoints {
    /// Endpoints of a server that is listening but has no peer.
    pub fn listening(server: SocketAddr) -> Self {
        Self {
            client: None,
            server: Some(server),
        }
    }
}

impl fmt::Display for Endpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(addr: Option<SocketAddr>) -> String {
            addr.map_or_else(|| "NONE".to_string(), |a| a.to_string())
        }
        write!(
            f,
            "[STATUS] Client: {}; Server: {}",
            side(self.client),
            side(self.server)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quit_exact() {
        assert_eq!(Command::parse("QUIT\n"), Some(Command::Quit));
        assert_eq!(Command::parse("QUIT\r\n"), Some(Command::Quit));
        assert_eq!(Command::parse("QUIT"), Some(Command::Quit));
    }

    #[test]
    fn test_parse_quit_is_case_sensitive() {
        assert_eq!(Command::parse("quit\n"), Some(Command::Text("quit".into())));
        assert_eq!(Command::parse(" QUIT\n"), Some(Command::Text(" QUIT".into())));
    }

    #[test]
    fn test_parse_status_trimmed() {
        assert_eq!(Command::parse("STATUS\n"), Some(Command::Status));
        assert_eq!(Command::parse("  STATUS \n"), Some(Command::Status));
        assert_eq!(Command::parse("Status\n"), Some(Command::Text("Status".into())));
    }

    #[test]
    fn test_parse_empty_dropped() {
        assert_eq!(Command::parse("\n"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("\r\n"), None);
    }

    #[test]
    fn test_parse_text_keeps_inner_whitespace() {
        assert_eq!(
            Command::parse("  hello there \n"),
            Some(Command::Text("  hello there ".into()))
        );
    }

    #[test]
    fn test_decode_chunk_splits_coalesced_lines() {
        assert_eq!(
            decode_chunk(b"one\ntwo\r\nthree\n"),
            vec![
                Inbound::Text("one".into()),
                Inbound::Text("two".into()),
                Inbound::Text("three".into()),
            ]
        );
    }

    #[test]
    fn test_decode_chunk_unterminated_tail() {
        assert_eq!(
            decode_chunk(b"TEST COMMUNICATION 0"),
            vec![Inbound::Text("TEST COMMUNICATION 0".into())]
        );
    }

    #[test]
    fn test_decode_chunk_sentinels() {
        assert_eq!(
            decode_chunk(b"bye\nQUIT\n"),
            vec![Inbound::Text("bye".into()), Inbound::Quit]
        );
        assert_eq!(decode_chunk("\u{5}\n".as_bytes()), vec![Inbound::Heartbeat]);
    }

    #[test]
    fn test_decode_chunk_invalid_utf8_is_lossy() {
        let decoded = decode_chunk(b"caf\xff\n");
        assert_eq!(decoded, vec![Inbound::Text("caf\u{fffd}".into())]);
    }

    #[test]
    fn test_encode_line() {
        assert_eq!(encode_line("hello"), b"hello\n".to_vec());
        assert_eq!(encode_line(QUIT), b"QUIT\n".to_vec());
    }

    #[test]
    fn test_status_line_format() {
        let server: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let client: SocketAddr = "127.0.0.1:41234".parse().unwrap();
        assert_eq!(
            Endpoints::listening(server).to_string(),
            "[STATUS] Client: NONE; Server: 127.0.0.1:50000"
        );
        let both = Endpoints {
            client: Some(client),
            server: Some(server),
        };
        assert_eq!(
            both.to_string(),
            "[STATUS] Client: 127.0.0.1:41234; Server: 127.0.0.1:50000"
        );
        assert_eq!(
            Endpoints::default().to_string(),
            "[STATUS] Client: NONE; Server: NONE"
        );
    }
}
