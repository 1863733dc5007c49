//! Receiver: the thin, out-of-scope collaborator (spec §1/§6) that accepts
//! syslog datagrams from local producers, decodes PRI/program framing, and
//! calls `Core::submit`. Kept deliberately minimal — the routing and
//! rotation logic lives entirely in `core`/`classifier`/`writer`.

use std::io::{self, ErrorKind};
use std::os::unix::net::UnixDatagram;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use log::{debug, warn};

use crate::config::GLOBAL;
use crate::core::Core;
use crate::format::format_line;

pub struct Receiver {
    socket: UnixDatagram,
}

impl Receiver {
    pub fn bind(path: &Path) -> io::Result<Receiver> {
        let _ = std::fs::remove_file(path);
        let socket = UnixDatagram::bind(path)?;
        Ok(Receiver { socket })
    }

    /// Poll with a timeout rather than blocking forever, so the main loop
    /// can notice a shutdown signal between reads.
    pub fn set_timeout(&self, timeout: Duration) {
        let _ = self.socket.set_read_timeout(Some(timeout));
    }

    /// Receive and route (at most) one datagram.
    pub fn recv_one(&self, core: &mut Core, host: &str) {
        let mut buf = [0u8; 4096];
        let n = match self.socket.recv(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                debug!("receiver poll timed out");
                return;
            }
            Err(e) => {
                warn!("receiver read error: {}", e);
                return;
            }
        };
        let raw = String::from_utf8_lossy(&buf[..n]);
        match parse_datagram(&raw) {
            Some((facility, level, context, program, pid, message)) => {
                let line = format_line(Utc::now(), host, &program, pid, &message);
                core.submit(&context, facility, level, &program, &line);
            }
            None => warn!("dropping malformed datagram: {:?}", raw),
        }
    }
}

/// Decode BSD-syslog-like framing: `<PRI>[@context ]program[pid]: message`.
/// The `@context` token is a local convention of this daemon's producers
/// for naming the routing context; when absent the message routes through
/// `<global>`.
fn parse_datagram(raw: &str) -> Option<(u8, u8, String, String, u32, String)> {
    let raw = raw.trim_end_matches(['\r', '\n'].as_ref());
    let rest = raw.strip_prefix('<')?;
    let (pri, rest) = rest.split_once('>')?;
    let pri: u8 = pri.parse().ok()?;
    let facility = pri >> 3;
    let level = pri & 0x7;

    let (context, rest) = match rest.strip_prefix('@') {
        Some(tail) => {
            let (ctx, tail) = tail.split_once(' ')?;
            (ctx.to_string(), tail)
        }
        None => (GLOBAL.to_string(), rest),
    };

    let (program_pid, message) = rest.split_once(": ")?;
    let (program, pid) = match program_pid.split_once('[') {
        Some((program, pid_bracket)) => {
            let pid_str = pid_bracket.trim_end_matches(']');
            (program.to_string(), pid_str.parse().unwrap_or(0))
        }
        None => (program_pid.to_string(), 0),
    };

    Some((facility, level, context, program, pid, message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_datagram() {
        let (facility, level, context, program, pid, message) =
            parse_datagram("<14>myprog[123]: hello world").unwrap();
        assert_eq!(facility, 1);
        assert_eq!(level, 6);
        assert_eq!(context, GLOBAL);
        assert_eq!(program, "myprog");
        assert_eq!(pid, 123);
        assert_eq!(message, "hello world");
    }

    #[test]
    fn parses_datagram_with_explicit_context() {
        let (_, _, context, program, _, message) =
            parse_datagram("<11>@audit sshd[1]: login failure").unwrap();
        assert_eq!(context, "audit");
        assert_eq!(program, "sshd");
        assert_eq!(message, "login failure");
    }

    #[test]
    fn rejects_datagram_without_pri() {
        assert!(parse_datagram("myprog[1]: no pri here").is_none());
    }
}
