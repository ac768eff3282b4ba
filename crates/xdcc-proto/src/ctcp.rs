//! CTCP (Client-to-Client Protocol) message handling.
//!
//! CTCP messages are embedded in PRIVMSG/NOTICE bodies between `\x01`
//! delimiters. XDCC bots open file transfers with a `DCC SEND` CTCP:
//!
//! ```text
//! \x01DCC SEND <filename> <ip> <port> [<size>] [<token>]\x01
//! ```
//!
//! `<ip>` is the sender's IPv4 address as a big-endian 32-bit decimal
//! integer. A port of `0` asks the receiver to listen instead (passive DCC).
//!
//! # Example
//!
//! ```
//! use xdcc_proto::ctcp::{Ctcp, CtcpKind, DccSend};
//!
//! let ctcp = Ctcp::parse("\x01DCC SEND file.bin 2130706433 5000 42\x01").unwrap();
//! assert_eq!(ctcp.kind, CtcpKind::Dcc);
//! let send = DccSend::parse(ctcp.params.unwrap()).unwrap();
//! assert_eq!(send.ipv4().to_string(), "127.0.0.1");
//! assert_eq!(send.size, Some(42));
//! ```

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::ProtocolError;

/// The CTCP delimiter character (`\x01`).
pub(crate) const CTCP_DELIM: char = '\x01';

/// CTCP command types the client cares about.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CtcpKind {
    /// ACTION, `/me`.
    Action,
    /// VERSION request.
    Version,
    /// PING latency probe.
    Ping,
    /// DCC connection setup.
    Dcc,
    /// Anything else.
    Unknown(String),
}

impl CtcpKind {
    /// Parse a CTCP command name.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ACTION" => Self::Action,
            "VERSION" => Self::Version,
            "PING" => Self::Ping,
            "DCC" => Self::Dcc,
            _ => Self::Unknown(name.to_owned()),
        }
    }

    /// Canonical uppercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "ACTION",
            Self::Version => "VERSION",
            Self::Ping => "PING",
            Self::Dcc => "DCC",
            Self::Unknown(s) => s,
        }
    }
}

impl fmt::Display for CtcpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed CTCP message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ctcp<'a> {
    /// The CTCP command type.
    pub kind: CtcpKind,
    /// Parameters following the command.
    pub params: Option<&'a str>,
}

impl<'a> Ctcp<'a> {
    /// Parse a CTCP message from a PRIVMSG/NOTICE body.
    ///
    /// Returns `None` if the body is not CTCP. A missing closing delimiter is
    /// tolerated.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.strip_prefix(CTCP_DELIM)?;
        let text = text.strip_suffix(CTCP_DELIM).unwrap_or(text);

        if text.is_empty() {
            return None;
        }

        let (command, params) = match text.find(' ') {
            Some(pos) => {
                let params = &text[pos + 1..];
                (
                    &text[..pos],
                    if params.is_empty() { None } else { Some(params) },
                )
            }
            None => (text, None),
        };

        Some(Self {
            kind: CtcpKind::parse(command),
            params,
        })
    }

    /// Check if a message body is CTCP.
    #[inline]
    pub fn is_ctcp(text: &str) -> bool {
        text.starts_with(CTCP_DELIM)
    }

    /// Create a VERSION reply.
    pub fn version_reply(version: &'a str) -> Self {
        Self {
            kind: CtcpKind::Version,
            params: Some(version),
        }
    }
}

impl fmt::Display for Ctcp<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x01{}", self.kind)?;
        if let Some(params) = self.params {
            write!(f, " {}", params)?;
        }
        write!(f, "\x01")
    }
}

/// A `DCC SEND` offer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DccSend {
    /// File name as announced by the sender (unsanitised).
    pub filename: String,
    /// Sender address, big-endian `u32`.
    pub ip: u32,
    /// Sender port; `0` means passive DCC.
    pub port: u16,
    /// Announced file size in bytes, when given.
    pub size: Option<u64>,
    /// Passive DCC token, when given.
    pub token: Option<String>,
}

impl DccSend {
    /// Parse the parameters of a `DCC` CTCP (everything after `DCC `).
    ///
    /// The first token must be `SEND`. The filename may be double-quoted
    /// when it contains spaces.
    pub fn parse(params: &str) -> Result<Self, ProtocolError> {
        let invalid = |why: &str| ProtocolError::InvalidDcc(format!("{}: {}", why, params));

        let rest = params.trim_start();
        let (sub, rest) = rest.split_once(' ').ok_or_else(|| invalid("too few fields"))?;
        if !sub.eq_ignore_ascii_case("SEND") {
            return Err(invalid("not a SEND"));
        }

        let rest = rest.trim_start();
        let (filename, rest) = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').ok_or_else(|| invalid("unterminated filename"))?;
            (&quoted[..end], &quoted[end + 1..])
        } else {
            rest.split_once(' ').ok_or_else(|| invalid("too few fields"))?
        };
        if filename.is_empty() {
            return Err(invalid("empty filename"));
        }

        let mut fields = rest.split_whitespace();
        let ip = fields
            .next()
            .and_then(parse_ip)
            .ok_or_else(|| invalid("bad address"))?;
        let port = fields
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(|| invalid("bad port"))?;
        let size = fields.next().and_then(|s| s.parse::<u64>().ok());
        let token = fields.next().map(str::to_string);

        Ok(Self {
            filename: filename.to_string(),
            ip,
            port,
            size,
            token,
        })
    }

    /// True when the sender asks us to listen (port 0).
    #[inline]
    pub fn is_passive(&self) -> bool {
        self.port == 0
    }

    /// Sender address in dotted-quad form.
    pub fn ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip)
    }

    /// Address to connect to for an active transfer.
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ipv4(), self.port)
    }
}

/// Accept the classic decimal form and, leniently, a dotted quad.
fn parse_ip(s: &str) -> Option<u32> {
    s.parse::<u32>()
        .ok()
        .or_else(|| s.parse::<Ipv4Addr>().ok().map(u32::from))
}
