//! IRC line parsing and construction.
//!
//! Only the subset a harvesting client needs: optional tags (skipped),
//! optional prefix, command, and parameters including the trailing one.
//!
//! ```text
//! [@tags] [:prefix] <command> [params...] [:trailing]
//! ```

use std::fmt;
use std::str::FromStr;

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::error::{MessageParseError, ProtocolError};

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Parse the command name (1*letter or 3digit).
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_alphanumeric())(input)?;

    let is_all_letters = cmd.chars().all(|c| c.is_ascii_alphabetic());
    let is_three_digits = cmd.len() == 3 && cmd.chars().all(|c| c.is_ascii_digit());

    if is_all_letters || is_three_digits {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Split the parameter list. Consecutive spaces collapse; a `:` starts the
/// trailing parameter which runs to the end of the line.
fn parse_params(input: &str) -> SmallVec<[&str; 15]> {
    let mut params: SmallVec<[&str; 15]> = SmallVec::new();
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        if params.len() >= 15 {
            break;
        }

        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }

        if rest.is_empty() || rest.starts_with('\r') || rest.starts_with('\n') {
            break;
        }

        if let Some(b':') = rest.as_bytes().first().copied() {
            let after_colon = &rest[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        let param = &rest[..end];
        if param.is_empty() {
            break;
        }
        params.push(param);
        rest = &rest[end..];
    }

    params
}

struct RawMessage<'a> {
    prefix: Option<&'a str>,
    command: &'a str,
    params: SmallVec<[&'a str; 15]>,
}

fn parse_message(input: &str) -> IResult<&str, RawMessage<'_>> {
    let (input, _tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let params = parse_params(input);

    Ok((
        "",
        RawMessage {
            prefix,
            command,
            params,
        },
    ))
}

/// An owned IRC message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message (`nick!user@host` or a server name).
    pub prefix: Option<String>,
    /// Command word or three-digit numeric, upper-cased.
    pub command: String,
    /// Parameters, trailing parameter last.
    pub params: Vec<String>,
}

impl Message {
    /// Build a message without prefix.
    pub fn new(command: &str, params: &[&str]) -> Self {
        Self {
            prefix: None,
            command: command.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// `PRIVMSG <target> :<text>`
    pub fn privmsg(target: &str, text: &str) -> Self {
        Self::new("PRIVMSG", &[target, text])
    }

    /// `NICK <nick>`
    pub fn nick(nick: &str) -> Self {
        Self::new("NICK", &[nick])
    }

    /// `USER <user> 0 * :<realname>`
    pub fn user(user: &str, realname: &str) -> Self {
        Self::new("USER", &[user, "0", "*", realname])
    }

    /// `JOIN <channel>`
    pub fn join(channel: &str) -> Self {
        Self::new("JOIN", &[channel])
    }

    /// `PING :<token>`
    pub fn ping(token: &str) -> Self {
        Self::new("PING", &[token])
    }

    /// `PONG :<token>`
    pub fn pong(token: &str) -> Self {
        Self::new("PONG", &[token])
    }

    /// `QUIT :<reason>`
    pub fn quit(reason: &str) -> Self {
        Self::new("QUIT", &[reason])
    }

    /// Nickname part of the prefix, if any.
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let end = prefix.find(['!', '@']).unwrap_or(prefix.len());
        let nick = &prefix[..end];
        if nick.is_empty() {
            None
        } else {
            Some(nick)
        }
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter, which for PRIVMSG/NOTICE is the text body.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_string(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        match parse_message(line) {
            Ok((_, raw)) => Ok(Self {
                prefix: raw.prefix.map(str::to_string),
                command: raw.command.to_ascii_uppercase(),
                params: raw.params.iter().map(|p| p.to_string()).collect(),
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(ProtocolError::InvalidMessage {
                    string: s.to_string(),
                    cause: MessageParseError::InvalidCommand {
                        position: line.len() - e.input.len(),
                    },
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(ProtocolError::InvalidMessage {
                string: s.to_string(),
                cause: MessageParseError::InvalidCommand {
                    position: line.len(),
                },
            }),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;

        let count = self.params.len();
        for (i, param) in self.params.iter().enumerate() {
            let last = i + 1 == count;
            if last && (param.is_empty() || param.contains(' ') || param.starts_with(':')) {
                write!(f, " :{}", param)?;
            } else {
                write!(f, " {}", param)?;
            }
        }
        Ok(())
    }
}
