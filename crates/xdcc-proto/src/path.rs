//! Offer paths: `server/channel/nick/slot`.
//!
//! The same string is the storage key of a package, the body of a download
//! request and the identity of the resulting [`Request`](crate::Request).

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// A parsed `server/channel/nick/slot` path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PackPath {
    pub server: String,
    pub channel: String,
    pub nick: String,
    pub slot: u32,
}

impl PackPath {
    pub fn new(server: &str, channel: &str, nick: &str, slot: u32) -> Self {
        Self {
            server: server.to_string(),
            channel: channel.to_string(),
            nick: nick.to_string(),
            slot,
        }
    }

    /// Key of the bot owning this pack.
    pub fn bot_key(&self) -> String {
        bot_key(&self.server, &self.channel, &self.nick)
    }

    /// The `XDCC SEND` command asking the bot for this pack.
    pub fn send_command(&self) -> String {
        format!("XDCC SEND #{}", self.slot)
    }
}

/// Storage key of a bot.
pub fn bot_key(server: &str, channel: &str, nick: &str) -> String {
    format!("{}/{}/{}", server, channel, nick)
}

/// Storage key of a package.
pub fn package_key(server: &str, channel: &str, nick: &str, slot: u32) -> String {
    format!("{}/{}/{}/{}", server, channel, nick, slot)
}

impl FromStr for PackPath {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ProtocolError::InvalidPath {
            path: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.split('/').collect();
        let [server, channel, nick, slot] = parts.as_slice() else {
            return Err(invalid("expected server/channel/nick/slot"));
        };
        if server.is_empty() || channel.is_empty() || nick.is_empty() {
            return Err(invalid("empty segment"));
        }
        let slot = slot
            .trim_start_matches('#')
            .parse::<u32>()
            .map_err(|_| invalid("slot is not a number"))?;

        Ok(Self::new(server, channel, nick, slot))
    }
}

impl fmt::Display for PackPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            package_key(&self.server, &self.channel, &self.nick, self.slot)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let path: PackPath = "irc.example.net/#movies/Bot|01/3".parse().unwrap();
        assert_eq!(path.server, "irc.example.net");
        assert_eq!(path.channel, "#movies");
        assert_eq!(path.nick, "Bot|01");
        assert_eq!(path.slot, 3);
        assert_eq!(path.to_string(), "irc.example.net/#movies/Bot|01/3");
        assert_eq!(path.bot_key(), "irc.example.net/#movies/Bot|01");
    }

    #[test]
    fn hash_prefixed_slot_is_accepted() {
        let path: PackPath = "S1/C/bot/#12".parse().unwrap();
        assert_eq!(path.slot, 12);
        assert_eq!(path.send_command(), "XDCC SEND #12");
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!("S1/C/bot".parse::<PackPath>().is_err());
        assert!("S1/C/bot/3/extra".parse::<PackPath>().is_err());
        assert!("S1//bot/3".parse::<PackPath>().is_err());
        assert!("S1/C/bot/x".parse::<PackPath>().is_err());
    }
}
