//! Persisted XDCC entities.
//!
//! Every type here round-trips through serde field for field. Bots and
//! packages are snapshots keyed by where they were seen; requests are keyed
//! by the offer path the user asked for.

use serde::{Deserialize, Serialize};

use crate::xdcc::OfferSummary;

/// Latest known state of an XDCC bot in one channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bot {
    pub nick: String,
    pub channel: String,
    /// Number of packs the bot advertises.
    pub package_count: u32,
    pub slots_open: u32,
    pub slots_max: u32,
    /// Record speed as printed by the bot, e.g. `1234.5kB`.
    pub record_speed: String,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub queue_size: Option<u32>,
    #[serde(default)]
    pub min_speed: Option<String>,
    #[serde(default)]
    pub max_speed: Option<String>,
    /// Seconds since the epoch.
    pub last_seen: i64,
}

impl Bot {
    /// Fresh snapshot from a single summary line.
    pub fn from_summary(summary: &OfferSummary) -> Self {
        let mut bot = Self {
            nick: summary.nick.clone(),
            channel: summary.channel.clone(),
            ..Self::default()
        };
        bot.merge(summary);
        bot
    }

    /// Overwrite the fields present in `summary`, keep the rest.
    pub fn merge(&mut self, summary: &OfferSummary) {
        if let Some(packs) = summary.packs {
            self.package_count = packs;
        }
        if let Some(open) = summary.slots_open {
            self.slots_open = open;
        }
        if let Some(max) = summary.slots_max {
            self.slots_max = max;
        }
        if let Some(record) = &summary.speed_record {
            self.record_speed = record.clone();
        }
        if summary.queue_current.is_some() {
            self.queue_position = summary.queue_current;
        }
        if summary.queue_count.is_some() {
            self.queue_size = summary.queue_count;
        }
        if summary.speed_min.is_some() {
            self.min_speed = summary.speed_min.clone();
        }
        if summary.speed_max.is_some() {
            self.max_speed = summary.speed_max.clone();
        }
        self.last_seen = summary.seen_at;
    }
}

/// One pack offered by a bot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Slot number (`#n`).
    pub slot: u32,
    pub name: String,
    /// Size as printed by the bot, not normalised.
    pub size: String,
    /// Seconds since the epoch.
    pub last_seen: i64,
}

/// Lifecycle of a download request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// `XDCC SEND` was sent, no handshake yet.
    #[default]
    Requested,
    /// Handshake received, waiting for a transfer slot.
    Queued,
    /// Bytes are flowing.
    Active,
    /// File completed under its final name.
    Done,
    /// Transfer ended in error.
    Failed,
}

impl RequestStatus {
    /// Position in the forward-only lifecycle. `Done` and `Failed` are both
    /// terminal.
    fn rank(self) -> u8 {
        match self {
            Self::Requested => 0,
            Self::Queued => 1,
            Self::Active => 2,
            Self::Done | Self::Failed => 3,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_advance_to(self, next: RequestStatus) -> bool {
        self.rank() < next.rank()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// A user-initiated download.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The offer path the user asked for, `server/channel/nick/slot`.
    pub query: String,
    /// File name once the handshake named it.
    #[serde(default)]
    pub file: Option<String>,
    pub status: RequestStatus,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub error: Option<String>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            file: None,
            status: RequestStatus::Requested,
            bytes: 0,
            error: None,
        }
    }

    /// Move to `next` if that is forward in the lifecycle. Returns whether
    /// the status changed.
    pub fn advance(&mut self, next: RequestStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

/// A search hit: storage key plus the package stored there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub path: String,
    pub package: Package,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> OfferSummary {
        OfferSummary {
            nick: "Bot".into(),
            channel: "#chan".into(),
            seen_at: 1,
            packs: Some(12),
            slots_open: Some(2),
            slots_max: Some(5),
            speed_record: Some("900.1kB".into()),
            ..OfferSummary::default()
        }
    }

    #[test]
    fn bot_roundtrips_through_json() {
        let bot = Bot::from_summary(&summary());
        let json = serde_json::to_string(&bot).unwrap();
        let back: Bot = serde_json::from_str(&json).unwrap();
        assert_eq!(bot, back);
    }

    #[test]
    fn package_roundtrips_through_json() {
        let pack = Package {
            slot: 7,
            name: "Some [Group] File.mkv".into(),
            size: "<1k".into(),
            last_seen: 42,
        };
        let json = serde_json::to_vec(&pack).unwrap();
        let back: Package = serde_json::from_slice(&json).unwrap();
        assert_eq!(pack, back);
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let mut bot = Bot::from_summary(&summary());
        let partial = OfferSummary {
            speed_min: Some("1.0kB".into()),
            seen_at: 2,
            ..OfferSummary::default()
        };
        bot.merge(&partial);
        assert_eq!(bot.package_count, 12);
        assert_eq!(bot.slots_open, 2);
        assert_eq!(bot.slots_max, 5);
        assert_eq!(bot.record_speed, "900.1kB");
        assert_eq!(bot.min_speed.as_deref(), Some("1.0kB"));
        assert_eq!(bot.last_seen, 2);
    }

    #[test]
    fn request_starts_requested() {
        let req = Request::new("S1/#c/bot/3");
        assert_eq!(req.status, RequestStatus::Requested);
        assert!(req.file.is_none());
    }

    #[test]
    fn request_lifecycle_is_forward_only() {
        let mut req = Request::new("q");
        assert!(req.advance(RequestStatus::Active));
        assert!(!req.advance(RequestStatus::Queued));
        assert!(req.advance(RequestStatus::Done));
        assert!(!req.advance(RequestStatus::Failed));
        assert_eq!(req.status, RequestStatus::Done);
        assert!(req.status.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RequestStatus::Queued).unwrap();
        assert_eq!(json, "\"queued\"");
    }
}
