//! XDCC channel line classification.
//!
//! Bots announce themselves with three kinds of lines, recognised in this
//! order (first match wins):
//!
//! ```text
//! #1   23x [1.4G] Some.File.mkv                      -> pack advertisement
//! ** Bandwidth Usage ** Current: 12.3kB/s, ...       -> bandwidth notice
//! ** 4 packs **  1 of 10 slots open, Record: 9.1kB/s -> offer summary
//! ```
//!
//! Control bytes are stripped first. Anything else classifies to `None`.

use std::sync::OnceLock;

use regex::Regex;

use crate::colors::strip_control;
use crate::model::Package;

/// A classified channel line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XdccEvent {
    /// `#<slot> <gets>x [<size>] <name>`
    Package(Package),
    /// Pack/slot/queue/speed summary. Any subset of fields may be present.
    Offer(OfferSummary),
    /// Current bandwidth usage.
    Bandwidth(BandwidthNotice),
}

impl XdccEvent {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Package(_) => "package",
            Self::Offer(_) => "offer",
            Self::Bandwidth(_) => "bandwidth",
        }
    }
}

/// Fields found in an offer summary line. Absent fields are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OfferSummary {
    pub nick: String,
    pub channel: String,
    pub packs: Option<u32>,
    pub slots_open: Option<u32>,
    pub slots_max: Option<u32>,
    pub queue_current: Option<u32>,
    pub queue_count: Option<u32>,
    pub speed_min: Option<String>,
    pub speed_max: Option<String>,
    pub speed_record: Option<String>,
    /// Seconds since the epoch.
    pub seen_at: i64,
}

/// `** Bandwidth Usage ** Current: <speed>/s`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BandwidthNotice {
    pub nick: String,
    pub current: String,
}

fn package_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"#(\d+).+?\d+x \[ *(<?\d+.*?)\] +(.*)$").expect("package pattern is valid")
    })
}

fn bandwidth_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\*\* Bandwidth Usage \*\* Current: (\d{1,5}\.\d{1,2}[KkMm][bB])/s")
            .expect("bandwidth pattern is valid")
    })
}

fn offer_re() -> &'static Regex {
    const SPEED: &str = r"\d{1,5}\.\d{1,2}[KkMm][bB]";
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = [
            r"\*\* (?P<packs>\d{1,5}) packs".to_string(),
            format!(r"Min: (?P<speed_min>{SPEED})/s"),
            r"(?P<slots_open>\d{1,3}) of (?P<slots_max>\d{1,3}) slots open".to_string(),
            r"[Qq]ueue: (?P<queue_current>\d{1,4})/(?P<queue_count>\d{1,4})".to_string(),
            format!(r"Max: (?P<speed_max>{SPEED})/s"),
            format!(r"Record: (?P<speed_record>{SPEED})/s"),
        ]
        .join("|");
        Regex::new(&pattern).expect("offer pattern is valid")
    })
}

/// Classify a channel line, stamping events with the current time.
pub fn classify(line: &str, nick: &str, channel: &str) -> Option<XdccEvent> {
    classify_at(line, nick, channel, chrono::Utc::now().timestamp())
}

/// Classify a channel line, stamping events with `now`.
pub fn classify_at(line: &str, nick: &str, channel: &str, now: i64) -> Option<XdccEvent> {
    let text = strip_control(line);

    if let Some(caps) = package_re().captures(&text) {
        // Oversized slot numbers degrade to 0 rather than dropping the line.
        let slot = caps[1].parse::<u32>().unwrap_or(0);
        return Some(XdccEvent::Package(Package {
            slot,
            size: caps[2].to_string(),
            name: caps[3].to_string(),
            last_seen: now,
        }));
    }

    if let Some(caps) = bandwidth_re().captures(&text) {
        return Some(XdccEvent::Bandwidth(BandwidthNotice {
            nick: nick.to_string(),
            current: caps[1].to_string(),
        }));
    }

    scan_offer(&text, nick, channel, now).map(XdccEvent::Offer)
}

fn scan_offer(text: &str, nick: &str, channel: &str, now: i64) -> Option<OfferSummary> {
    let mut summary = OfferSummary {
        nick: nick.to_string(),
        channel: channel.to_string(),
        seen_at: now,
        ..OfferSummary::default()
    };
    let mut found = false;

    let number = |caps: &regex::Captures<'_>, name: &str| {
        caps.name(name).map(|m| m.as_str().parse::<u32>().unwrap_or(0))
    };
    let text_of = |caps: &regex::Captures<'_>, name: &str| caps.name(name).map(|m| m.as_str().to_string());

    for caps in offer_re().captures_iter(text) {
        found = true;
        if let Some(v) = number(&caps, "packs") {
            summary.packs = Some(v);
        }
        if let Some(v) = number(&caps, "slots_open") {
            summary.slots_open = Some(v);
        }
        if let Some(v) = number(&caps, "slots_max") {
            summary.slots_max = Some(v);
        }
        if let Some(v) = number(&caps, "queue_current") {
            summary.queue_current = Some(v);
        }
        if let Some(v) = number(&caps, "queue_count") {
            summary.queue_count = Some(v);
        }
        if let Some(v) = text_of(&caps, "speed_min") {
            summary.speed_min = Some(v);
        }
        if let Some(v) = text_of(&caps, "speed_max") {
            summary.speed_max = Some(v);
        }
        if let Some(v) = text_of(&caps, "speed_record") {
            summary.speed_record = Some(v);
        }
    }

    found.then_some(summary)
}
