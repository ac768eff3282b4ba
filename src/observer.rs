//! Fan-out of classified channel lines.
//!
//! Sessions hand every channel line to the [`Dispatcher`]. Lines that
//! classify as an XDCC event are passed, in registration order, to each
//! [`XdccObserver`] on the session's own task.

use std::sync::Arc;

use tracing::{debug, trace, warn};
use xdcc_proto::{XdccEvent, classify};

use crate::db::Database;
use crate::metrics;

/// Observer of classified XDCC events.
pub trait XdccObserver: Send + Sync {
    /// `channel` is lower-cased; `nick` is the bot that sent the line.
    fn on_event(&self, server: &str, nick: &str, channel: &str, event: &XdccEvent);
}

/// Classifies channel lines and notifies observers.
#[derive(Default, Clone)]
pub struct Dispatcher {
    observers: Vec<Arc<dyn XdccObserver>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(mut self, observer: Arc<dyn XdccObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Classify one channel line. Observers run only when it matched.
    pub fn dispatch(
        &self,
        server: &str,
        nick: &str,
        channel: &str,
        text: &str,
    ) -> Option<XdccEvent> {
        let channel = channel.to_lowercase();
        let event = classify(text, nick, &channel)?;
        for observer in &self.observers {
            observer.on_event(server, nick, &channel, &event);
        }
        Some(event)
    }
}

/// Persists packages and bot summaries.
pub struct StoreObserver {
    db: Database,
}

impl StoreObserver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl XdccObserver for StoreObserver {
    fn on_event(&self, server: &str, nick: &str, channel: &str, event: &XdccEvent) {
        let result = match event {
            XdccEvent::Package(package) => self
                .db
                .packages()
                .put(server, channel, nick, package)
                .map(drop),
            XdccEvent::Offer(summary) => self.db.offers().record_summary(server, summary).map(drop),
            XdccEvent::Bandwidth(_) => Ok(()),
        };
        if let Err(e) = result {
            warn!(server = %server, nick = %nick, channel = %channel, kind = event.kind(), error = %e, "Failed to store XDCC event");
        }
    }
}

/// Counts events and traces them.
pub struct LogObserver;

impl XdccObserver for LogObserver {
    fn on_event(&self, server: &str, nick: &str, channel: &str, event: &XdccEvent) {
        metrics::record_event(event.kind());
        match event {
            XdccEvent::Package(package) => {
                trace!(server = %server, nick = %nick, channel = %channel, slot = package.slot, size = %package.size, name = %package.name, "Package advertised");
            }
            XdccEvent::Offer(summary) => {
                trace!(server = %server, nick = %nick, channel = %channel, packs = ?summary.packs, slots_open = ?summary.slots_open, slots_max = ?summary.slots_max, "Bot summary");
            }
            XdccEvent::Bandwidth(notice) => {
                debug!(server = %server, nick = %nick, channel = %channel, current = %notice.current, "Bot bandwidth");
            }
        }
    }
}
