//! Bot snapshots, one per (server, channel, nick).

use redb::{ReadableDatabase, ReadableTable};
use serde::Serialize;
use tracing::debug;
use xdcc_proto::{Bot, OfferSummary, path::bot_key};

use super::{OFFERS, StoreError, decode, encode};

/// A stored bot together with its key.
#[derive(Debug, Clone, Serialize)]
pub struct BotRecord {
    pub path: String,
    pub bot: Bot,
}

/// Repository for bot snapshots.
pub struct OfferRepository<'a> {
    db: &'a redb::Database,
}

impl<'a> OfferRepository<'a> {
    pub fn new(db: &'a redb::Database) -> Self {
        Self { db }
    }

    /// Fold a summary line into the stored snapshot of its bot.
    ///
    /// Fields missing from the summary keep their stored value; `last_seen`
    /// always moves forward to the summary's timestamp.
    pub fn record_summary(&self, server: &str, summary: &OfferSummary) -> Result<Bot, StoreError> {
        let key = bot_key(server, &summary.channel, &summary.nick);

        let write_txn = self.db.begin_write()?;
        let bot = {
            let mut table = write_txn.open_table(OFFERS)?;
            let existing: Option<Bot> = match table.get(key.as_str())? {
                Some(value) => Some(decode(value.value())?),
                None => None,
            };
            let bot = match existing {
                Some(mut bot) => {
                    bot.merge(summary);
                    bot
                }
                None => Bot::from_summary(summary),
            };
            let value = encode(&bot)?;
            table.insert(key.as_str(), value.as_slice())?;
            bot
        };
        write_txn.commit()?;

        debug!(key = %key, packs = bot.package_count, "Stored bot summary");
        Ok(bot)
    }

    /// Replace a snapshot wholesale.
    pub fn put(&self, key: &str, bot: &Bot) -> Result<(), StoreError> {
        let value = encode(bot)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OFFERS)?;
            table.insert(key, value.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Bot>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OFFERS)?;
        match table.get(key)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// All bots, ordered by key.
    pub fn list(&self) -> Result<Vec<BotRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OFFERS)?;

        let mut bots = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            bots.push(BotRecord {
                path: key.value().to_string(),
                bot: decode(value.value())?,
            });
        }
        Ok(bots)
    }
}
