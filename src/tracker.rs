//! Download requests and their correlation with incoming DCC handshakes.
//!
//! Asking for a pack records the request under `(server, nick)` before the
//! `XDCC SEND` goes out. The next DCC SEND from that nick on that server
//! claims it, and the transfer pool's lifecycle events move the stored
//! request forward: Queued, Active, then Done or Failed.
//!
//! A request nobody answers within the pending TTL is dropped from the
//! correlation table and stored as Failed, so a later handshake from the
//! same nick is not credited to it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};
use xdcc_proto::{PackPath, Request, RequestStatus};

use crate::db::{Database, StoreError};
use crate::error::{RequestError, TransferError};
use crate::metrics;
use crate::network::SessionRegistry;
use crate::transfer::{TransferJob, TransferListener, TransferOutcome, sanitize_file_name};

/// How long a request waits for its DCC SEND before it is given up.
pub const DEFAULT_PENDING_TTL: Duration = Duration::from_secs(60 * 60);

struct Pending {
    query: String,
    requested_at: Instant,
}

pub struct RequestTracker {
    registry: Arc<SessionRegistry>,
    db: Database,
    /// Queries waiting for a handshake, keyed by server and lower-cased nick.
    pending: DashMap<(String, String), VecDeque<Pending>>,
    pending_ttl: Duration,
}

impl RequestTracker {
    pub fn new(registry: Arc<SessionRegistry>, db: Database) -> Self {
        Self {
            registry,
            db,
            pending: DashMap::new(),
            pending_ttl: DEFAULT_PENDING_TTL,
        }
    }

    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Ask the bot named in `query` (`server/channel/nick/slot`) for its
    /// pack.
    ///
    /// The returned request is already stored with status `Requested`. A
    /// failed send leaves it stored as `Failed`.
    pub async fn request_package(&self, query: &str) -> Result<Request, RequestError> {
        let path: PackPath = query.parse()?;
        let session = self
            .registry
            .get(&path.server)
            .ok_or_else(|| RequestError::UnknownServer(path.server.clone()))?;

        let mut request = Request::new(query);
        self.db.requests().put(&request)?;
        let key = correlation_key(&path.server, &path.nick);
        {
            // Asking again replaces the earlier entry for the same query.
            let mut queue = self.pending.entry(key.clone()).or_default();
            queue.retain(|p| p.query != query);
            queue.push_back(Pending {
                query: query.to_string(),
                requested_at: Instant::now(),
            });
        }

        if let Err(e) = session.send_message(&path.nick, &path.send_command()).await {
            self.forget(&key, query);
            metrics::record_request("failed");
            request.advance(RequestStatus::Failed);
            request.error = Some(e.to_string());
            self.db.requests().put(&request)?;
            return Err(e.into());
        }

        metrics::record_request("sent");
        info!(server = %path.server, nick = %path.nick, slot = path.slot, "Requested pack");
        Ok(request)
    }

    /// Take the oldest unexpired request waiting on `nick` at `server`.
    /// Expired requests met on the way are dropped and stored as Failed.
    pub fn claim(&self, server: &str, nick: &str) -> Option<String> {
        let key = correlation_key(server, nick);
        let mut expired = Vec::new();
        let claimed = {
            let mut queue = self.pending.get_mut(&key)?;
            let mut claimed = None;
            while let Some(entry) = queue.pop_front() {
                if entry.requested_at.elapsed() >= self.pending_ttl {
                    expired.push(entry.query);
                } else {
                    claimed = Some(entry.query);
                    break;
                }
            }
            claimed
        };
        self.pending.remove_if(&key, |_, q| q.is_empty());

        for query in expired {
            self.expire(&query);
        }
        claimed
    }

    /// Number of requests still waiting for a handshake.
    pub fn pending(&self) -> usize {
        self.pending
            .iter()
            .map(|entry| {
                entry
                    .value()
                    .iter()
                    .filter(|p| p.requested_at.elapsed() < self.pending_ttl)
                    .count()
            })
            .sum()
    }

    fn forget(&self, key: &(String, String), query: &str) {
        if let Some(mut queue) = self.pending.get_mut(key) {
            queue.retain(|p| p.query != query);
        }
        self.pending.remove_if(key, |_, q| q.is_empty());
    }

    fn expire(&self, query: &str) {
        debug!(query = %query, "Request expired without a DCC offer");
        let secs = self.pending_ttl.as_secs();
        self.update(query, |request| {
            if request.status == RequestStatus::Requested && request.advance(RequestStatus::Failed) {
                request.error = Some(format!("no DCC offer within {}s", secs));
            }
        });
    }

    /// Load, change and store the request for `query`. Storage failures are
    /// logged; they must not disturb the transfer.
    fn update(&self, query: &str, change: impl FnOnce(&mut Request)) {
        if let Err(e) = self.try_update(query, change) {
            warn!(query = %query, error = %e, "Failed to store request update");
        }
    }

    fn try_update(
        &self,
        query: &str,
        change: impl FnOnce(&mut Request),
    ) -> Result<(), StoreError> {
        let requests = self.db.requests();
        let mut request = requests
            .get(query)?
            .unwrap_or_else(|| Request::new(query));
        change(&mut request);
        requests.put(&request)
    }
}

impl TransferListener for RequestTracker {
    fn on_queued(&self, _id: u64, job: &TransferJob) {
        if let Some(query) = &job.request {
            self.update(query, |request| {
                request.advance(RequestStatus::Queued);
            });
        }
    }

    fn on_started(&self, _id: u64, job: &TransferJob) {
        if let Some(query) = &job.request {
            let file = sanitize_file_name(&job.offer.filename)
                .unwrap_or_else(|_| job.offer.filename.clone());
            self.update(query, |request| {
                if request.advance(RequestStatus::Active) {
                    request.file = Some(file);
                }
            });
        }
    }

    fn on_finished(
        &self,
        _id: u64,
        job: &TransferJob,
        received: u64,
        result: &Result<TransferOutcome, TransferError>,
    ) {
        let Some(query) = &job.request else {
            return;
        };
        self.update(query, |request| match result {
            Ok(outcome) => {
                if request.advance(RequestStatus::Done) {
                    request.bytes = outcome.bytes;
                    request.error = None;
                    if let Some(name) = outcome.path.file_name() {
                        request.file = Some(name.to_string_lossy().into_owned());
                    }
                }
            }
            Err(e) => {
                if request.advance(RequestStatus::Failed) {
                    request.bytes = received;
                    request.error = Some(e.to_string());
                }
            }
        });
    }
}

fn correlation_key(server: &str, nick: &str) -> (String, String) {
    (server.to_string(), nick.to_lowercase())
}
