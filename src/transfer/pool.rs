//! Bounded transfer pool.
//!
//! Every accepted handshake gets an id and its own task right away, then
//! waits on a semaphore permit before connecting. Each transfer's token is a
//! child of the pool's root token, so shutting the pool down cancels
//! everything in flight and everything still queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};
use xdcc_proto::DccSend;

use super::engine::{TransferControl, TransferEngine, TransferOutcome};
use crate::error::TransferError;
use crate::metrics;

/// A DCC SEND accepted for download.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Configured name of the server the handshake came from.
    pub server: String,
    /// Sender of the handshake.
    pub nick: String,
    pub offer: DccSend,
    /// Query of the request this handshake answers, if any.
    pub request: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    Queued,
    Active,
}

/// Point-in-time view of one transfer, for the API.
#[derive(Debug, Clone, Serialize)]
pub struct TransferSnapshot {
    pub id: u64,
    pub server: String,
    pub nick: String,
    pub file: String,
    pub size: Option<u64>,
    pub received: u64,
    pub state: TransferState,
    pub request: Option<String>,
}

/// Observer of transfer lifecycle events.
///
/// Called from the transfer's own task, in order: `on_queued`, then
/// `on_started` if a slot was acquired, then `on_finished` exactly once.
pub trait TransferListener: Send + Sync {
    fn on_queued(&self, _id: u64, _job: &TransferJob) {}

    fn on_started(&self, _id: u64, _job: &TransferJob) {}

    /// `received` counts bytes written before the transfer ended, whether
    /// or not it succeeded.
    fn on_finished(
        &self,
        _id: u64,
        _job: &TransferJob,
        _received: u64,
        _result: &Result<TransferOutcome, TransferError>,
    ) {
    }
}

struct TransferEntry {
    job: TransferJob,
    state: TransferState,
    control: TransferControl,
}

pub struct TransferPool {
    engine: TransferEngine,
    permits: Arc<Semaphore>,
    root: CancellationToken,
    tasks: TaskTracker,
    transfers: DashMap<u64, TransferEntry>,
    next_id: AtomicU64,
    listeners: Vec<Arc<dyn TransferListener>>,
}

impl TransferPool {
    /// Pool running at most `max_concurrent` transfers at once. `root` is
    /// the shutdown token; cancelling it cancels every transfer.
    pub fn new(
        engine: TransferEngine,
        max_concurrent: usize,
        root: CancellationToken,
        listeners: Vec<Arc<dyn TransferListener>>,
    ) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            root,
            tasks: TaskTracker::new(),
            transfers: DashMap::new(),
            next_id: AtomicU64::new(1),
            listeners,
        }
    }

    /// Queue a handshake for download. Returns the transfer id.
    pub fn submit(self: &Arc<Self>, job: TransferJob) -> Result<u64, TransferError> {
        if self.root.is_cancelled() {
            return Err(TransferError::PoolClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let control = TransferControl::new(self.root.child_token());
        self.transfers.insert(
            id,
            TransferEntry {
                job: job.clone(),
                state: TransferState::Queued,
                control: control.clone(),
            },
        );

        metrics::transfer_queued();
        for listener in &self.listeners {
            listener.on_queued(id, &job);
        }
        debug!(id, server = %job.server, nick = %job.nick, file = %job.offer.filename, "Transfer queued");

        let pool = Arc::clone(self);
        self.tasks.spawn(async move {
            pool.run(id, job, control).await;
        });
        Ok(id)
    }

    async fn run(&self, id: u64, job: TransferJob, control: TransferControl) {
        let permit = tokio::select! {
            _ = control.cancel.cancelled() => None,
            permit = Arc::clone(&self.permits).acquire_owned() => permit.ok(),
        };

        let started = permit.is_some();
        let result = match permit {
            None => Err(TransferError::Cancelled(0)),
            Some(_permit) => {
                if let Some(mut entry) = self.transfers.get_mut(&id) {
                    entry.state = TransferState::Active;
                }
                metrics::transfer_started();
                for listener in &self.listeners {
                    listener.on_started(id, &job);
                }
                self.engine.receive(&job.offer, &control).await
            }
        };

        self.transfers.remove(&id);
        let received = control.received();
        let error_code = result.as_ref().err().map(TransferError::error_code);
        metrics::transfer_finished(started, received, error_code);
        for listener in &self.listeners {
            listener.on_finished(id, &job, received, &result);
        }
    }

    /// Cancel a queued or running transfer. Returns false for unknown ids.
    pub fn cancel(&self, id: u64) -> bool {
        match self.transfers.get(&id) {
            Some(entry) => {
                info!(id, file = %entry.job.offer.filename, "Cancelling transfer");
                entry.control.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Current transfers, ordered by id.
    pub fn snapshot(&self) -> Vec<TransferSnapshot> {
        let mut transfers: Vec<TransferSnapshot> = self
            .transfers
            .iter()
            .map(|entry| TransferSnapshot {
                id: *entry.key(),
                server: entry.job.server.clone(),
                nick: entry.job.nick.clone(),
                file: entry.job.offer.filename.clone(),
                size: entry.job.offer.size,
                received: entry.control.received(),
                state: entry.state,
                request: entry.job.request.clone(),
            })
            .collect();
        transfers.sort_by_key(|t| t.id);
        transfers
    }

    /// Cancel everything and wait for every transfer task to finish.
    pub async fn shutdown(&self) {
        self.root.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        info!("Transfer pool stopped");
    }
}
