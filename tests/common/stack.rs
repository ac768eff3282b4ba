//! A full daemon stack over a temporary directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use downer::db::Database;
use downer::network::{SessionContext, SessionRegistry};
use downer::observer::{Dispatcher, StoreObserver};
use downer::tracker::RequestTracker;
use downer::transfer::{TransferEngine, TransferListener, TransferOptions, TransferPool};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub struct TestStack {
    pub db: Database,
    pub registry: Arc<SessionRegistry>,
    pub tracker: Arc<RequestTracker>,
    pub pool: Arc<TransferPool>,
    pub dispatcher: Dispatcher,
    pub shutdown: CancellationToken,
    pub downloads: PathBuf,
    _dir: TempDir,
}

impl TestStack {
    pub fn new() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let downloads = dir.path().join("downloads");
        let db = Database::open(dir.path().join("downer.redb"))?;
        let shutdown = CancellationToken::new();
        let registry = Arc::new(SessionRegistry::new());
        let tracker = Arc::new(RequestTracker::new(Arc::clone(&registry), db.clone()));
        let engine = TransferEngine::new(TransferOptions {
            download_dir: downloads.clone(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            send_acks: true,
        });
        let pool = Arc::new(TransferPool::new(
            engine,
            2,
            shutdown.child_token(),
            vec![Arc::clone(&tracker) as Arc<dyn TransferListener>],
        ));
        let dispatcher = Dispatcher::new().with_observer(Arc::new(StoreObserver::new(db.clone())));

        Ok(Self {
            db,
            registry,
            tracker,
            pool,
            dispatcher,
            shutdown,
            downloads,
            _dir: dir,
        })
    }

    #[allow(dead_code)]
    pub fn context(&self) -> Arc<SessionContext> {
        Arc::new(SessionContext {
            dispatcher: self.dispatcher.clone(),
            tracker: Arc::clone(&self.tracker),
            pool: Arc::clone(&self.pool),
            registry: Arc::clone(&self.registry),
        })
    }
}
