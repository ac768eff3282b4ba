//! downer - XDCC offer harvester and DCC downloader.
//!
//! Joins the configured IRC channels, records what XDCC bots offer and
//! downloads packs requested through the HTTP API.

use std::sync::Arc;

use downer::config::{self, Config};
use downer::db::Database;
use downer::http::{self, AppState};
use downer::metrics;
use downer::network::{Session, SessionContext, SessionRegistry};
use downer::observer::{Dispatcher, LogObserver, StoreObserver};
use downer::tracker::RequestTracker;
use downer::transfer::{TransferEngine, TransferListener, TransferOptions, TransferPool};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(path = %config_path, "{}", e);
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        servers = config.xdcc.len(),
        download_dir = %config.transfer.download_dir.display(),
        "Starting downer"
    );

    let config = Arc::new(config);
    let db = Database::open(&config.database.path)?;

    if config.http.metrics {
        metrics::init();
        info!("Metrics initialized");
    }

    let shutdown = CancellationToken::new();
    let registry = Arc::new(SessionRegistry::new());
    let tracker = Arc::new(RequestTracker::new(Arc::clone(&registry), db.clone()));

    let engine = TransferEngine::new(TransferOptions::from(&config.transfer));
    let pool = Arc::new(TransferPool::new(
        engine,
        config.transfer.max_concurrent,
        shutdown.child_token(),
        vec![Arc::clone(&tracker) as Arc<dyn TransferListener>],
    ));

    let dispatcher = Dispatcher::new()
        .with_observer(Arc::new(StoreObserver::new(db.clone())))
        .with_observer(Arc::new(LogObserver));

    let ctx = Arc::new(SessionContext {
        dispatcher,
        tracker: Arc::clone(&tracker),
        pool: Arc::clone(&pool),
        registry: Arc::clone(&registry),
    });

    let mut sessions = Vec::new();
    for (name, server) in &config.xdcc {
        info!(server = %name, addr = %server.server, channels = ?server.channels, "Starting IRC session");
        let session = Session::new(name, server.clone(), Arc::clone(&ctx), shutdown.child_token());
        sessions.push(session.spawn());
    }

    let http_task = {
        let state = AppState {
            db: db.clone(),
            tracker: Arc::clone(&tracker),
            pool: Arc::clone(&pool),
            config: Arc::clone(&config),
        };
        let addr = config.http.address;
        let token = shutdown.child_token();
        tokio::spawn(async move {
            http::run_http_server(addr, state, token).await;
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    pool.shutdown().await;
    for session in sessions {
        if let Err(e) = session.await {
            warn!(error = %e, "IRC session task failed");
        }
    }
    if let Err(e) = http_task.await {
        warn!(error = %e, "HTTP task failed");
    }

    info!("downer stopped");
    Ok(())
}
