//! Prometheus metrics collection for downer.
//!
//! - `xdcc_events_total{kind}` - classified channel lines by event kind
//! - `dcc_transfers_*` - transfer lifecycle counters and gauges
//! - `irc_connected_servers` - sessions currently registered

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Channel lines classified, by event kind.
pub static XDCC_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Transfers that acquired a slot and started connecting.
pub static TRANSFERS_STARTED: OnceLock<IntCounter> = OnceLock::new();

/// Transfers that finished under their final name.
pub static TRANSFERS_COMPLETED: OnceLock<IntCounter> = OnceLock::new();

/// Failed transfers, by error code.
pub static TRANSFERS_FAILED: OnceLock<IntCounterVec> = OnceLock::new();

/// Bytes received over DCC.
pub static TRANSFER_BYTES: OnceLock<IntCounter> = OnceLock::new();

/// Download requests sent, by outcome.
pub static REQUESTS_SENT: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Transfers currently receiving.
pub static ACTIVE_TRANSFERS: OnceLock<IntGauge> = OnceLock::new();

/// Handshakes waiting for a transfer slot.
pub static QUEUED_TRANSFERS: OnceLock<IntGauge> = OnceLock::new();

/// IRC sessions currently registered.
pub static CONNECTED_SERVERS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                let m = $init.expect(concat!(stringify!($metric), " creation failed"));
                if let Err(e) = r.register(Box::new(m.clone())) {
                    tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                }
                let _ = $metric.set(m);
            }
        };
    }

    register!(XDCC_EVENTS, IntCounterVec::new(Opts::new("xdcc_events_total", "Channel lines classified by event kind"), &["kind"]));
    register!(TRANSFERS_STARTED, IntCounter::new("dcc_transfers_started_total", "DCC transfers started"));
    register!(TRANSFERS_COMPLETED, IntCounter::new("dcc_transfers_completed_total", "DCC transfers completed"));
    register!(TRANSFERS_FAILED, IntCounterVec::new(Opts::new("dcc_transfers_failed_total", "DCC transfers failed by error"), &["error"]));
    register!(TRANSFER_BYTES, IntCounter::new("dcc_transfer_bytes_total", "Bytes received over DCC"));
    register!(REQUESTS_SENT, IntCounterVec::new(Opts::new("xdcc_requests_total", "XDCC SEND requests by outcome"), &["outcome"]));
    register!(ACTIVE_TRANSFERS, IntGauge::new("dcc_transfers_active", "DCC transfers currently receiving"));
    register!(QUEUED_TRANSFERS, IntGauge::new("dcc_transfers_queued", "DCC handshakes waiting for a slot"));
    register!(CONNECTED_SERVERS, IntGauge::new("irc_connected_servers", "Registered IRC sessions"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn get_counter(metric: &OnceLock<IntCounter>) -> Option<&IntCounter> {
    metric.get()
}

fn get_counter_vec(metric: &OnceLock<IntCounterVec>) -> Option<&IntCounterVec> {
    metric.get()
}

fn get_gauge(metric: &OnceLock<IntGauge>) -> Option<&IntGauge> {
    metric.get()
}

#[inline]
pub fn record_event(kind: &str) {
    if let Some(c) = get_counter_vec(&XDCC_EVENTS) {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn record_request(outcome: &str) {
    if let Some(c) = get_counter_vec(&REQUESTS_SENT) {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn transfer_queued() {
    if let Some(g) = get_gauge(&QUEUED_TRANSFERS) {
        g.inc();
    }
}

/// A queued transfer got its slot.
#[inline]
pub fn transfer_started() {
    if let Some(g) = get_gauge(&QUEUED_TRANSFERS) {
        g.dec();
    }
    if let Some(g) = get_gauge(&ACTIVE_TRANSFERS) {
        g.inc();
    }
    if let Some(c) = get_counter(&TRANSFERS_STARTED) {
        c.inc();
    }
}

/// A transfer left the pool. `started` is false when it never got a slot.
#[inline]
pub fn transfer_finished(started: bool, bytes: u64, error: Option<&str>) {
    let gauge = if started {
        &ACTIVE_TRANSFERS
    } else {
        &QUEUED_TRANSFERS
    };
    if let Some(g) = get_gauge(gauge) {
        g.dec();
    }
    if let Some(c) = get_counter(&TRANSFER_BYTES) {
        c.inc_by(bytes);
    }
    match error {
        None => {
            if let Some(c) = get_counter(&TRANSFERS_COMPLETED) {
                c.inc();
            }
        }
        Some(code) => {
            if let Some(c) = get_counter_vec(&TRANSFERS_FAILED) {
                c.with_label_values(&[code]).inc();
            }
        }
    }
}

#[inline]
pub fn server_connected() {
    if let Some(g) = get_gauge(&CONNECTED_SERVERS) {
        g.inc();
    }
}

#[inline]
pub fn server_disconnected() {
    if let Some(g) = get_gauge(&CONNECTED_SERVERS) {
        g.dec();
    }
}
