//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Order lifecycle counts
//! - Deposit detection and settlement outcomes
//! - Indexer error rates
//! - Coordinator tick latency

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

use crate::error::SwapResult;
use crate::order::{Direction, Network};
use crate::store::StatusCounts;

lazy_static! {
    // Order metrics
    pub static ref ORDERS_CREATED: CounterVec = register_counter_vec!(
        "swapd_orders_created_total",
        "Total swap orders created",
        &["direction"]
    ).unwrap();

    pub static ref ORDERS_EXPIRED: CounterVec = register_counter_vec!(
        "swapd_orders_expired_total",
        "Total orders expired without a matching deposit",
        &[]
    ).unwrap();

    pub static ref ORDERS_BY_STATUS: GaugeVec = register_gauge_vec!(
        "swapd_orders_by_status",
        "Current order count per status; a lingering processing count means orders need manual review",
        &["status"]
    ).unwrap();

    // Deposit detection metrics
    pub static ref DEPOSITS_MATCHED: CounterVec = register_counter_vec!(
        "swapd_deposits_matched_total",
        "Total deposits matched to orders",
        &["network"]
    ).unwrap();

    pub static ref OBSERVER_ERRORS: CounterVec = register_counter_vec!(
        "swapd_observer_errors_total",
        "Total failed or timed-out indexer queries",
        &["network"]
    ).unwrap();

    pub static ref MANUAL_CONFIRMATIONS: CounterVec = register_counter_vec!(
        "swapd_manual_confirmations_total",
        "Total deposits confirmed through the manual override endpoint",
        &[]
    ).unwrap();

    // Settlement metrics
    pub static ref SETTLEMENTS_CLAIMED: CounterVec = register_counter_vec!(
        "swapd_settlements_claimed_total",
        "Total settlement claims won",
        &["network"]
    ).unwrap();

    pub static ref SETTLEMENTS_COMPLETED: CounterVec = register_counter_vec!(
        "swapd_settlements_completed_total",
        "Total settlements completed",
        &["network"]
    ).unwrap();

    pub static ref SETTLEMENTS_FAILED: CounterVec = register_counter_vec!(
        "swapd_settlements_failed_total",
        "Total settlements that failed after the processing claim",
        &["network"]
    ).unwrap();

    // Coordinator metrics
    pub static ref TICK_DURATION: HistogramVec = register_histogram_vec!(
        "swapd_tick_duration_seconds",
        "Coordinator tick duration",
        &[],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> SwapResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::SwapError::Config(format!("metrics bind: {}", e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::SwapError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

// Helper functions to record metrics

pub fn record_order_created(direction: Direction) {
    ORDERS_CREATED
        .with_label_values(&[direction.as_str()])
        .inc();
}

pub fn record_orders_expired(count: u64) {
    ORDERS_EXPIRED.with_label_values(&[]).inc_by(count as f64);
}

pub fn record_status_counts(counts: &StatusCounts) {
    ORDERS_BY_STATUS
        .with_label_values(&["pending"])
        .set(counts.pending as f64);
    ORDERS_BY_STATUS
        .with_label_values(&["deposited"])
        .set(counts.deposited as f64);
    ORDERS_BY_STATUS
        .with_label_values(&["processing"])
        .set(counts.processing as f64);
    ORDERS_BY_STATUS
        .with_label_values(&["completed"])
        .set(counts.completed as f64);
    ORDERS_BY_STATUS
        .with_label_values(&["expired"])
        .set(counts.expired as f64);
}

pub fn record_deposit_matched(network: Network) {
    DEPOSITS_MATCHED
        .with_label_values(&[&network.to_string()])
        .inc();
}

pub fn record_observer_error(network: Network) {
    OBSERVER_ERRORS
        .with_label_values(&[&network.to_string()])
        .inc();
}

pub fn record_manual_confirmation() {
    MANUAL_CONFIRMATIONS.with_label_values(&[]).inc();
}

pub fn record_settlement_claimed(network: Network) {
    SETTLEMENTS_CLAIMED
        .with_label_values(&[&network.to_string()])
        .inc();
}

pub fn record_settlement_completed(network: Network) {
    SETTLEMENTS_COMPLETED
        .with_label_values(&[&network.to_string()])
        .inc();
}

pub fn observe_tick_duration(seconds: f64) {
    TICK_DURATION.with_label_values(&[]).observe(seconds);
}

pub fn record_settlement_failed(network: Network) {
    SETTLEMENTS_FAILED
        .with_label_values(&[&network.to_string()])
        .inc();
}
