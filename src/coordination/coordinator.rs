//! Swap coordinator - drives every order through detect, claim, settle
//!
//! The loop itself holds no order state. Ticks may overlap with concurrent
//! runs or a restart mid-settlement; every transition is a store-side
//! compare-and-set, so duplicated work collapses to one winner and losing a
//! race is a non-event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, error, info, warn};

use super::matching;
use crate::chain::ChainObserver;
use crate::config::Settings;
use crate::error::{SwapError, SwapResult};
use crate::metrics;
use crate::order::{Network, Order, OrderStatus};
use crate::settle::SettlementSender;
use crate::store::OrderStore;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Tick cadence
    pub poll_interval: Duration,
    /// Bound on each indexer query and each outbound send, so one hung
    /// external call cannot stall unrelated orders past the tick
    pub call_timeout: Duration,
    /// Absolute deposit-match tolerance in ETH
    pub eth_tolerance: f64,
    /// Absolute deposit-match tolerance in ADA
    pub ada_tolerance: f64,
}

impl CoordinatorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            poll_interval: Duration::from_secs(settings.service.poll_interval_secs),
            call_timeout: Duration::from_secs(settings.service.external_call_timeout_secs),
            eth_tolerance: settings.eth.amount_tolerance,
            ada_tolerance: settings.ada.amount_tolerance,
        }
    }

    fn tolerance(&self, network: Network) -> f64 {
        match network {
            Network::Ethereum => self.eth_tolerance,
            Network::Cardano => self.ada_tolerance,
        }
    }
}

/// Orchestrates deposit detection and settlement across both networks
pub struct SwapCoordinator {
    store: Arc<dyn OrderStore>,
    observers: HashMap<Network, Arc<dyn ChainObserver>>,
    senders: HashMap<Network, Arc<dyn SettlementSender>>,
    config: CoordinatorConfig,
    shutdown: Arc<RwLock<bool>>,
}

impl SwapCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        observers: HashMap<Network, Arc<dyn ChainObserver>>,
        senders: HashMap<Network, Arc<dyn SettlementSender>>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            observers,
            senders,
            config,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Main coordination loop. Ticks run back-to-back on a fixed interval;
    /// a slow tick delays the next rather than overlapping it, though the
    /// store contract would tolerate overlap too.
    pub async fn run(&self) -> SwapResult<()> {
        let mut tick_interval = interval(self.config.poll_interval);

        info!("Swap coordinator started");

        loop {
            tick_interval.tick().await;

            if *self.shutdown.read().await {
                break;
            }

            let started = Instant::now();
            if let Err(e) = self.tick(Utc::now()).await {
                error!("Coordinator tick failed: {}", e);
            }
            metrics::observe_tick_duration(started.elapsed().as_secs_f64());
        }

        info!("Swap coordinator stopped");
        Ok(())
    }

    /// One pass over all active orders. Public so tests can drive the
    /// coordinator with a manually advanced clock.
    pub async fn tick(&self, now: DateTime<Utc>) -> SwapResult<()> {
        let expired = self.store.expire_stale(now).await?;
        if expired > 0 {
            info!("Expired {} stale orders", expired);
            metrics::record_orders_expired(expired);
        }

        let active = self.store.list_active(now).await?;
        debug!("Processing {} active orders", active.len());

        let (pending, settleable): (Vec<&Order>, Vec<&Order>) = active
            .iter()
            .partition(|order| order.status == OrderStatus::Pending);

        // Deposit scans run one at a time in creation order: when two orders
        // with overlapping tolerance windows could match the same transfer,
        // the earliest-created order claims it and the later scan sees the
        // ref as taken. Each external call is individually timeout-bounded.
        for order in pending {
            self.check_deposit(order).await;
        }

        // Settlements touch disjoint orders and can run concurrently.
        let work = settleable.into_iter().map(|order| self.settle(order));
        futures::future::join_all(work).await;

        if let Ok(counts) = self.store.status_counts().await {
            metrics::record_status_counts(&counts);
        }

        Ok(())
    }

    /// Query the source-network observer and attempt the pending -> deposited
    /// transition on the first matching transfer.
    async fn check_deposit(&self, order: &Order) {
        let source = order.direction.source();
        let Some(observer) = self.observers.get(&source) else {
            debug!(order_id = %order.id, network = %source, "no observer configured");
            return;
        };

        let query = observer.query_incoming(&order.deposit_address, order.created_at);
        let outcome = match timeout(self.config.call_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(SwapError::Timeout {
                operation: format!("indexer query on {}", source),
            }),
        };
        let transfers = match outcome {
            Ok(transfers) => transfers,
            Err(e) => {
                if e.is_transient() {
                    warn!(order_id = %order.id, network = %source, "indexer query failed: {}", e);
                } else {
                    error!(order_id = %order.id, network = %source, "indexer query failed: {}", e);
                }
                metrics::record_observer_error(source);
                return;
            }
        };

        let tolerance = self.config.tolerance(source);
        let Some(transfer) = matching::match_deposit(order, &transfers, tolerance) else {
            return;
        };

        match self.store.try_mark_deposited(order.id, &transfer.tx_ref).await {
            Ok(true) => {
                info!(
                    order_id = %order.id,
                    tx_ref = %transfer.tx_ref,
                    amount = transfer.amount,
                    "deposit detected"
                );
                metrics::record_deposit_matched(source);
            }
            Ok(false) => {
                debug!(
                    order_id = %order.id,
                    tx_ref = %transfer.tx_ref,
                    "deposit claim lost, order already advanced or ref taken by another order"
                );
            }
            Err(e) => {
                warn!(order_id = %order.id, "failed to record deposit: {}", e);
            }
        }
    }

    /// Claim the order for settlement and perform the outbound send. A send
    /// failure after the claim leaves the order in `processing` for manual
    /// intervention; retrying an ambiguous send risks paying twice.
    async fn settle(&self, order: &Order) {
        let destination = order.direction.destination();
        let Some(sender) = self.senders.get(&destination) else {
            let e = SwapError::SenderUnavailable {
                network: destination,
            };
            warn!(order_id = %order.id, "order parked: {}", e);
            return;
        };

        match self.store.try_mark_processing(order.id).await {
            Ok(true) => {}
            Ok(false) => {
                if order.status == OrderStatus::Processing {
                    warn!(
                        order_id = %order.id,
                        "order stuck in processing, awaiting manual review"
                    );
                } else {
                    debug!(order_id = %order.id, "lost settlement claim, skipping");
                }
                return;
            }
            Err(e) => {
                warn!(order_id = %order.id, "failed to claim settlement: {}", e);
                return;
            }
        }

        metrics::record_settlement_claimed(destination);
        info!(
            order_id = %order.id,
            network = %destination,
            amount = order.output_amount,
            "executing settlement"
        );

        let send = sender.send(&order.recipient_address, order.output_amount);
        let outcome = match timeout(self.config.call_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(SwapError::Timeout {
                operation: format!("settlement send on {}", destination),
            }),
        };

        match outcome {
            Ok(tx_ref) => match self.store.mark_completed(order.id, &tx_ref).await {
                Ok(()) => {
                    info!(order_id = %order.id, tx_ref = %tx_ref, "swap completed");
                    metrics::record_settlement_completed(destination);
                }
                Err(e) => {
                    // Payment went out but the record is stuck in processing;
                    // the tx ref in this log line is the recovery handle.
                    error!(
                        order_id = %order.id,
                        tx_ref = %tx_ref,
                        "settlement sent but completion write failed: {}", e
                    );
                    metrics::record_settlement_failed(destination);
                }
            },
            Err(e) => {
                // A timed-out send is ambiguous: the payment may still land,
                // so the order stays in processing rather than being retried.
                error!(
                    order_id = %order.id,
                    "settlement failed after claiming processing, manual intervention required: {}",
                    e
                );
                metrics::record_settlement_failed(destination);
            }
        }
    }

    /// Stop the coordination loop
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Swap coordinator shutdown initiated");
    }
}
