//! Order Monitor Service
//!
//! Background service that polls open orders on a fixed cadence and
//! executes the ones whose trigger conditions hold. Each tick fetches all
//! non-terminal orders, groups them by symbol so every symbol costs at
//! most one price lookup, and hands triggered orders to the executor.
//!
//! Failure isolation per tick:
//! - a symbol whose price is unavailable is skipped, its orders untouched;
//! - a store failure while listing aborts the whole tick;
//! - a store failure during one order's execution leaves that order open
//!   and moves on to the next.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::entities::order::{AssetClass, Order};
use crate::domain::repositories::ledger_store::{LedgerError, LedgerStore};
use crate::domain::repositories::market_data::MarketDataGateway;
use crate::domain::services::bracket::BracketCoordinator;
use crate::domain::services::order_executor::{ExecutionOutcome, OrderExecutor};
use crate::domain::services::price_cache::PriceCache;
use crate::domain::services::trigger::should_trigger;
use crate::domain::value_objects::price::Price;
use crate::task_runner::run_periodic;

/// Background order monitoring service.
pub struct OrderMonitor {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn MarketDataGateway>,
    cache: PriceCache,
    executor: OrderExecutor,
    brackets: BracketCoordinator,
    poll_interval: Duration,
}

/// Handle to a spawned monitor. Dropping the handle does not stop the
/// loop; call [`OrderMonitorHandle::shutdown`].
pub struct OrderMonitorHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl OrderMonitorHandle {
    /// Signal shutdown and wait for the in-flight tick to finish.
    pub async fn shutdown(self) {
        info!("Order monitor shutdown requested");
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            error!("Order monitor task failed to join: {}", e);
        }
    }
}

impl OrderMonitor {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn MarketDataGateway>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            executor: OrderExecutor::new(store.clone()),
            brackets: BracketCoordinator::new(store.clone()),
            cache: PriceCache::new(config.price_cache_ttl()),
            store,
            gateway,
            poll_interval: config.poll_interval(),
        }
    }

    /// Start the monitoring loop on a background task.
    pub fn spawn(self) -> OrderMonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = Arc::new(self);
        let poll_interval = monitor.poll_interval;

        let join = tokio::spawn(async move {
            info!(
                interval_secs = poll_interval.as_secs(),
                "Order monitor started"
            );
            run_periodic("order_monitor", poll_interval, shutdown_rx, move || {
                let monitor = monitor.clone();
                async move { monitor.tick().await.map_err(|e| e.to_string()) }
            })
            .await;
        });

        OrderMonitorHandle { shutdown_tx, join }
    }

    /// One pass over all open orders.
    pub async fn tick(&self) -> Result<(), LedgerError> {
        let orders = self.store.list_open_orders().await?;
        if orders.is_empty() {
            return Ok(());
        }

        debug!(count = orders.len(), "checking open orders");

        let mut groups: HashMap<(String, AssetClass), Vec<Order>> = HashMap::new();
        for order in orders {
            groups
                .entry((order.symbol.clone(), order.asset_class))
                .or_default()
                .push(order);
        }

        for ((symbol, asset_class), group) in groups {
            self.process_symbol_orders(&symbol, asset_class, &group).await;
        }

        Ok(())
    }

    /// Evaluate and execute all of one symbol's orders against a single
    /// price observation.
    async fn process_symbol_orders(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        orders: &[Order],
    ) {
        let Some(price) = self.resolve_price(symbol, asset_class).await else {
            warn!(symbol, "price unavailable, skipping symbol this tick");
            return;
        };

        debug!(symbol, price = %price, "evaluating {} orders", orders.len());

        for order in orders {
            if !should_trigger(order, price) {
                continue;
            }

            info!(
                order_id = %order.id,
                symbol,
                price = %price,
                "trigger condition met"
            );

            match self.executor.execute(order, price).await {
                Ok(ExecutionOutcome::Filled(_)) => {
                    if let Err(e) = self.brackets.on_filled(order).await {
                        error!(
                            order_id = %order.id,
                            error = %e,
                            "bracket sibling resolution failed"
                        );
                    }
                }
                Ok(ExecutionOutcome::Failed { .. }) => {
                    // Recorded on the order by the executor.
                }
                Ok(ExecutionOutcome::Superseded) => {
                    debug!(order_id = %order.id, "execution superseded, no mutation");
                }
                Err(e) => {
                    error!(
                        order_id = %order.id,
                        error = %e,
                        "store failure during execution, order left open"
                    );
                }
            }
        }
    }

    /// Cache-then-gateway price resolution. Any provider trouble resolves
    /// to `None` so the caller skips just this symbol.
    async fn resolve_price(&self, symbol: &str, asset_class: AssetClass) -> Option<Price> {
        if let Some(price) = self.cache.get(symbol, asset_class).await {
            return Some(price);
        }

        match self.gateway.fetch_latest_price(symbol, asset_class).await {
            Ok(Some(price)) => {
                self.cache.put(symbol, asset_class, price).await;
                Some(price)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(symbol, error = %e, "price fetch failed");
                None
            }
        }
    }
}
