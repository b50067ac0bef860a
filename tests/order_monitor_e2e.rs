//! End-to-end engine tests against the real SQLite ledger: seed orders and
//! balances, run monitor ticks with a scripted price feed, and assert the
//! resulting ledger state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use stonks::application::services::order_monitor::OrderMonitor;
use stonks::config::EngineConfig;
use stonks::domain::entities::order::{
    AssetClass, Order, OrderSide, OrderStatus, OrderType,
};
use stonks::domain::repositories::ledger_store::{HoldingUpsert, LedgerStore};
use stonks::domain::repositories::market_data::{MarketDataError, MarketDataGateway};
use stonks::domain::value_objects::{price::Price, quantity::Quantity};
use stonks::persistence::repository::SqliteLedgerStore;
use stonks::persistence::{init_database, DbPool};

/// Gateway fed from a fixed symbol -> price map; anything else is a miss.
#[derive(Default)]
struct FixedPriceGateway {
    prices: Mutex<HashMap<String, f64>>,
}

impl FixedPriceGateway {
    fn new() -> Self {
        Self::default()
    }

    fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl MarketDataGateway for FixedPriceGateway {
    async fn fetch_latest_price(
        &self,
        symbol: &str,
        _asset_class: AssetClass,
    ) -> Result<Option<Price>, MarketDataError> {
        match self.prices.lock().unwrap().get(symbol) {
            Some(value) => Ok(Some(
                Price::new(*value).map_err(MarketDataError::MalformedResponse)?,
            )),
            None => Ok(None),
        }
    }
}

struct Harness {
    pool: DbPool,
    store: Arc<SqliteLedgerStore>,
    gateway: Arc<FixedPriceGateway>,
    monitor: OrderMonitor,
}

async fn harness() -> Harness {
    let pool = init_database("sqlite::memory:").await.unwrap();
    let store = Arc::new(SqliteLedgerStore::new(pool.clone()));
    let gateway = Arc::new(FixedPriceGateway::new());
    let monitor = OrderMonitor::new(
        store.clone(),
        gateway.clone(),
        &EngineConfig::default(),
    );
    Harness {
        pool,
        store,
        gateway,
        monitor,
    }
}

fn stop_loss(
    id: &str,
    user_id: &str,
    symbol: &str,
    side: OrderSide,
    trigger: f64,
    quantity: f64,
) -> Order {
    Order {
        id: id.to_string(),
        user_id: user_id.to_string(),
        symbol: symbol.to_string(),
        asset_name: symbol.to_string(),
        asset_class: AssetClass::Equity,
        side,
        order_type: OrderType::StopLoss,
        trigger_price: Some(Price::new(trigger).unwrap()),
        quantity: Quantity::new(quantity).unwrap(),
        status: OrderStatus::Pending,
        reserved_balance: None,
        parent_order_id: None,
        bracket_stop_loss_id: None,
        bracket_target_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

async fn seed_holding(store: &SqliteLedgerStore, user_id: &str, symbol: &str, qty: f64, avg: f64) {
    store
        .upsert_holding(&HoldingUpsert {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            asset_name: symbol.to_string(),
            asset_class: AssetClass::Equity,
            quantity: Quantity::new(qty).unwrap(),
            average_price: Price::new(avg).unwrap(),
            current_price: Price::new(avg).unwrap(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stop_loss_sell_fills_when_price_drops() {
    let h = harness().await;
    h.store.create_profile("u-1", 1000.0).await.unwrap();
    seed_holding(&h.store, "u-1", "RELIANCE", 10.0, 100.0).await;
    h.store
        .insert_order(&stop_loss("o-1", "u-1", "RELIANCE", OrderSide::Sell, 95.0, 10.0))
        .await
        .unwrap();

    // Above the trigger: nothing happens.
    h.gateway.set_price("RELIANCE", 97.0);
    h.monitor.tick().await.unwrap();
    assert_eq!(
        h.store.get_order("o-1").await.unwrap().unwrap().status,
        OrderStatus::Pending
    );

    // Price drops through the trigger. A fresh monitor sidesteps the
    // still-warm 97.0 cache entry from the first tick.
    h.gateway.set_price("RELIANCE", 94.0);
    let monitor = OrderMonitor::new(
        h.store.clone(),
        h.gateway.clone(),
        &EngineConfig::default(),
    );
    monitor.tick().await.unwrap();

    let order = h.store.get_order("o-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Filled);

    // 1000 + 10 x 94
    assert_eq!(h.store.get_balance("u-1").await.unwrap(), 1940.0);
    assert!(h
        .store
        .get_holding("u-1", "RELIANCE")
        .await
        .unwrap()
        .is_none());

    // Fill fields landed on the order row.
    let (filled_qty, fill_price, tx_id): (f64, f64, String) = sqlx::query_as(
        "SELECT filled_quantity, avg_fill_price, transaction_id FROM orders WHERE id = 'o-1'",
    )
    .fetch_one(&h.pool)
    .await
    .unwrap();
    assert_eq!(filled_qty, 10.0);
    assert_eq!(fill_price, 94.0);

    // And the transaction references the same fill.
    let transactions = h.store.list_transactions("u-1").await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].id, tx_id);
    assert_eq!(transactions[0].transaction_type, "sell");
    assert_eq!(transactions[0].total_amount, 940.0);
    assert_eq!(transactions[0].balance_after, 1940.0);
}

#[tokio::test]
async fn test_buy_stop_fill_blends_average_and_debits_balance() {
    let h = harness().await;
    h.store.create_profile("u-1", 5000.0).await.unwrap();
    seed_holding(&h.store, "u-1", "TCS", 10.0, 100.0).await;
    h.store
        .insert_order(&stop_loss("o-1", "u-1", "TCS", OrderSide::Buy, 105.0, 5.0))
        .await
        .unwrap();

    h.gateway.set_price("TCS", 106.0);
    h.monitor.tick().await.unwrap();

    let order = h.store.get_order("o-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Filled);

    // 5000 - 5 x 106
    assert_eq!(h.store.get_balance("u-1").await.unwrap(), 4470.0);

    let holding = h.store.get_holding("u-1", "TCS").await.unwrap().unwrap();
    assert_eq!(holding.quantity.value(), 15.0);
    // (10 x 100 + 5 x 106) / 15 = 102
    assert!((holding.average_price.value() - 102.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_insufficient_balance_marks_order_failed_with_reason() {
    let h = harness().await;
    h.store.create_profile("u-1", 100.0).await.unwrap();
    h.store
        .insert_order(&stop_loss("o-1", "u-1", "TCS", OrderSide::Buy, 105.0, 5.0))
        .await
        .unwrap();

    h.gateway.set_price("TCS", 106.0);
    h.monitor.tick().await.unwrap();

    let order = h.store.get_order("o-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);

    let (reason,): (String,) =
        sqlx::query_as("SELECT failure_reason FROM orders WHERE id = 'o-1'")
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert!(reason.contains("Insufficient balance"));

    // Balance untouched, nothing recorded.
    assert_eq!(h.store.get_balance("u-1").await.unwrap(), 100.0);
    assert!(h.store.list_transactions("u-1").await.unwrap().is_empty());

    // Terminal order is not reconsidered on later ticks.
    h.monitor.tick().await.unwrap();
    let order = h.store.get_order("o-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_bracket_pair_fills_exactly_one_leg() {
    let h = harness().await;
    h.store.create_profile("u-1", 0.0).await.unwrap();
    seed_holding(&h.store, "u-1", "RELIANCE", 10.0, 100.0).await;

    let mut parent = stop_loss("parent", "u-1", "RELIANCE", OrderSide::Sell, 0.0, 10.0);
    parent.trigger_price = None;
    parent.bracket_stop_loss_id = Some("leg-stop".to_string());
    parent.bracket_target_id = Some("leg-target".to_string());

    let mut stop = stop_loss("leg-stop", "u-1", "RELIANCE", OrderSide::Sell, 95.0, 10.0);
    stop.parent_order_id = Some("parent".to_string());
    // Both legs trigger at 94, forcing the mutual-exclusion path within a
    // single tick.
    let mut target = stop_loss("leg-target", "u-1", "RELIANCE", OrderSide::Sell, 95.0, 10.0);
    target.parent_order_id = Some("parent".to_string());

    h.store.insert_order(&parent).await.unwrap();
    h.store.insert_order(&stop).await.unwrap();
    h.store.insert_order(&target).await.unwrap();

    h.gateway.set_price("RELIANCE", 94.0);
    h.monitor.tick().await.unwrap();

    let stop_status = h.store.get_order("leg-stop").await.unwrap().unwrap().status;
    let target_status = h
        .store
        .get_order("leg-target")
        .await
        .unwrap()
        .unwrap()
        .status;

    let statuses = [stop_status, target_status];
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == OrderStatus::Filled)
            .count(),
        1,
        "exactly one bracket leg may fill"
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == OrderStatus::Cancelled)
            .count(),
        1,
        "the sibling leg must be cancelled"
    );

    // Only one leg's worth of proceeds.
    assert_eq!(h.store.get_balance("u-1").await.unwrap(), 940.0);
    assert_eq!(h.store.list_transactions("u-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_price_outage_leaves_orders_pending() {
    let h = harness().await;
    h.store.create_profile("u-1", 1000.0).await.unwrap();
    seed_holding(&h.store, "u-1", "OBSCURE", 10.0, 100.0).await;
    h.store
        .insert_order(&stop_loss("o-1", "u-1", "OBSCURE", OrderSide::Sell, 95.0, 10.0))
        .await
        .unwrap();

    // No price for OBSCURE on any tick.
    for _ in 0..3 {
        h.monitor.tick().await.unwrap();
    }

    let order = h.store.get_order("o-1").await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(h.store.get_balance("u-1").await.unwrap(), 1000.0);
    assert_eq!(
        h.store
            .get_holding("u-1", "OBSCURE")
            .await
            .unwrap()
            .unwrap()
            .quantity
            .value(),
        10.0
    );
}

#[tokio::test]
async fn test_one_symbol_outage_does_not_block_others() {
    let h = harness().await;
    h.store.create_profile("u-1", 1000.0).await.unwrap();
    seed_holding(&h.store, "u-1", "RELIANCE", 10.0, 100.0).await;
    seed_holding(&h.store, "u-1", "OBSCURE", 10.0, 100.0).await;
    h.store
        .insert_order(&stop_loss("o-1", "u-1", "OBSCURE", OrderSide::Sell, 95.0, 10.0))
        .await
        .unwrap();
    h.store
        .insert_order(&stop_loss("o-2", "u-1", "RELIANCE", OrderSide::Sell, 95.0, 10.0))
        .await
        .unwrap();

    // Only RELIANCE has a quote.
    h.gateway.set_price("RELIANCE", 94.0);
    h.monitor.tick().await.unwrap();

    assert_eq!(
        h.store.get_order("o-1").await.unwrap().unwrap().status,
        OrderStatus::Pending
    );
    assert_eq!(
        h.store.get_order("o-2").await.unwrap().unwrap().status,
        OrderStatus::Filled
    );
}
