//! Shared test doubles for the engine: an in-memory ledger with the same
//! conditional-write semantics as the real store, and a scriptable market
//! data gateway.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::entities::holding::Holding;
use crate::domain::entities::order::{
    AssetClass, Order, OrderFill, OrderSide, OrderStatus, OrderType,
};
use crate::domain::repositories::ledger_store::{
    HoldingUpsert, LedgerError, LedgerResult, LedgerStore, NewTransaction,
};
use crate::domain::repositories::market_data::{MarketDataError, MarketDataGateway};
use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// In-memory ledger mirroring the store's conditional transitions.
#[derive(Default)]
pub struct InMemoryLedger {
    pub orders: Mutex<HashMap<String, Order>>,
    pub holdings: Mutex<HashMap<(String, String), Holding>>,
    pub balances: Mutex<HashMap<String, f64>>,
    pub transactions: Mutex<Vec<(String, NewTransaction)>>,
    pub failures: Mutex<HashMap<String, String>>,
    pub cancellations: Mutex<HashMap<String, String>>,
    pub fills: Mutex<HashMap<String, OrderFill>>,
    /// When set, every listing call fails as if the store were down.
    pub listing_unavailable: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, user_id: &str, balance: f64) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(user_id.to_string(), balance);
        self
    }

    pub fn add_order(&self, order: Order) {
        self.orders.lock().unwrap().insert(order.id.clone(), order);
    }

    pub fn add_holding(&self, holding: Holding) {
        self.holdings.lock().unwrap().insert(
            (holding.user_id.clone(), holding.symbol.clone()),
            holding,
        );
    }

    pub fn order_status(&self, id: &str) -> OrderStatus {
        self.orders.lock().unwrap().get(id).unwrap().status
    }

    pub fn balance_of(&self, user_id: &str) -> f64 {
        *self.balances.lock().unwrap().get(user_id).unwrap()
    }

    pub fn holding_quantity(&self, user_id: &str, symbol: &str) -> Option<f64> {
        self.holdings
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), symbol.to_string()))
            .map(|h| h.quantity.value())
    }

    fn transition(&self, id: &str, to: OrderStatus) -> bool {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(id) {
            Some(order) if !order.status.is_terminal() => {
                order.status = to;
                order.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn list_open_orders(&self) -> LedgerResult<Vec<Order>> {
        if self.listing_unavailable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("store offline".to_string()));
        }
        let mut open: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(open)
    }

    async fn get_order(&self, id: &str) -> LedgerResult<Option<Order>> {
        Ok(self.orders.lock().unwrap().get(id).cloned())
    }

    async fn claim_order(&self, id: &str) -> LedgerResult<bool> {
        Ok(self.transition(id, OrderStatus::Triggered))
    }

    async fn mark_order_filled(&self, id: &str, fill: &OrderFill) -> LedgerResult<bool> {
        if self.transition(id, OrderStatus::Filled) {
            self.fills
                .lock()
                .unwrap()
                .insert(id.to_string(), fill.clone());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn mark_order_failed(&self, id: &str, reason: &str) -> LedgerResult<bool> {
        if self.transition(id, OrderStatus::Failed) {
            self.failures
                .lock()
                .unwrap()
                .insert(id.to_string(), reason.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn cancel_order(&self, id: &str, reason: &str) -> LedgerResult<bool> {
        if self.transition(id, OrderStatus::Cancelled) {
            self.cancellations
                .lock()
                .unwrap()
                .insert(id.to_string(), reason.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn get_holding(&self, user_id: &str, symbol: &str) -> LedgerResult<Option<Holding>> {
        Ok(self
            .holdings
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), symbol.to_string()))
            .cloned())
    }

    async fn upsert_holding(&self, upsert: &HoldingUpsert) -> LedgerResult<()> {
        let mut holdings = self.holdings.lock().unwrap();
        let key = (upsert.user_id.clone(), upsert.symbol.clone());
        match holdings.get_mut(&key) {
            Some(existing) => {
                existing.quantity = upsert.quantity;
                existing.average_price = upsert.average_price;
                existing.updated_at = Utc::now();
            }
            None => {
                holdings.insert(
                    key,
                    Holding {
                        id: format!("h-{}", upsert.symbol.to_lowercase()),
                        user_id: upsert.user_id.clone(),
                        symbol: upsert.symbol.clone(),
                        asset_name: upsert.asset_name.clone(),
                        asset_class: upsert.asset_class,
                        quantity: upsert.quantity,
                        average_price: upsert.average_price,
                        created_at: Utc::now(),
                        updated_at: Utc::now(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn delete_holding(&self, id: &str) -> LedgerResult<()> {
        self.holdings.lock().unwrap().retain(|_, h| h.id != id);
        Ok(())
    }

    async fn get_balance(&self, user_id: &str) -> LedgerResult<f64> {
        self.balances
            .lock()
            .unwrap()
            .get(user_id)
            .copied()
            .ok_or_else(|| LedgerError::ProfileNotFound(user_id.to_string()))
    }

    async fn set_balance_if_unchanged(
        &self,
        user_id: &str,
        expected: f64,
        new_balance: f64,
    ) -> LedgerResult<bool> {
        let mut balances = self.balances.lock().unwrap();
        match balances.get_mut(user_id) {
            Some(balance) if *balance == expected => {
                *balance = new_balance;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(LedgerError::ProfileNotFound(user_id.to_string())),
        }
    }

    async fn append_transaction(&self, tx: &NewTransaction) -> LedgerResult<String> {
        let mut transactions = self.transactions.lock().unwrap();
        let id = format!("tx-{}", transactions.len() + 1);
        transactions.push((id.clone(), tx.clone()));
        Ok(id)
    }
}

/// Gateway returning fixed prices per symbol; unknown symbols are `None`.
#[derive(Default)]
pub struct StaticGateway {
    pub prices: Mutex<HashMap<String, f64>>,
    pub fetch_count: Mutex<HashMap<String, u32>>,
}

impl StaticGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price);
    }

    pub fn fetches_for(&self, symbol: &str) -> u32 {
        *self.fetch_count.lock().unwrap().get(symbol).unwrap_or(&0)
    }
}

#[async_trait]
impl MarketDataGateway for StaticGateway {
    async fn fetch_latest_price(
        &self,
        symbol: &str,
        _asset_class: AssetClass,
    ) -> Result<Option<Price>, MarketDataError> {
        *self
            .fetch_count
            .lock()
            .unwrap()
            .entry(symbol.to_string())
            .or_insert(0) += 1;

        match self.prices.lock().unwrap().get(symbol) {
            Some(value) => Ok(Some(Price::new(*value).map_err(MarketDataError::MalformedResponse)?)),
            None => Ok(None),
        }
    }
}

/// A pending stop-loss order with sensible defaults for tests.
pub fn stop_loss_order(id: &str, user_id: &str, symbol: &str, side: OrderSide) -> Order {
    Order {
        id: id.to_string(),
        user_id: user_id.to_string(),
        symbol: symbol.to_string(),
        asset_name: symbol.to_string(),
        asset_class: AssetClass::Equity,
        side,
        order_type: OrderType::StopLoss,
        trigger_price: Some(Price::new(95.0).unwrap()),
        quantity: Quantity::new(10.0).unwrap(),
        status: OrderStatus::Pending,
        reserved_balance: None,
        parent_order_id: None,
        bracket_stop_loss_id: None,
        bracket_target_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A holding row with the given quantity and average price.
pub fn holding_of(user_id: &str, symbol: &str, quantity: f64, average_price: f64) -> Holding {
    Holding {
        id: format!("h-{}", symbol.to_lowercase()),
        user_id: user_id.to_string(),
        symbol: symbol.to_string(),
        asset_name: symbol.to_string(),
        asset_class: AssetClass::Equity,
        quantity: Quantity::new(quantity).unwrap(),
        average_price: Price::new(average_price).unwrap(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
