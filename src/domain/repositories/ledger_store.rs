//! Ledger Store Trait
//!
//! Contract over the persistent paper-trading ledger: orders, holdings,
//! cash balances and the append-only transaction history. The engine holds
//! no authoritative copy of any of these; every operation is a transient
//! read or a conditional write against the store.
//!
//! All status transitions are preconditioned on the order still being
//! non-terminal, and balance writes are compare-and-set against the value
//! previously read, so a fill only commits if nothing moved underneath it.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::holding::Holding;
use crate::domain::entities::order::{AssetClass, Order, OrderFill, OrderSide};
use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// Common result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors from the persistent store.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The store is unreachable; the whole tick should abort.
    #[error("Ledger store unavailable: {0}")]
    Unavailable(String),

    /// A single query failed.
    #[error("Ledger query failed: {0}")]
    Query(String),

    /// A stored record does not map onto the domain model.
    #[error("Invalid ledger record: {0}")]
    InvalidRecord(String),

    /// No profile row exists for the user.
    #[error("Profile not found for user {0}")]
    ProfileNotFound(String),
}

/// Insert-or-replace input for a (user, symbol) holding.
#[derive(Debug, Clone)]
pub struct HoldingUpsert {
    pub user_id: String,
    pub symbol: String,
    pub asset_name: String,
    pub asset_class: AssetClass,
    pub quantity: Quantity,
    pub average_price: Price,
    /// Last price observed at write time, carried for display surfaces.
    pub current_price: Price,
}

/// Append-only transaction record input. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: String,
    pub symbol: String,
    pub asset_name: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub price_per_unit: Price,
    pub total_amount: f64,
    pub balance_after: f64,
}

/// Persistent ledger operations consumed by the engine.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All orders in a non-terminal status (`pending` or `triggered`).
    async fn list_open_orders(&self) -> LedgerResult<Vec<Order>>;

    async fn get_order(&self, id: &str) -> LedgerResult<Option<Order>>;

    /// Claim an order for execution: `pending|triggered -> triggered`.
    /// Returns false if the order turned terminal in the meantime.
    async fn claim_order(&self, id: &str) -> LedgerResult<bool>;

    /// `pending|triggered -> filled`, recording the fill fields.
    /// Returns false if the order was no longer non-terminal.
    async fn mark_order_filled(&self, id: &str, fill: &OrderFill) -> LedgerResult<bool>;

    /// `pending|triggered -> failed` with the captured reason.
    async fn mark_order_failed(&self, id: &str, reason: &str) -> LedgerResult<bool>;

    /// `pending|triggered -> cancelled` with the given reason.
    async fn cancel_order(&self, id: &str, reason: &str) -> LedgerResult<bool>;

    async fn get_holding(&self, user_id: &str, symbol: &str) -> LedgerResult<Option<Holding>>;

    /// Insert a holding or replace the quantity/average of the existing
    /// (user, symbol) row.
    async fn upsert_holding(&self, holding: &HoldingUpsert) -> LedgerResult<()>;

    async fn delete_holding(&self, id: &str) -> LedgerResult<()>;

    async fn get_balance(&self, user_id: &str) -> LedgerResult<f64>;

    /// Compare-and-set the cash balance: the write commits only if the
    /// stored value still equals `expected`. Returns false on conflict.
    async fn set_balance_if_unchanged(
        &self,
        user_id: &str,
        expected: f64,
        new_balance: f64,
    ) -> LedgerResult<bool>;

    /// Append a completed-fill transaction, returning its id.
    async fn append_transaction(&self, tx: &NewTransaction) -> LedgerResult<String>;
}
