//! Database Models
//!
//! Row-level records for orders, holdings, profiles and transactions, plus
//! their mappings onto the domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::entities::holding::Holding;
use crate::domain::entities::order::{AssetClass, Order, OrderSide, OrderStatus, OrderType};
use crate::domain::repositories::ledger_store::LedgerError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// Order row in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderRecord {
    pub id: String,
    pub user_id: String,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_class: String,
    pub order_side: String,
    pub order_type: String,
    pub trigger_price: Option<f64>,
    pub quantity: f64,
    pub status: String,
    pub reserved_balance: Option<f64>,
    pub parent_order_id: Option<String>,
    pub bracket_stop_loss_id: Option<String>,
    pub bracket_target_id: Option<String>,
    pub filled_quantity: Option<f64>,
    pub avg_fill_price: Option<f64>,
    pub filled_at: Option<DateTime<Utc>>,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Map the row onto the domain entity, rejecting rows whose enum or
    /// numeric columns fail validation.
    pub fn into_domain(self) -> Result<Order, LedgerError> {
        let invalid =
            |reason: String| LedgerError::InvalidRecord(format!("order {}: {}", self.id, reason));

        let trigger_price = match self.trigger_price {
            Some(p) => Some(Price::new(p).map_err(&invalid)?),
            None => None,
        };

        Ok(Order {
            asset_class: AssetClass::parse(&self.asset_class).map_err(&invalid)?,
            side: OrderSide::parse(&self.order_side).map_err(&invalid)?,
            order_type: OrderType::parse(&self.order_type).map_err(&invalid)?,
            status: OrderStatus::parse(&self.status).map_err(&invalid)?,
            quantity: Quantity::new(self.quantity).map_err(&invalid)?,
            trigger_price,
            id: self.id,
            user_id: self.user_id,
            symbol: self.asset_symbol,
            asset_name: self.asset_name,
            reserved_balance: self.reserved_balance,
            parent_order_id: self.parent_order_id,
            bracket_stop_loss_id: self.bracket_stop_loss_id,
            bracket_target_id: self.bracket_target_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Holding row in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HoldingRecord {
    pub id: String,
    pub user_id: String,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_class: String,
    pub quantity: f64,
    pub average_price: f64,
    pub current_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HoldingRecord {
    pub fn into_domain(self) -> Result<Holding, LedgerError> {
        let invalid =
            |reason: String| LedgerError::InvalidRecord(format!("holding {}: {}", self.id, reason));

        Ok(Holding {
            asset_class: AssetClass::parse(&self.asset_class).map_err(&invalid)?,
            quantity: Quantity::new(self.quantity).map_err(&invalid)?,
            average_price: Price::new(self.average_price).map_err(&invalid)?,
            id: self.id,
            user_id: self.user_id,
            symbol: self.asset_symbol,
            asset_name: self.asset_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Transaction row in the database. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: String,
    pub user_id: String,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_class: String,
    pub transaction_type: String,
    pub quantity: f64,
    pub price_per_unit: f64,
    pub total_amount: f64,
    pub balance_after: f64,
    pub executed_at: DateTime<Utc>,
}
