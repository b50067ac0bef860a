//! Holding entity - a user's position in a single instrument.

use chrono::{DateTime, Utc};

use crate::domain::entities::order::AssetClass;
use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// A per-(user, symbol) position. Quantity is always above the dust
/// threshold; positions that would fall below it are deleted, never stored
/// as near-zero rows.
#[derive(Debug, Clone)]
pub struct Holding {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub asset_name: String,
    pub asset_class: AssetClass,
    pub quantity: Quantity,
    /// Volume-weighted average entry price across successive buys.
    pub average_price: Price,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    /// Cost basis after buying `quantity` more units at `price`:
    /// quantity-weighted mean of the old and new lots.
    pub fn average_after_buy(&self, quantity: Quantity, price: Price) -> Result<Price, String> {
        let old_qty = self.quantity.value();
        let new_qty = old_qty + quantity.value();
        if new_qty <= 0.0 {
            return Err("Combined quantity must be positive".to_string());
        }
        let blended =
            (old_qty * self.average_price.value() + price.total_for(quantity)) / new_qty;
        Price::new(blended)
    }
}
