//! Trigger evaluation - decides whether an order's condition holds
//! against the current price.

use crate::domain::entities::order::{Order, OrderSide, OrderType};
use crate::domain::value_objects::price::Price;

/// Whether `order` should execute at `current_price`.
///
/// Only stop-loss orders carry trigger semantics:
/// - sell stop-loss fires when the price falls to or below the trigger;
/// - buy stop-loss fires when the price rises to or above the trigger.
///
/// Orders without a trigger price never fire, and neither do other order
/// types; new conditional types get their own arm here rather than
/// special-cased call sites.
pub fn should_trigger(order: &Order, current_price: Price) -> bool {
    let Some(trigger_price) = order.trigger_price else {
        return false;
    };

    match order.order_type {
        OrderType::StopLoss => match order.side {
            OrderSide::Sell => current_price <= trigger_price,
            OrderSide::Buy => current_price >= trigger_price,
        },
        OrderType::Limit | OrderType::TakeProfit => false,
    }
}
