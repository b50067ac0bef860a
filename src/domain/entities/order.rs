//! Order entity and its status state machine.

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// Asset class of the instrument an order is written against.
///
/// Drives the provider ticker convention: NSE equities carry a `.NS`
/// suffix, crypto pairs quote against INR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetClass {
    Equity,
    Crypto,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::Crypto => "crypto",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "equity" => Ok(AssetClass::Equity),
            "crypto" => Ok(AssetClass::Crypto),
            other => Err(format!("Unknown asset class: {}", other)),
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(format!("Unknown order side: {}", other)),
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order type. Only stop-loss orders carry trigger semantics today; the
/// remaining variants are placed by the order API but never trigger in the
/// monitoring engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    StopLoss,
    Limit,
    TakeProfit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::StopLoss => "stop_loss",
            OrderType::Limit => "limit",
            OrderType::TakeProfit => "take_profit",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "stop_loss" => Ok(OrderType::StopLoss),
            "limit" => Ok(OrderType::Limit),
            "take_profit" => Ok(OrderType::TakeProfit),
            other => Err(format!("Unknown order type: {}", other)),
        }
    }
}

/// Order lifecycle status.
///
/// `Pending` and `Triggered` are both polled by the monitor; `Triggered`
/// additionally marks an order the executor has claimed for execution.
/// `Filled`, `Cancelled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Triggered,
    Filled,
    Cancelled,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Triggered => "triggered",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "triggered" => Ok(OrderStatus::Triggered),
            "filled" => Ok(OrderStatus::Filled),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "failed" => Ok(OrderStatus::Failed),
            other => Err(format!("Unknown order status: {}", other)),
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Failed
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A standing order as read from the ledger store.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub asset_name: String,
    pub asset_class: AssetClass,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub trigger_price: Option<Price>,
    pub quantity: Quantity,
    pub status: OrderStatus,
    /// Funds parked at placement time for buy orders, released back into
    /// the available balance during the fill's sufficiency check.
    pub reserved_balance: Option<f64>,
    /// Set on bracket legs; points at the parent order carrying both leg ids.
    pub parent_order_id: Option<String>,
    /// Set on bracket parents only.
    pub bracket_stop_loss_id: Option<String>,
    pub bracket_target_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether this order is a leg of a bracket pair.
    pub fn is_bracket_leg(&self) -> bool {
        self.parent_order_id.is_some()
    }
}

/// Fields recorded on an order when it fills.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub quantity: Quantity,
    pub price: Price,
    pub transaction_id: String,
    pub filled_at: DateTime<Utc>,
}
