//! Execution errors with the engine's failure taxonomy.

use thiserror::Error;

use crate::domain::repositories::ledger_store::LedgerError;

/// Failure modes of a single order execution.
///
/// Terminal failures move the order to `failed` and are never retried by
/// the engine; the user must re-place the order. Non-terminal failures
/// leave the order open so the next tick reconsiders it.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Available balance (including any released reservation) does not
    /// cover the order's notional cost.
    #[error("Insufficient balance: need {required:.2}, have {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    /// Sell order against a symbol the user holds nothing of.
    #[error("No holdings found for {symbol}")]
    NoHoldings { symbol: String },

    /// Sell order larger than the held position.
    #[error("Insufficient holdings: need {required}, have {available}")]
    InsufficientHoldings { required: f64, available: f64 },

    /// The order record itself does not admit execution (missing or
    /// malformed fields).
    #[error("Invalid order {order_id}: {reason}")]
    InvalidOrder { order_id: String, reason: String },

    /// The store rejected or failed a step mid-execution.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ExecutionError {
    /// Whether this failure is terminal for the order. Terminal failures
    /// are recorded on the order as `failed`; the rest leave it open for
    /// the next tick.
    pub fn is_terminal(&self) -> bool {
        match self {
            ExecutionError::InsufficientBalance { .. } => true,
            ExecutionError::NoHoldings { .. } => true,
            ExecutionError::InsufficientHoldings { .. } => true,
            ExecutionError::InvalidOrder { .. } => true,
            ExecutionError::Ledger(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_failures_are_terminal() {
        assert!(ExecutionError::InsufficientBalance {
            required: 100.0,
            available: 50.0
        }
        .is_terminal());
        assert!(ExecutionError::NoHoldings {
            symbol: "TCS".to_string()
        }
        .is_terminal());
        assert!(ExecutionError::InsufficientHoldings {
            required: 10.0,
            available: 5.0
        }
        .is_terminal());
    }

    #[test]
    fn test_store_failures_are_not_terminal() {
        let err = ExecutionError::Ledger(LedgerError::Unavailable("connection reset".to_string()));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_error_messages() {
        let err = ExecutionError::InsufficientBalance {
            required: 940.0,
            available: 500.0,
        };
        assert_eq!(err.to_string(), "Insufficient balance: need 940.00, have 500.00");
    }
}
