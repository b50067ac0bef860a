//! BracketCoordinator - cancels the surviving leg of a bracket pair when
//! the other leg fills.
//!
//! A bracket parent order carries both leg ids; each leg points back at
//! the parent. The cancellation is a conditional non-terminal transition,
//! so a sibling that already filled is never clobbered: exactly one leg
//! of a pair can reach `filled`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entities::order::Order;
use crate::domain::repositories::ledger_store::{LedgerResult, LedgerStore};

/// Cancellation reason recorded on the surviving leg.
pub const SIBLING_FILLED_REASON: &str = "Bracket order sibling filled";

pub struct BracketCoordinator {
    store: Arc<dyn LedgerStore>,
}

impl BracketCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Resolve sibling cancellation after `order` filled. No-op for orders
    /// that are not bracket legs.
    pub async fn on_filled(&self, order: &Order) -> LedgerResult<()> {
        let Some(parent_id) = &order.parent_order_id else {
            return Ok(());
        };

        let Some(parent) = self.store.get_order(parent_id).await? else {
            warn!(
                order_id = %order.id,
                parent_id = %parent_id,
                "bracket parent not found, sibling left untouched"
            );
            return Ok(());
        };

        let sibling_id = if parent.bracket_stop_loss_id.as_deref() == Some(order.id.as_str()) {
            parent.bracket_target_id.as_deref()
        } else {
            parent.bracket_stop_loss_id.as_deref()
        };

        let Some(sibling_id) = sibling_id else {
            debug!(order_id = %order.id, "bracket parent has no sibling leg");
            return Ok(());
        };

        if self.store.cancel_order(sibling_id, SIBLING_FILLED_REASON).await? {
            info!(
                filled_id = %order.id,
                cancelled_id = %sibling_id,
                "cancelled sibling bracket leg"
            );
        } else {
            debug!(
                sibling_id = %sibling_id,
                "sibling bracket leg already terminal, nothing to cancel"
            );
        }

        Ok(())
    }
}
