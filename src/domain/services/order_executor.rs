//! OrderExecutor - performs buy and sell fills against the ledger.
//!
//! Every execution starts by claiming the order (a conditional
//! `pending|triggered -> triggered` transition) so an order cancelled from
//! outside is observed before any money moves. Balance writes are
//! compare-and-set against the value just read; on conflict the debit or
//! credit is retried from a fresh read a bounded number of times, then the
//! execution gives up for this tick and the still-open order is
//! reconsidered on the next one.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::entities::order::{Order, OrderFill, OrderSide};
use crate::domain::errors::ExecutionError;
use crate::domain::repositories::ledger_store::{
    HoldingUpsert, LedgerError, LedgerStore, NewTransaction,
};
use crate::domain::value_objects::price::Price;

/// Attempts at the balance compare-and-set before giving up for the tick.
const BALANCE_CAS_ATTEMPTS: u32 = 3;

/// Result of executing one triggered order.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The order filled; ledger mutations are committed.
    Filled(OrderFill),
    /// Terminal business failure; the order was moved to `failed` with the
    /// reason recorded.
    Failed { reason: ExecutionError },
    /// Nothing was changed: the order turned terminal under us, or a
    /// concurrent balance writer kept winning. The order is reconsidered
    /// next tick if still open.
    Superseded,
}

/// Executes fills for triggered orders.
pub struct OrderExecutor {
    store: Arc<dyn LedgerStore>,
}

impl OrderExecutor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Execute `order` at `current_price`.
    ///
    /// Returns `Err` only for store failures, which leave the order open;
    /// business failures are terminal and reported via
    /// [`ExecutionOutcome::Failed`] after the order is marked `failed`.
    pub async fn execute(
        &self,
        order: &Order,
        current_price: Price,
    ) -> Result<ExecutionOutcome, LedgerError> {
        if !self.store.claim_order(&order.id).await? {
            return Ok(ExecutionOutcome::Superseded);
        }

        info!(
            order_id = %order.id,
            side = %order.side,
            symbol = %order.symbol,
            quantity = order.quantity.value(),
            price = %current_price,
            "executing order"
        );

        let result = match order.side {
            OrderSide::Buy => self.execute_buy(order, current_price).await,
            OrderSide::Sell => self.execute_sell(order, current_price).await,
        };

        match result {
            Ok(Some(fill)) => Ok(ExecutionOutcome::Filled(fill)),
            Ok(None) => Ok(ExecutionOutcome::Superseded),
            Err(ExecutionError::Ledger(e)) => Err(e),
            Err(reason) => {
                // Terminal business failure; record it on the order.
                self.store
                    .mark_order_failed(&order.id, &reason.to_string())
                    .await?;
                warn!(order_id = %order.id, %reason, "order execution failed");
                Ok(ExecutionOutcome::Failed { reason })
            }
        }
    }

    /// Buy path: debit balance, upsert holding at the blended average,
    /// append the transaction, mark the order filled.
    async fn execute_buy(
        &self,
        order: &Order,
        price: Price,
    ) -> Result<Option<OrderFill>, ExecutionError> {
        let total_cost = price.total_for(order.quantity);
        let reserved = order.reserved_balance.unwrap_or(0.0);

        let Some(new_balance) = self.debit_balance(order, total_cost, reserved).await? else {
            return Ok(None);
        };

        let upsert = match self.store.get_holding(&order.user_id, &order.symbol).await? {
            Some(existing) => {
                let average_price = existing
                    .average_after_buy(order.quantity, price)
                    .map_err(|reason| ExecutionError::InvalidOrder {
                        order_id: order.id.clone(),
                        reason,
                    })?;
                HoldingUpsert {
                    user_id: order.user_id.clone(),
                    symbol: order.symbol.clone(),
                    asset_name: order.asset_name.clone(),
                    asset_class: order.asset_class,
                    quantity: existing.quantity.add(order.quantity),
                    average_price,
                    current_price: price,
                }
            }
            None => HoldingUpsert {
                user_id: order.user_id.clone(),
                symbol: order.symbol.clone(),
                asset_name: order.asset_name.clone(),
                asset_class: order.asset_class,
                quantity: order.quantity,
                average_price: price,
                current_price: price,
            },
        };
        self.store.upsert_holding(&upsert).await?;

        let transaction_id = self
            .store
            .append_transaction(&NewTransaction {
                user_id: order.user_id.clone(),
                symbol: order.symbol.clone(),
                asset_name: order.asset_name.clone(),
                asset_class: order.asset_class,
                side: OrderSide::Buy,
                quantity: order.quantity,
                price_per_unit: price,
                total_amount: total_cost,
                balance_after: new_balance,
            })
            .await?;

        self.finish_fill(order, price, transaction_id).await
    }

    /// Sell path: verify the holding covers the order, credit proceeds,
    /// shrink or delete the holding, append the transaction, mark filled.
    async fn execute_sell(
        &self,
        order: &Order,
        price: Price,
    ) -> Result<Option<OrderFill>, ExecutionError> {
        let holding = self
            .store
            .get_holding(&order.user_id, &order.symbol)
            .await?
            .ok_or_else(|| ExecutionError::NoHoldings {
                symbol: order.symbol.clone(),
            })?;

        if holding.quantity < order.quantity {
            return Err(ExecutionError::InsufficientHoldings {
                required: order.quantity.value(),
                available: holding.quantity.value(),
            });
        }

        let proceeds = price.total_for(order.quantity);
        let Some(new_balance) = self.credit_balance(order, proceeds).await? else {
            return Ok(None);
        };

        let remainder = holding
            .quantity
            .subtract(order.quantity)
            .map_err(|reason| ExecutionError::InvalidOrder {
                order_id: order.id.clone(),
                reason,
            })?;

        if remainder.is_dust() {
            self.store.delete_holding(&holding.id).await?;
        } else {
            self.store
                .upsert_holding(&HoldingUpsert {
                    user_id: order.user_id.clone(),
                    symbol: order.symbol.clone(),
                    asset_name: holding.asset_name.clone(),
                    asset_class: holding.asset_class,
                    quantity: remainder,
                    average_price: holding.average_price,
                    current_price: price,
                })
                .await?;
        }

        let transaction_id = self
            .store
            .append_transaction(&NewTransaction {
                user_id: order.user_id.clone(),
                symbol: order.symbol.clone(),
                asset_name: order.asset_name.clone(),
                asset_class: order.asset_class,
                side: OrderSide::Sell,
                quantity: order.quantity,
                price_per_unit: price,
                total_amount: proceeds,
                balance_after: new_balance,
            })
            .await?;

        self.finish_fill(order, price, transaction_id).await
    }

    /// Debit `total_cost` from the user's balance after releasing any
    /// reservation back into the sufficiency check. Returns the new
    /// balance, or `None` if the compare-and-set kept losing.
    async fn debit_balance(
        &self,
        order: &Order,
        total_cost: f64,
        reserved: f64,
    ) -> Result<Option<f64>, ExecutionError> {
        for attempt in 1..=BALANCE_CAS_ATTEMPTS {
            let balance = self.store.get_balance(&order.user_id).await?;
            let available = balance + reserved;

            if available < total_cost {
                return Err(ExecutionError::InsufficientBalance {
                    required: total_cost,
                    available,
                });
            }

            let new_balance = available - total_cost;
            if self
                .store
                .set_balance_if_unchanged(&order.user_id, balance, new_balance)
                .await?
            {
                return Ok(Some(new_balance));
            }

            warn!(
                order_id = %order.id,
                attempt,
                "balance changed under debit, retrying from fresh read"
            );
        }
        Ok(None)
    }

    /// Credit `proceeds` to the user's balance. Returns the new balance,
    /// or `None` if the compare-and-set kept losing.
    async fn credit_balance(
        &self,
        order: &Order,
        proceeds: f64,
    ) -> Result<Option<f64>, ExecutionError> {
        for attempt in 1..=BALANCE_CAS_ATTEMPTS {
            let balance = self.store.get_balance(&order.user_id).await?;
            let new_balance = balance + proceeds;
            if self
                .store
                .set_balance_if_unchanged(&order.user_id, balance, new_balance)
                .await?
            {
                return Ok(Some(new_balance));
            }

            warn!(
                order_id = %order.id,
                attempt,
                "balance changed under credit, retrying from fresh read"
            );
        }
        Ok(None)
    }

    async fn finish_fill(
        &self,
        order: &Order,
        price: Price,
        transaction_id: String,
    ) -> Result<Option<OrderFill>, ExecutionError> {
        let fill = OrderFill {
            quantity: order.quantity,
            price,
            transaction_id,
            filled_at: Utc::now(),
        };

        if !self.store.mark_order_filled(&order.id, &fill).await? {
            // The order turned terminal between claim and fill. The ledger
            // mutations are already committed; surface it loudly.
            warn!(
                order_id = %order.id,
                "order no longer open at fill time; ledger already mutated"
            );
            return Ok(None);
        }

        info!(
            order_id = %order.id,
            price = %fill.price,
            quantity = fill.quantity.value(),
            transaction_id = %fill.transaction_id,
            "order filled"
        );
        Ok(Some(fill))
    }
}
