//! SQLite Ledger Store
//!
//! Data access layer implementing the engine's `LedgerStore` contract.
//! Status transitions and balance writes are conditional UPDATEs judged by
//! `rows_affected`, so a lost race surfaces as `false` instead of a
//! silently clobbered row.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error};
use uuid::Uuid;

use super::models::{HoldingRecord, OrderRecord, TransactionRecord};
use super::DbPool;
use crate::domain::entities::holding::Holding;
use crate::domain::entities::order::{Order, OrderFill};
use crate::domain::repositories::ledger_store::{
    HoldingUpsert, LedgerError, LedgerResult, LedgerStore, NewTransaction,
};

/// Statuses the monitor polls; all conditional transitions require one of
/// these.
const OPEN_STATUSES: &str = "('pending', 'triggered')";

fn query_failed(context: &str, e: sqlx::Error) -> LedgerError {
    error!("{}: {}", context, e);
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            LedgerError::Unavailable(format!("{}: {}", context, e))
        }
        _ => LedgerError::Query(format!("{}: {}", context, e)),
    }
}

/// Ledger store backed by the SQLite pool.
#[derive(Clone)]
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a freshly placed order. Used by the order API surface and by
    /// tests; the engine itself never creates orders.
    pub async fn insert_order(&self, order: &Order) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, asset_symbol, asset_name, asset_class,
                order_side, order_type, trigger_price, quantity, status,
                reserved_balance, parent_order_id, bracket_stop_loss_id,
                bracket_target_id, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
            "#,
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(&order.symbol)
        .bind(&order.asset_name)
        .bind(order.asset_class.as_str())
        .bind(order.side.as_str())
        .bind(order.order_type.as_str())
        .bind(order.trigger_price.map(|p| p.value()))
        .bind(order.quantity.value())
        .bind(order.status.as_str())
        .bind(order.reserved_balance)
        .bind(&order.parent_order_id)
        .bind(&order.bracket_stop_loss_id)
        .bind(&order.bracket_target_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to insert order", e))?;

        debug!("Inserted order: {}", order.id);
        Ok(())
    }

    /// Create a profile with an opening cash balance.
    pub async fn create_profile(&self, user_id: &str, cash_balance: f64) -> LedgerResult<()> {
        sqlx::query(
            "INSERT INTO profiles (id, cash_balance, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        )
        .bind(user_id)
        .bind(cash_balance)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to create profile", e))?;

        Ok(())
    }

    /// All transactions for a user, newest first.
    pub async fn list_transactions(&self, user_id: &str) -> LedgerResult<Vec<TransactionRecord>> {
        sqlx::query_as::<_, TransactionRecord>(
            "SELECT * FROM transactions WHERE user_id = ?1 ORDER BY executed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to list transactions", e))
    }
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn list_open_orders(&self) -> LedgerResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT * FROM orders WHERE status IN {} ORDER BY created_at",
            OPEN_STATUSES
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to list open orders", e))?;

        records.into_iter().map(OrderRecord::into_domain).collect()
    }

    async fn get_order(&self, id: &str) -> LedgerResult<Option<Order>> {
        let record = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to get order", e))?;

        record.map(OrderRecord::into_domain).transpose()
    }

    async fn claim_order(&self, id: &str) -> LedgerResult<bool> {
        let rows_affected = sqlx::query(&format!(
            "UPDATE orders SET status = 'triggered', updated_at = ?1 WHERE id = ?2 AND status IN {}",
            OPEN_STATUSES
        ))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to claim order", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn mark_order_filled(&self, id: &str, fill: &OrderFill) -> LedgerResult<bool> {
        let rows_affected = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = 'filled', filled_quantity = ?1, avg_fill_price = ?2,
                filled_at = ?3, transaction_id = ?4, updated_at = ?5
            WHERE id = ?6 AND status IN {}
            "#,
            OPEN_STATUSES
        ))
        .bind(fill.quantity.value())
        .bind(fill.price.value())
        .bind(fill.filled_at)
        .bind(&fill.transaction_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to mark order filled", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn mark_order_failed(&self, id: &str, reason: &str) -> LedgerResult<bool> {
        let rows_affected = sqlx::query(&format!(
            "UPDATE orders SET status = 'failed', failure_reason = ?1, updated_at = ?2 WHERE id = ?3 AND status IN {}",
            OPEN_STATUSES
        ))
        .bind(reason)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to mark order failed", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn cancel_order(&self, id: &str, reason: &str) -> LedgerResult<bool> {
        let now = Utc::now();
        let rows_affected = sqlx::query(&format!(
            r#"
            UPDATE orders
            SET status = 'cancelled', cancellation_reason = ?1, cancelled_at = ?2, updated_at = ?2
            WHERE id = ?3 AND status IN {}
            "#,
            OPEN_STATUSES
        ))
        .bind(reason)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to cancel order", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn get_holding(&self, user_id: &str, symbol: &str) -> LedgerResult<Option<Holding>> {
        let record = sqlx::query_as::<_, HoldingRecord>(
            "SELECT * FROM holdings WHERE user_id = ?1 AND asset_symbol = ?2",
        )
        .bind(user_id)
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to get holding", e))?;

        record.map(HoldingRecord::into_domain).transpose()
    }

    async fn upsert_holding(&self, holding: &HoldingUpsert) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO holdings (
                id, user_id, asset_symbol, asset_name, asset_class,
                quantity, average_price, current_price, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            ON CONFLICT(user_id, asset_symbol) DO UPDATE SET
                quantity = excluded.quantity,
                average_price = excluded.average_price,
                current_price = excluded.current_price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&holding.user_id)
        .bind(&holding.symbol)
        .bind(&holding.asset_name)
        .bind(holding.asset_class.as_str())
        .bind(holding.quantity.value())
        .bind(holding.average_price.value())
        .bind(holding.current_price.value())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to upsert holding", e))?;

        Ok(())
    }

    async fn delete_holding(&self, id: &str) -> LedgerResult<()> {
        sqlx::query("DELETE FROM holdings WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("Failed to delete holding", e))?;

        debug!("Deleted holding: {}", id);
        Ok(())
    }

    async fn get_balance(&self, user_id: &str) -> LedgerResult<f64> {
        let row: Option<(f64,)> =
            sqlx::query_as("SELECT cash_balance FROM profiles WHERE id = ?1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_failed("Failed to get balance", e))?;

        row.map(|(balance,)| balance)
            .ok_or_else(|| LedgerError::ProfileNotFound(user_id.to_string()))
    }

    async fn set_balance_if_unchanged(
        &self,
        user_id: &str,
        expected: f64,
        new_balance: f64,
    ) -> LedgerResult<bool> {
        let rows_affected = sqlx::query(
            "UPDATE profiles SET cash_balance = ?1, updated_at = ?2 WHERE id = ?3 AND cash_balance = ?4",
        )
        .bind(new_balance)
        .bind(Utc::now())
        .bind(user_id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to set balance", e))?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn append_transaction(&self, tx: &NewTransaction) -> LedgerResult<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, asset_symbol, asset_name, asset_class,
                transaction_type, quantity, price_per_unit, total_amount,
                balance_after, executed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&id)
        .bind(&tx.user_id)
        .bind(&tx.symbol)
        .bind(&tx.asset_name)
        .bind(tx.asset_class.as_str())
        .bind(tx.side.as_str())
        .bind(tx.quantity.value())
        .bind(tx.price_per_unit.value())
        .bind(tx.total_amount)
        .bind(tx.balance_after)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| query_failed("Failed to append transaction", e))?;

        Ok(id)
    }
}
