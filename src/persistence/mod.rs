//! Persistence Layer
//!
//! SQLite-backed ledger for the paper-trading engine, with async access
//! via sqlx and inline schema migrations.
//!
//! # Database Schema
//!
//! ## Orders Table
//! Standing and historical orders. `status` is the engine's state machine
//! (`pending`/`triggered` open, `filled`/`cancelled`/`failed` terminal);
//! bracket parents carry both leg ids, legs point back at the parent.
//!
//! ## Holdings Table
//! One row per (user, symbol) position with the volume-weighted average
//! entry price. Rows below the dust threshold are deleted, never stored.
//!
//! ## Profiles Table
//! A single non-negative cash balance per user.
//!
//! ## Transactions Table
//! Append-only record of completed fills; never updated or deleted.

pub mod models;
pub mod repository;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Initialize the database connection pool and run migrations.
///
/// # Arguments
/// - `database_url`: Path to SQLite database file (e.g., "sqlite://data/stonks.db")
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", database_url);

    // Ensure data directory exists
    if let Some(db_path) = database_url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .log_statements(tracing::log::LevelFilter::Debug);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized");

    Ok(pool)
}

/// Run database migrations
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            asset_symbol TEXT NOT NULL,
            asset_name TEXT NOT NULL,
            asset_class TEXT NOT NULL CHECK(asset_class IN ('equity', 'crypto')),
            order_side TEXT NOT NULL CHECK(order_side IN ('buy', 'sell')),
            order_type TEXT NOT NULL CHECK(order_type IN ('stop_loss', 'limit', 'take_profit')),
            trigger_price REAL,
            quantity REAL NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'triggered', 'filled', 'cancelled', 'failed')),
            reserved_balance REAL,
            parent_order_id TEXT,
            bracket_stop_loss_id TEXT,
            bracket_target_id TEXT,
            filled_quantity REAL,
            avg_fill_price REAL,
            filled_at DATETIME,
            transaction_id TEXT,
            failure_reason TEXT,
            cancellation_reason TEXT,
            cancelled_at DATETIME,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create orders table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS holdings (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            asset_symbol TEXT NOT NULL,
            asset_name TEXT NOT NULL,
            asset_class TEXT NOT NULL CHECK(asset_class IN ('equity', 'crypto')),
            quantity REAL NOT NULL,
            average_price REAL NOT NULL,
            current_price REAL,
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, asset_symbol)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create holdings table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            cash_balance REAL NOT NULL CHECK(cash_balance >= 0),
            created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create profiles table: {}", e))
    })?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            asset_symbol TEXT NOT NULL,
            asset_name TEXT NOT NULL,
            asset_class TEXT NOT NULL CHECK(asset_class IN ('equity', 'crypto')),
            transaction_type TEXT NOT NULL CHECK(transaction_type IN ('buy', 'sell')),
            quantity REAL NOT NULL,
            price_per_unit REAL NOT NULL,
            total_amount REAL NOT NULL,
            balance_after REAL NOT NULL,
            executed_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create transactions table: {}", e))
    })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_holdings_user_symbol ON holdings(user_id, asset_symbol)",
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("Database migrations completed");

    Ok(())
}
