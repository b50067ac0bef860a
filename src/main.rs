mod application;
mod config;
mod domain;
mod infrastructure;
mod persistence;
mod task_runner;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::application::services::order_monitor::OrderMonitor;
use crate::config::EngineConfig;
use crate::domain::entities::order::AssetClass;
use crate::domain::repositories::market_data::MarketDataGateway;
use crate::infrastructure::yahoo_client::YahooFinanceClient;
use crate::persistence::repository::SqliteLedgerStore;

/// Watchlist served by the `/top` endpoint.
const TOP_SYMBOLS: [&str; 5] = ["RELIANCE", "TCS", "INFY", "HDFCBANK", "ICICIBANK"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stonks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    info!(
        "Paper trading backend starting (poll every {}s, cache TTL {}s)",
        config.poll_interval_secs, config.price_cache_ttl_secs
    );

    let pool = persistence::init_database(&config.database_url).await?;
    let store = Arc::new(SqliteLedgerStore::new(pool));

    let gateway: Arc<dyn MarketDataGateway> =
        Arc::new(YahooFinanceClient::new(config.gateway_timeout())?);

    // Start the order monitoring engine.
    let monitor = OrderMonitor::new(store.clone(), gateway.clone(), &config);
    let monitor_handle = monitor.spawn();

    let app = Router::new()
        .route("/", get(|| async { "Paper trading backend is running" }))
        .route("/health", get(health_check))
        .route("/price/:symbol", get(get_symbol_price))
        .route("/top", get(get_top_symbols))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(gateway);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    info!("Server started. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Server shutting down gracefully...");

    // Let the in-flight tick finish before exiting.
    monitor_handle.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Liveness probe.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "running" }))
}

/// Latest price for a single NSE equity symbol.
async fn get_symbol_price(
    State(gateway): State<Arc<dyn MarketDataGateway>>,
    Path(symbol): Path<String>,
) -> Json<serde_json::Value> {
    let symbol = symbol.to_uppercase();

    match gateway.fetch_latest_price(&symbol, AssetClass::Equity).await {
        Ok(Some(price)) => Json(serde_json::json!({
            "symbol": symbol,
            "price": price.value(),
        })),
        Ok(None) => Json(serde_json::json!({
            "error": format!("No data for {}", symbol),
        })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}

/// Prices for the fixed large-cap watchlist. Symbols whose lookup fails
/// are omitted rather than failing the response.
async fn get_top_symbols(
    State(gateway): State<Arc<dyn MarketDataGateway>>,
) -> Json<serde_json::Value> {
    let mut stocks = Vec::new();

    for symbol in TOP_SYMBOLS {
        match gateway.fetch_latest_price(symbol, AssetClass::Equity).await {
            Ok(Some(price)) => stocks.push(serde_json::json!({
                "symbol": symbol,
                "price": price.value(),
            })),
            Ok(None) => {}
            Err(e) => error!(symbol, "watchlist price fetch failed: {}", e),
        }
    }

    Json(serde_json::json!({ "stocks": stocks }))
}
