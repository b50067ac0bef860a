//! Market Data Gateway Trait
//!
//! Narrow contract over the external price provider. The engine only ever
//! asks for a single latest price; everything about the provider's ticker
//! conventions and transport lives behind this seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::order::AssetClass;
use crate::domain::value_objects::price::Price;

/// Errors from the market data provider.
///
/// A missing symbol is NOT an error: `fetch_latest_price` returns
/// `Ok(None)` so the caller can skip that symbol and keep processing the
/// rest of the tick.
#[derive(Debug, Clone, Error)]
pub enum MarketDataError {
    #[error("Provider request failed: {0}")]
    RequestFailed(String),

    #[error("Provider response could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("Provider request timed out")]
    Timeout,
}

/// Fetches the latest traded price for a symbol.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Resolve `symbol` to the provider's ticker convention for the asset
    /// class and return its latest price, or `None` if the provider has no
    /// data for it.
    async fn fetch_latest_price(
        &self,
        symbol: &str,
        asset_class: AssetClass,
    ) -> Result<Option<Price>, MarketDataError>;
}
