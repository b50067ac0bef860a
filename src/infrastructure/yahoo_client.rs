//! Yahoo Finance market data client.
//!
//! Fetches the latest traded price through the public chart API. NSE
//! equities resolve with the `.NS` exchange suffix, crypto symbols quote
//! against INR (`-INR`).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::entities::order::AssetClass;
use crate::domain::repositories::market_data::{MarketDataError, MarketDataGateway};
use crate::domain::value_objects::price::Price;

const YAHOO_API_BASE: &str = "https://query1.finance.yahoo.com";

/// Chart API response envelope.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
}

/// Resolve a ledger symbol to the provider's ticker convention.
pub fn provider_ticker(symbol: &str, asset_class: AssetClass) -> String {
    match asset_class {
        AssetClass::Equity => format!("{}.NS", symbol),
        AssetClass::Crypto => format!("{}-INR", symbol),
    }
}

/// Yahoo Finance client for price lookups.
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

impl YahooFinanceClient {
    /// Create a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            base_url: YAHOO_API_BASE.to_string(),
        })
    }

    /// Create a client pointed at an alternate base URL (for tests).
    pub fn with_base_url(timeout: Duration, base_url: &str) -> Result<Self, String> {
        let mut client = Self::new(timeout)?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }
}

#[async_trait]
impl MarketDataGateway for YahooFinanceClient {
    async fn fetch_latest_price(
        &self,
        symbol: &str,
        asset_class: AssetClass,
    ) -> Result<Option<Price>, MarketDataError> {
        let ticker = provider_ticker(symbol, asset_class);
        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1m",
            self.base_url, ticker
        );

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout
            } else {
                MarketDataError::RequestFailed(e.to_string())
            }
        })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(symbol, %ticker, "provider has no data for symbol");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(MarketDataError::RequestFailed(format!(
                "provider returned {} for {}",
                response.status(),
                ticker
            )));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::MalformedResponse(e.to_string()))?;

        let price = body
            .chart
            .result
            .and_then(|mut results| results.pop())
            .and_then(|r| r.meta.regular_market_price);

        match price {
            Some(value) => {
                let price = Price::new(value).map_err(MarketDataError::MalformedResponse)?;
                debug!(symbol, %ticker, price = %price, "fetched latest price");
                Ok(Some(price))
            }
            None => {
                warn!(symbol, %ticker, "provider response carried no price");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equity_ticker_gets_nse_suffix() {
        assert_eq!(provider_ticker("RELIANCE", AssetClass::Equity), "RELIANCE.NS");
        assert_eq!(provider_ticker("TCS", AssetClass::Equity), "TCS.NS");
    }

    #[test]
    fn test_crypto_ticker_quotes_against_inr() {
        assert_eq!(provider_ticker("BTC", AssetClass::Crypto), "BTC-INR");
    }

    #[test]
    fn test_chart_response_parsing() {
        let json = r#"
        {
            "chart": {
                "result": [
                    { "meta": { "regularMarketPrice": 2514.35, "symbol": "RELIANCE.NS" } }
                ],
                "error": null
            }
        }
        "#;
        let parsed: ChartResponse = serde_json::from_str(json).unwrap();
        let price = parsed.chart.result.unwrap()[0].meta.regular_market_price;
        assert_eq!(price, Some(2514.35));
    }

    #[test]
    fn test_chart_response_without_result() {
        let json = r#"{ "chart": { "result": null, "error": { "code": "Not Found" } } }"#;
        let parsed: ChartResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.chart.result.is_none());
    }
}
