use std::time::Duration;

/// Engine and server configuration.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Delay between the end of one monitoring tick and the start of the next.
    pub poll_interval_secs: u64,
    /// Freshness window for cached prices.
    pub price_cache_ttl_secs: u64,
    /// Per-request timeout for market data lookups.
    pub gateway_timeout_ms: u64,
    /// SQLite database URL.
    pub database_url: String,
    /// Port the REST facade listens on.
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval_secs: 5,
            price_cache_ttl_secs: 5,
            gateway_timeout_ms: 5000,
            database_url: "sqlite://data/stonks.db".to_string(),
            port: 8000,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, keeping defaults for
    /// anything unset or out of range.
    pub fn from_env() -> EngineConfig {
        let mut config = EngineConfig::default();

        if let Ok(interval) = std::env::var("POLL_INTERVAL_SECONDS") {
            match interval.parse::<u64>() {
                Ok(value) if (1..=300).contains(&value) => {
                    config.poll_interval_secs = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid POLL_INTERVAL_SECONDS value: {} (must be between 1 and 300), using default: {}",
                        value, config.poll_interval_secs
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse POLL_INTERVAL_SECONDS '{}': {}, using default: {}",
                        interval,
                        e,
                        config.poll_interval_secs
                    );
                }
            }
        }

        if let Ok(ttl) = std::env::var("PRICE_CACHE_TTL_SECONDS") {
            if let Ok(value) = ttl.parse::<u64>() {
                if (1..=60).contains(&value) {
                    config.price_cache_ttl_secs = value;
                }
            }
        }

        if let Ok(timeout) = std::env::var("GATEWAY_TIMEOUT_MILLISECONDS") {
            if let Ok(value) = timeout.parse::<u64>() {
                if (500..=60_000).contains(&value) {
                    config.gateway_timeout_ms = value;
                }
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.is_empty() {
                config.database_url = url;
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(value) = port.parse::<u16>() {
                config.port = value;
            }
        }

        config
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}
