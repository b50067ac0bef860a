//! PriceCache - short-TTL cache of last fetched prices.
//!
//! One entry per (symbol, asset class) pair with outstanding orders, so
//! the map stays small and needs no eviction beyond overwrite-on-refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::entities::order::AssetClass;
use crate::domain::value_objects::price::Price;

/// Time source for freshness checks. Injected so tests can drive expiry
/// deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: Price,
    fetched_at: Instant,
}

/// Process-local price cache with a fixed freshness window.
pub struct PriceCache {
    entries: Mutex<HashMap<(String, AssetClass), CachedPrice>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl PriceCache {
    /// Create a cache with the given freshness window, using the system
    /// clock.
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Return the cached price if its age is below the freshness window.
    pub async fn get(&self, symbol: &str, asset_class: AssetClass) -> Option<Price> {
        let entries = self.entries.lock().await;
        let cached = entries.get(&(symbol.to_string(), asset_class))?;

        let age = self.clock.now().saturating_duration_since(cached.fetched_at);
        if age < self.ttl {
            tracing::debug!(symbol, ?age, "price cache hit");
            Some(cached.price)
        } else {
            None
        }
    }

    /// Record a freshly fetched price, replacing any previous entry.
    pub async fn put(&self, symbol: &str, asset_class: AssetClass, price: Price) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            (symbol.to_string(), asset_class),
            CachedPrice {
                price,
                fetched_at: self.clock.now(),
            },
        );
    }
}
