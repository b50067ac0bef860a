pub mod bracket;
pub mod order_executor;
pub mod price_cache;
pub mod trigger;
