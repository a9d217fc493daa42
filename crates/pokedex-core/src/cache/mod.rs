//! Persisted creature cache.
//!
//! One row per creature code with a TTL-based freshness check. A fresh row
//! stands in for a live provider fetch; a stale or missing row forces one.

mod sqlite;
mod traits;

pub use sqlite::SqlitePokemonCache;
pub use traits::{
    is_fresh_at, CacheEntry, CacheStats, CacheWrite, PokemonCache, CACHE_SCHEMA_VERSION,
};
