//! Cache store trait and record types.

use crate::error::Result;
use crate::models::PokemonStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Layout version of cached records. Rows written by an older layout are
/// treated as stale and refreshed through the normal miss path.
pub const CACHE_SCHEMA_VERSION: u32 = 2;

/// One persisted creature record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub code: u32,
    pub name: String,
    pub types: Vec<String>,
    pub image_url: String,
    /// Absent on rows written before stats were cached.
    pub stats: Option<PokemonStats>,
    pub schema_version: u32,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age relative to `now`; negative ages (clock skew) count as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.updated_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Fields written by an upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheWrite<'a> {
    pub code: u32,
    pub name: &'a str,
    pub types: &'a [String],
    pub image_url: &'a str,
    pub stats: Option<&'a PokemonStats>,
}

/// Counters for the cache table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
    pub outdated_schema_entries: usize,
    pub known_types: usize,
}

/// Persisted creature cache keyed by code.
///
/// All operations are synchronous to match rusqlite's API. Implementations
/// must keep exactly one entry per code.
pub trait PokemonCache: Send + Sync {
    /// Entry for `code`, fresh or not.
    fn get(&self, code: u32) -> Result<Option<CacheEntry>>;

    /// Create or replace the entry for `write.code`, refreshing `updated_at`.
    fn upsert(&self, write: &CacheWrite<'_>) -> Result<()>;

    /// Remove the entry for `code`.
    fn invalidate(&self, code: u32) -> Result<bool>;

    /// Drop entries older than `ttl` or written by an older layout.
    fn purge_stale(&self, ttl: Duration) -> Result<usize>;

    /// Record a type name in the catalog; returns whether it was new.
    fn ensure_type(&self, name: &str) -> Result<bool>;

    /// Counters relative to `ttl`.
    fn stats(&self, ttl: Duration) -> Result<CacheStats>;

    /// Fresh iff `now - updated_at < ttl` and the row uses the current layout.
    fn is_fresh(&self, entry: &CacheEntry, ttl: Duration) -> bool {
        is_fresh_at(entry, ttl, Utc::now())
    }
}

/// Freshness check against an explicit clock.
pub fn is_fresh_at(entry: &CacheEntry, ttl: Duration, now: DateTime<Utc>) -> bool {
    entry.schema_version >= CACHE_SCHEMA_VERSION
        && entry.stats.is_some()
        && entry.age(now) < ttl
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(age_secs: i64, schema_version: u32) -> CacheEntry {
        CacheEntry {
            code: 25,
            name: "pikachu".into(),
            types: vec!["electric".into()],
            image_url: "img".into(),
            stats: Some(PokemonStats::new(35, 55, 40, 50, 50, 90)),
            schema_version,
            updated_at: Utc::now() - chrono::Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_fresh_within_ttl() {
        let ttl = Duration::from_secs(86_400);
        assert!(is_fresh_at(&entry(10, CACHE_SCHEMA_VERSION), ttl, Utc::now()));
        assert!(!is_fresh_at(&entry(90_000, CACHE_SCHEMA_VERSION), ttl, Utc::now()));
    }

    #[test]
    fn test_ttl_boundary_is_stale() {
        let e = entry(0, CACHE_SCHEMA_VERSION);
        let now = e.updated_at + chrono::Duration::seconds(60);
        assert!(!is_fresh_at(&e, Duration::from_secs(60), now));
        assert!(is_fresh_at(&e, Duration::from_secs(61), now));
    }

    #[test]
    fn test_old_layout_is_stale() {
        let ttl = Duration::from_secs(86_400);
        assert!(!is_fresh_at(&entry(10, 1), ttl, Utc::now()));

        let mut e = entry(10, CACHE_SCHEMA_VERSION);
        e.stats = None;
        assert!(!is_fresh_at(&e, ttl, Utc::now()));
    }
}
