//! SQLite-backed creature cache.

use super::traits::{is_fresh_at, CacheEntry, CacheStats, CacheWrite, PokemonCache, CACHE_SCHEMA_VERSION};
use crate::error::{PokedexError, Result};
use crate::models::PokemonStats;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// SQLite cache with one row per creature code.
///
/// Thread-safe via internal mutex on the connection; the primary key on
/// `code` makes concurrent upserts of the same code last-writer-wins.
pub struct SqlitePokemonCache {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqlitePokemonCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePokemonCache").finish_non_exhaustive()
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl SqlitePokemonCache {
    /// Open (or create) the cache database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PokedexError::io_with_path(e, parent))?;
        }

        let conn = Connection::open(db_path).map_err(|e| PokedexError::Database {
            message: format!("Failed to open cache database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| PokedexError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| PokedexError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pokemon_cache (
                code INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                types TEXT NOT NULL,
                image_url TEXT NOT NULL,
                stats TEXT,
                schema_version INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_pokemon_cache_updated
                ON pokemon_cache(updated_at);

            CREATE TABLE IF NOT EXISTS pokemon_types (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .map_err(|e| PokedexError::Database {
            message: format!("Failed to initialize cache schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    /// Upsert with an explicit timestamp.
    pub fn upsert_at(&self, write: &CacheWrite<'_>, updated_at: DateTime<Utc>) -> Result<()> {
        let types = serde_json::to_string(write.types)?;
        let stats = write.stats.map(serde_json::to_string).transpose()?;

        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO pokemon_cache (code, name, types, image_url, stats, schema_version, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                types = excluded.types,
                image_url = excluded.image_url,
                stats = excluded.stats,
                schema_version = excluded.schema_version,
                updated_at = excluded.updated_at
            "#,
            params![
                write.code,
                write.name,
                types,
                write.image_url,
                stats,
                CACHE_SCHEMA_VERSION,
                timestamp(updated_at)
            ],
        )
        .map_err(|e| PokedexError::Database {
            message: format!("Failed to upsert cache entry {}: {}", write.code, e),
            source: Some(e),
        })?;

        debug!("Cached pokemon #{} ({})", write.code, write.name);
        Ok(())
    }

    fn row_to_entry(
        code: u32,
        name: String,
        types: String,
        image_url: String,
        stats: Option<String>,
        schema_version: u32,
        updated_at: String,
    ) -> CacheEntry {
        // A row we cannot decode is kept but reads as stale.
        let types: Vec<String> = serde_json::from_str(&types).unwrap_or_default();
        let stats: Option<PokemonStats> = stats.and_then(|s| serde_json::from_str(&s).ok());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        CacheEntry {
            code,
            name,
            types,
            image_url,
            stats,
            schema_version,
            updated_at,
        }
    }
}

impl PokemonCache for SqlitePokemonCache {
    fn get(&self, code: u32) -> Result<Option<CacheEntry>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                r#"
                SELECT code, name, types, image_url, stats, schema_version, updated_at
                FROM pokemon_cache
                WHERE code = ?1
                "#,
                params![code],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, u32>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| PokedexError::Database {
                message: format!("Failed to query cache entry {}: {}", code, e),
                source: Some(e),
            })?;

        Ok(row.map(|(code, name, types, image_url, stats, version, updated_at)| {
            Self::row_to_entry(code, name, types, image_url, stats, version, updated_at)
        }))
    }

    fn upsert(&self, write: &CacheWrite<'_>) -> Result<()> {
        self.upsert_at(write, Utc::now())
    }

    fn invalidate(&self, code: u32) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM pokemon_cache WHERE code = ?1", params![code])
            .map_err(|e| PokedexError::Database {
                message: format!("Failed to invalidate cache entry {}: {}", code, e),
                source: Some(e),
            })?;
        Ok(deleted > 0)
    }

    fn purge_stale(&self, ttl: Duration) -> Result<usize> {
        // A TTL reaching past the representable range leaves nothing expired.
        let cutoff = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|delta| Utc::now().checked_sub_signed(delta))
            .map(timestamp);

        let conn = self.lock()?;
        let deleted = conn
            .execute(
                r#"
                DELETE FROM pokemon_cache
                WHERE (?1 IS NOT NULL AND updated_at <= ?1)
                   OR schema_version < ?2
                   OR stats IS NULL
                "#,
                params![cutoff, CACHE_SCHEMA_VERSION],
            )
            .map_err(|e| PokedexError::Database {
                message: format!("Failed to purge stale entries: {}", e),
                source: Some(e),
            })?;

        if deleted > 0 {
            debug!("Purged {} stale cache entries", deleted);
        }
        Ok(deleted)
    }

    fn ensure_type(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO pokemon_types (name) VALUES (?1)",
                params![name],
            )
            .map_err(|e| PokedexError::Database {
                message: format!("Failed to record type {}: {}", name, e),
                source: Some(e),
            })?;
        Ok(inserted > 0)
    }

    fn stats(&self, ttl: Duration) -> Result<CacheStats> {
        let conn = self.lock()?;
        let now = Utc::now();

        let mut stmt = conn.prepare(
            "SELECT code, name, types, image_url, stats, schema_version, updated_at FROM pokemon_cache",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(Self::row_to_entry(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let known_types: i64 =
            conn.query_row("SELECT COUNT(*) FROM pokemon_types", [], |row| row.get(0))?;

        Ok(CacheStats {
            total_entries: entries.len(),
            fresh_entries: entries.iter().filter(|e| is_fresh_at(e, ttl, now)).count(),
            outdated_schema_entries: entries
                .iter()
                .filter(|e| e.schema_version < CACHE_SCHEMA_VERSION)
                .count(),
            known_types: known_types as usize,
        })
    }
}
