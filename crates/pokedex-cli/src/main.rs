//! Pokedex CLI - operator harness for pokedex-core.
//!
//! Wires the service from environment settings and prints JSON results on
//! stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pokedex_core::{PokedexService, SearchParams, Settings};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pokedex")]
#[command(about = "Query and cache creature reference data")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// SQLite cache file (defaults to POKEDEX_CACHE_DB, then the user cache dir)
    #[arg(long, global = true)]
    cache_db: Option<PathBuf>,

    /// Force TLS verification on (1) or off (0); defaults to POKEAPI_VERIFY_SSL
    #[arg(long, global = true, value_parser = ["0", "1"])]
    verify: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Base detail, served from cache while fresh
    Detail { code: u32 },

    /// Composite detail with lore, abilities, effectiveness and evolutions
    Full { code: u32 },

    /// Paginated search
    Search {
        #[arg(long)]
        generation: Option<u32>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Copy the provider's type list into the catalog table
    SyncTypes,

    /// Cache counters
    CacheStats,

    /// Delete expired and outdated cache entries
    Purge,

    /// Drop one cached base detail
    Invalidate { code: u32 },
}

fn default_cache_path(settings: &Settings) -> PathBuf {
    if let Some(path) = settings.cache_db_path() {
        return PathBuf::from(path);
    }
    dirs::cache_dir()
        .map(|dir| dir.join("pokedex").join("cache.sqlite3"))
        .unwrap_or_else(|| PathBuf::from("pokedex-cache.sqlite3"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let settings = Settings::from_env();
    let cache_path = args
        .cache_db
        .clone()
        .unwrap_or_else(|| default_cache_path(&settings));
    info!("Cache database: {}", cache_path.display());

    let service = PokedexService::builder(settings)
        .cache_path(&cache_path)
        .build()
        .context("failed to initialize service")?;

    let verify = args.verify.as_deref().map(|v| v == "1");

    let result = match args.command {
        Command::Detail { code } => service
            .get_detail(code, verify)
            .await
            .map(serde_json::to_value),
        Command::Full { code } => service
            .get_full_detail(code, verify)
            .await
            .map(serde_json::to_value),
        Command::Search {
            generation,
            name,
            limit,
            offset,
        } => service
            .search(SearchParams {
                generation,
                name,
                limit,
                offset,
                verify,
            })
            .await
            .map(serde_json::to_value),
        Command::SyncTypes => service
            .sync_types(verify)
            .await
            .map(serde_json::to_value),
        Command::CacheStats => service.cache_stats().map(serde_json::to_value),
        Command::Purge => service
            .purge_stale()
            .map(|purged| Ok(json!({ "purged": purged }))),
        Command::Invalidate { code } => service
            .invalidate(code)
            .map(|removed| Ok(json!({ "code": code, "removed": removed }))),
    };

    match result {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value?)?);
            Ok(())
        }
        Err(e) => {
            let body = json!({"status": e.http_status(), "detail": e.detail()});
            println!("{}", serde_json::to_string_pretty(&body)?);
            Err(e.into())
        }
    }
}
