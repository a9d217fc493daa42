//! Pokedex Core - reference-data aggregation and caching for a creature
//! catalog provider.
//!
//! This crate fetches creature, species, ability, type and evolution records
//! from the provider, normalizes them, keeps a persistent cache of base
//! details and assembles localized composite views. It has no HTTP layer of
//! its own: callers map [`PokedexError::http_status`] onto their responses.
//!
//! # Example
//!
//! ```rust,ignore
//! use pokedex_core::{PokedexService, SearchParams, Settings};
//!
//! #[tokio::main]
//! async fn main() -> pokedex_core::Result<()> {
//!     let service = PokedexService::builder(Settings::from_env())
//!         .cache_path("./pokedex-cache.sqlite3")
//!         .build()?;
//!
//!     let page = service
//!         .search(SearchParams {
//!             generation: Some(1),
//!             name: Some("char".into()),
//!             ..SearchParams::default()
//!         })
//!         .await?;
//!     println!("{} matches", page.total);
//!
//!     let full = service.get_full_detail(25, None).await?;
//!     println!("{:?}", full.detail.description);
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod effectiveness;
pub mod error;
pub mod evolution;
pub mod localization;
pub mod models;
pub mod network;
pub mod normalizer;
pub mod provider;
pub mod search;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache::{CacheEntry, CacheStats, PokemonCache, SqlitePokemonCache};
pub use config::{EnvSettings, Settings, SettingsSource, StaticSettings};
pub use error::{PokedexError, Result};
pub use localization::{Localizer, TranslationChain, TranslationMemo, Translator};
pub use models::{
    Ability, EvolutionEdge, EvolutionNode, GenderRatio, PokemonDetail, PokemonPage, PokemonStats,
    SearchParams, TypeEffectiveness, TypeSyncSummary,
};
pub use network::{HttpGateway, ProviderFetch};
pub use service::{Degradation, DetailSection, FullDetail, PokedexService, PokedexServiceBuilder};
