//! Paginated search over the provider catalog.
//!
//! Three strategies, picked by filter shape:
//! - no filters: the provider's own `pokemon?limit&offset` window
//! - generation (with or without name): the generation's species list
//! - name only: a bounded snapshot of the full listing
//!
//! Filtered strategies filter the whole universe before paging, so `total`
//! is always the filtered population size. Only page members receive a
//! detail fetch; a failed one becomes a name-only stub.

use crate::config::{NetworkConfig, ProviderDefaults, Settings};
use crate::error::Result;
use crate::models::{PokemonDetail, PokemonPage, SearchParams};
use crate::network::ProviderFetch;
use crate::provider::{decode, NamedResource, RawGeneration, RawListPage, RawSpecies};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Source of per-item details for a page.
#[async_trait]
pub trait DetailLookup: Send + Sync {
    async fn detail(&self, code: u32, verify_tls: bool) -> Result<PokemonDetail>;
}

/// One catalog row before enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    code: u32,
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Window,
    Generation(u32),
    Snapshot,
}

impl Strategy {
    fn for_params(params: &SearchParams) -> Self {
        match (params.generation, params.name.is_some()) {
            (Some(generation), _) => Strategy::Generation(generation),
            (None, true) => Strategy::Snapshot,
            (None, false) => Strategy::Window,
        }
    }
}

pub struct SearchEngine {
    fetch: Arc<dyn ProviderFetch>,
    settings: Settings,
}

impl SearchEngine {
    pub fn new(fetch: Arc<dyn ProviderFetch>, settings: Settings) -> Self {
        Self { fetch, settings }
    }

    /// Run one search. `params` must already be validated.
    ///
    /// Fails only when the universe itself (listing, generation) cannot be
    /// loaded; per-item failures degrade to stubs.
    pub async fn search(
        &self,
        params: &SearchParams,
        details: &dyn DetailLookup,
    ) -> Result<PokemonPage> {
        let verify = self.settings.resolve_verify(params.verify);
        let limit = params.page_size();
        let offset = params.offset;
        let strategy = Strategy::for_params(params);
        debug!("Search strategy {:?} (limit={}, offset={})", strategy, limit, offset);

        let (total, window) = match strategy {
            Strategy::Window => self.provider_window(limit, offset, verify).await?,
            Strategy::Generation(generation) => {
                let species = self.generation_species(generation, verify).await?;
                let filtered = filter_by_name(species, params.name.as_deref());
                let total = filtered.len() as u32;
                let coded = self.resolve_codes(filtered, verify).await;
                (total, page_slice(sorted(coded), limit, offset))
            }
            Strategy::Snapshot => {
                let snapshot = self.catalog_snapshot(verify).await?;
                let filtered = filter_by_name(snapshot, params.name.as_deref());
                let total = filtered.len() as u32;
                let coded = filtered
                    .into_iter()
                    .filter_map(|r| r.id().map(|code| Candidate { code, name: r.name }))
                    .collect();
                (total, page_slice(sorted(coded), limit, offset))
            }
        };

        Ok(self.enrich(total, window, details, verify).await)
    }

    async fn provider_window(
        &self,
        limit: u32,
        offset: u32,
        verify: bool,
    ) -> Result<(u32, Vec<Candidate>)> {
        let params = [("limit", limit.to_string()), ("offset", offset.to_string())];
        let value = self.fetch.get_json("pokemon", &params, verify).await?;
        let listing: RawListPage = decode("pokemon listing", value)?;

        let window = listing
            .results
            .into_iter()
            .filter_map(|r| r.id().map(|code| Candidate { code, name: r.name }))
            .collect();
        Ok((listing.count, window))
    }

    async fn generation_species(&self, generation: u32, verify: bool) -> Result<Vec<NamedResource>> {
        let path = format!("generation/{}", generation);
        let value = self.fetch.get_json(&path, &[], verify).await?;
        let record: RawGeneration = decode("generation", value)?;
        Ok(record.pokemon_species)
    }

    async fn catalog_snapshot(&self, verify: bool) -> Result<Vec<NamedResource>> {
        let params = [
            ("limit", ProviderDefaults::CATALOG_SNAPSHOT_SIZE.to_string()),
            ("offset", "0".to_string()),
        ];
        let value = self.fetch.get_json("pokemon", &params, verify).await?;
        let listing: RawListPage = decode("pokemon listing", value)?;
        Ok(listing.results)
    }

    /// Resolve each species name to its code through `pokemon-species/{name}`.
    ///
    /// Falls back to the id in the listing URL; names with neither are
    /// dropped.
    async fn resolve_codes(&self, species: Vec<NamedResource>, verify: bool) -> Vec<Candidate> {
        let codes: Vec<Option<u32>> = stream::iter(species.iter())
            .map(|s| async move {
                let path = format!("pokemon-species/{}", s.name);
                let resolved = self
                    .fetch
                    .get_json(&path, &[], verify)
                    .await
                    .and_then(|value| decode::<RawSpecies>("pokemon-species", value));
                match resolved {
                    Ok(record) if record.id > 0 => Some(record.id),
                    Ok(_) => s.id(),
                    Err(e) => {
                        warn!("Could not resolve species {}: {}", s.name, e);
                        s.id()
                    }
                }
            })
            .buffered(NetworkConfig::MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        species
            .into_iter()
            .zip(codes)
            .filter_map(|(s, code)| code.map(|code| Candidate { code, name: s.name }))
            .collect()
    }

    async fn enrich(
        &self,
        total: u32,
        window: Vec<Candidate>,
        details: &dyn DetailLookup,
        verify: bool,
    ) -> PokemonPage {
        let fetched: Vec<Result<PokemonDetail>> = stream::iter(window.iter())
            .map(|c| details.detail(c.code, verify))
            .buffered(NetworkConfig::MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let mut degraded = 0;
        let results = window
            .into_iter()
            .zip(fetched)
            .map(|(candidate, result)| match result {
                Ok(detail) => detail,
                Err(e) => {
                    warn!("Page item {} degraded to stub: {}", candidate.code, e);
                    degraded += 1;
                    PokemonDetail::stub(
                        candidate.code,
                        candidate.name,
                        self.settings.image_url_for(candidate.code),
                    )
                }
            })
            .collect();

        PokemonPage {
            total,
            results,
            degraded,
        }
    }
}

/// Case-insensitive substring filter; `None` keeps everything.
fn filter_by_name(universe: Vec<NamedResource>, name: Option<&str>) -> Vec<NamedResource> {
    match name {
        Some(needle) => {
            let needle = needle.to_lowercase();
            universe
                .into_iter()
                .filter(|r| r.name.to_lowercase().contains(&needle))
                .collect()
        }
        None => universe,
    }
}

fn sorted(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by_key(|c| c.code);
    candidates
}

/// Exactly `[offset, offset + limit)`, empty past the end.
fn page_slice<T>(items: Vec<T>, limit: u32, offset: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}
