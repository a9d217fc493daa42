//! Service facade: cache-first detail retrieval, search, the composite
//! aggregator and the type catalog sync.

use crate::cache::{CacheEntry, CacheWrite, PokemonCache, SqlitePokemonCache};
use crate::config::{NetworkConfig, Settings};
use crate::effectiveness::EffectivenessCalculator;
use crate::error::Result;
use crate::evolution::{self, SpeciesLookup};
use crate::localization::{
    pick, pick_name, pick_text, Localizer, TranslationChain, TranslationMemo, Translator,
};
use crate::models::{
    Ability, EvolutionTarget, GenderRatio, PokemonDetail, PokemonPage, SearchParams,
    TypeSyncSummary,
};
use crate::network::{HttpGateway, ProviderFetch};
use crate::normalizer::{normalize_detail, tenths};
use crate::provider::{
    decode, RawAbility, RawAbilitySlot, RawEvolutionChain, RawListPage, RawPokemon, RawSpecies,
};
use crate::search::{DetailLookup, SearchEngine};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Composite section that fell back to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DetailSection {
    Species,
    Ability,
    Translation,
    Evolution,
}

/// A suppressed failure inside a composite response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub section: DetailSection,
    pub message: String,
}

impl Degradation {
    fn new(section: DetailSection, message: impl Into<String>) -> Self {
        Self {
            section,
            message: message.into(),
        }
    }
}

/// Composite detail plus whatever had to be left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullDetail {
    #[serde(flatten)]
    pub detail: PokemonDetail,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<Degradation>,
}

impl FullDetail {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Builder for [`PokedexService`].
///
/// # Example
///
/// ```rust,ignore
/// use pokedex_core::{PokedexService, Settings};
///
/// let service = PokedexService::builder(Settings::from_env())
///     .cache_path("./pokedex-cache.sqlite3")
///     .build()?;
/// let detail = service.get_detail(25, None).await?;
/// ```
pub struct PokedexServiceBuilder {
    settings: Settings,
    fetch: Option<Arc<dyn ProviderFetch>>,
    cache: Option<Arc<dyn PokemonCache>>,
    cache_path: Option<std::path::PathBuf>,
    translators: Option<Vec<Arc<dyn Translator>>>,
    memo: Option<TranslationMemo>,
}

impl PokedexServiceBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            fetch: None,
            cache: None,
            cache_path: None,
            translators: None,
            memo: None,
        }
    }

    /// Provider access. Default: [`HttpGateway`] from settings.
    pub fn fetch(mut self, fetch: Arc<dyn ProviderFetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Cache store. Takes precedence over [`cache_path`](Self::cache_path).
    pub fn cache(mut self, cache: Arc<dyn PokemonCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// SQLite file for the cache.
    ///
    /// Default: `POKEDEX_CACHE_DB` if set, else an in-memory database.
    pub fn cache_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Translation backends in the order they are tried.
    ///
    /// Default: Google, then MyMemory.
    pub fn translators(mut self, translators: Vec<Arc<dyn Translator>>) -> Self {
        self.translators = Some(translators);
        self
    }

    /// Share a memo between services.
    pub fn translation_memo(mut self, memo: TranslationMemo) -> Self {
        self.memo = Some(memo);
        self
    }

    pub fn build(self) -> Result<PokedexService> {
        let settings = self.settings;

        let fetch: Arc<dyn ProviderFetch> = match self.fetch {
            Some(fetch) => fetch,
            None => Arc::new(HttpGateway::from_settings(&settings)?),
        };

        let cache: Arc<dyn PokemonCache> = match self.cache {
            Some(cache) => cache,
            None => {
                let path = self
                    .cache_path
                    .or_else(|| settings.cache_db_path().map(Into::into));
                match path {
                    Some(path) => Arc::new(SqlitePokemonCache::open(path)?),
                    None => Arc::new(SqlitePokemonCache::in_memory()?),
                }
            }
        };

        let memo = self.memo.unwrap_or_default();
        let chain = match self.translators {
            Some(backends) => TranslationChain::new(backends, memo, settings.clone()),
            None => TranslationChain::default_backends(fetch.clone(), memo, settings.clone()),
        };

        Ok(PokedexService {
            effectiveness: EffectivenessCalculator::new(fetch.clone()),
            search: SearchEngine::new(fetch.clone(), settings.clone()),
            localizer: Localizer::new(chain),
            fetch,
            cache,
            settings,
        })
    }
}

/// Entry point for every read operation.
pub struct PokedexService {
    fetch: Arc<dyn ProviderFetch>,
    cache: Arc<dyn PokemonCache>,
    settings: Settings,
    localizer: Localizer,
    effectiveness: EffectivenessCalculator,
    search: SearchEngine,
}

impl PokedexService {
    pub fn builder(settings: Settings) -> PokedexServiceBuilder {
        PokedexServiceBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Base detail for `code`, served from cache while fresh.
    ///
    /// On a miss or stale entry the record is fetched once, normalized,
    /// given a localized name when the species lookup succeeds, and
    /// written back. Provider failures propagate.
    pub async fn get_detail(&self, code: u32, verify: Option<bool>) -> Result<PokemonDetail> {
        let ttl = self.settings.cache_ttl();
        match self.cache.get(code) {
            Ok(Some(entry)) if self.cache.is_fresh(&entry, ttl) => {
                debug!("Cache hit for {}", code);
                return Ok(detail_from_entry(entry));
            }
            Ok(Some(_)) => debug!("Cache entry for {} is stale", code),
            Ok(None) => debug!("Cache miss for {}", code),
            Err(e) => warn!("Cache read failed for {}: {}", code, e),
        }

        let verify = self.settings.resolve_verify(verify);
        let raw = self.fetch_pokemon(code, verify).await?;
        let mut detail = normalize_detail(&raw);

        match self.fetch_species(&raw, verify).await {
            Ok(species) => detail.name = pick_name(&species.names, |n| n.name.as_str(), &raw.name),
            Err(e) => warn!("Keeping provider name for {}: {}", code, e),
        }

        self.store(&detail);
        Ok(detail)
    }

    /// One page of results. Validates `params` first.
    pub async fn search(&self, params: SearchParams) -> Result<PokemonPage> {
        let params = params.validated(&self.settings)?;
        let page = self.search.search(&params, self).await?;
        if page.degraded > 0 {
            warn!("Search page served with {} stubbed items", page.degraded);
        }
        Ok(page)
    }

    /// Composite detail: base record, species lore, abilities,
    /// effectiveness and evolution graph.
    ///
    /// Only the base record fetch can fail the call; every other section
    /// falls back to a default and is reported in `degradations`.
    pub async fn get_full_detail(&self, code: u32, verify: Option<bool>) -> Result<FullDetail> {
        let verify = self.settings.resolve_verify(verify);
        let raw = self.fetch_pokemon(code, verify).await?;

        let mut detail = normalize_detail(&raw);
        let mut degradations = Vec::new();

        detail.height_m = tenths(raw.height);
        detail.weight_kg = tenths(raw.weight);

        let species = match self.fetch_species(&raw, verify).await {
            Ok(species) => Some(species),
            Err(e) => {
                warn!("Species lookup failed for {}: {}", code, e);
                degradations.push(Degradation::new(DetailSection::Species, e.to_string()));
                None
            }
        };

        if let Some(species) = &species {
            self.apply_species(&mut detail, &raw, species, verify, &mut degradations)
                .await;
        }

        let (abilities, ability_degradations) = self.abilities(&raw.abilities, verify).await;
        detail.abilities = Some(abilities);
        degradations.extend(ability_degradations);

        detail.effectiveness = Some(self.effectiveness.compute(&detail.types, verify).await);

        let graph = match species.as_ref().and_then(|s| s.evolution_chain.as_ref()) {
            Some(chain_ref) => match self.fetch_chain(&chain_ref.url, verify).await {
                Ok(chain) => evolution::walk(&chain.chain, self, verify).await,
                Err(e) => {
                    warn!("Evolution chain lookup failed for {}: {}", code, e);
                    degradations.push(Degradation::new(DetailSection::Evolution, e.to_string()));
                    evolution::EvolutionGraph::default()
                }
            },
            None => evolution::EvolutionGraph::default(),
        };
        detail.evolutions = Some(graph.nodes);
        detail.evolution_edges = Some(graph.edges);

        self.store(&detail);

        let full = FullDetail {
            detail,
            degradations,
        };
        if full.is_degraded() {
            info!(
                "Composite detail for {} served with {} degraded sections",
                code,
                full.degradations.len()
            );
        }
        Ok(full)
    }

    /// Copy the provider's type list into the catalog. Idempotent.
    pub async fn sync_types(&self, verify: Option<bool>) -> Result<TypeSyncSummary> {
        let verify = self.settings.resolve_verify(verify);
        let value = self.fetch.get_json("type", &[], verify).await?;
        let listing: RawListPage = decode("type listing", value)?;

        let mut summary = TypeSyncSummary::default();
        for entry in &listing.results {
            if self.cache.ensure_type(&entry.name)? {
                summary.created += 1;
            } else {
                summary.existing += 1;
            }
        }
        summary.count = listing.results.len() as u32;

        info!(
            "Type sync: created={} existing={} count={}",
            summary.created, summary.existing, summary.count
        );
        Ok(summary)
    }

    pub fn cache_stats(&self) -> Result<crate::cache::CacheStats> {
        self.cache.stats(self.settings.cache_ttl())
    }

    /// Drop every entry a detail lookup would refetch: past the configured
    /// TTL, written under an older schema, or missing stats.
    pub fn purge_stale(&self) -> Result<usize> {
        let purged = self.cache.purge_stale(self.settings.cache_ttl())?;
        info!("Purged {} stale cache entries", purged);
        Ok(purged)
    }

    /// Forget the cached base detail for `code`. Returns whether one existed.
    pub fn invalidate(&self, code: u32) -> Result<bool> {
        let removed = self.cache.invalidate(code)?;
        debug!("Invalidated cache entry {}: {}", code, removed);
        Ok(removed)
    }

    async fn fetch_pokemon(&self, code: u32, verify: bool) -> Result<RawPokemon> {
        let path = format!("pokemon/{}", code);
        let value = self.fetch.get_json(&path, &[], verify).await?;
        decode("pokemon", value)
    }

    async fn fetch_species(&self, raw: &RawPokemon, verify: bool) -> Result<RawSpecies> {
        let path = match &raw.species {
            Some(species) if !species.url.is_empty() => species.url.clone(),
            _ => format!("pokemon-species/{}", raw.id),
        };
        let value = self.fetch.get_json(&path, &[], verify).await?;
        decode("pokemon-species", value)
    }

    async fn fetch_chain(&self, url: &str, verify: bool) -> Result<RawEvolutionChain> {
        let value = self.fetch.get_json(url, &[], verify).await?;
        decode("evolution-chain", value)
    }

    /// Name, description, category and gender from the species record.
    async fn apply_species(
        &self,
        detail: &mut PokemonDetail,
        raw: &RawPokemon,
        species: &RawSpecies,
        verify: bool,
        degradations: &mut Vec<Degradation>,
    ) {
        detail.name = pick_name(&species.names, |n| n.name.as_str(), &raw.name);

        let (flavor, translated) = self
            .localizer
            .text(&species.flavor_text_entries, |f| f.flavor_text.as_str(), "", verify)
            .await;
        if translated.is_exhausted() {
            degradations.push(Degradation::new(
                DetailSection::Translation,
                "description left untranslated",
            ));
        }
        detail.description = Some(translated.text);
        detail.description_language = flavor.language;
        detail.description_source = pick(&species.flavor_text_entries)
            .and_then(|f| f.version.as_ref())
            .map(|v| v.name.clone());

        let (_, genus) = self
            .localizer
            .text(&species.genera, |g| g.genus.as_str(), "", verify)
            .await;
        if genus.is_exhausted() {
            degradations.push(Degradation::new(
                DetailSection::Translation,
                "category left untranslated",
            ));
        }
        detail.category = Some(genus.text);

        detail.gender = Some(GenderRatio::from_rate(species.gender_rate));
    }

    /// Abilities in slot order. A failed lookup keeps the provider name with
    /// an empty effect.
    async fn abilities(
        &self,
        slots: &[RawAbilitySlot],
        verify: bool,
    ) -> (Vec<Ability>, Vec<Degradation>) {
        let mut slots: Vec<&RawAbilitySlot> = slots.iter().collect();
        slots.sort_by_key(|s| s.slot);

        let results: Vec<Result<Ability>> = stream::iter(slots.iter())
            .map(|slot| self.ability(slot, verify))
            .buffered(NetworkConfig::MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let mut degradations = Vec::new();
        let abilities = slots
            .iter()
            .zip(results)
            .map(|(slot, result)| match result {
                Ok(ability) => ability,
                Err(e) => {
                    warn!("Ability lookup failed for {}: {}", slot.ability.name, e);
                    degradations.push(Degradation::new(
                        DetailSection::Ability,
                        format!("{}: {}", slot.ability.name, e),
                    ));
                    Ability {
                        name: slot.ability.name.clone(),
                        effect: String::new(),
                        is_hidden: slot.is_hidden,
                    }
                }
            })
            .collect();

        (abilities, degradations)
    }

    async fn ability(&self, slot: &RawAbilitySlot, verify: bool) -> Result<Ability> {
        let path = if slot.ability.url.is_empty() {
            format!("ability/{}", slot.ability.name)
        } else {
            slot.ability.url.clone()
        };
        let value = self.fetch.get_json(&path, &[], verify).await?;
        let record: RawAbility = decode("ability", value)?;

        let name = pick_name(&record.names, |n| n.name.as_str(), &slot.ability.name);
        let effect = if record.effect_entries.is_empty() {
            let picked = pick_text(&record.flavor_text_entries, |f| f.flavor_text.as_str(), "");
            self.translate_picked(picked, verify).await
        } else {
            let picked = pick_text(&record.effect_entries, |e| e.short_effect.as_str(), "");
            self.translate_picked(picked, verify).await
        };

        Ok(Ability {
            name,
            effect,
            is_hidden: slot.is_hidden,
        })
    }

    async fn translate_picked(
        &self,
        picked: crate::localization::LocalizedText,
        verify: bool,
    ) -> String {
        match picked.language.as_deref() {
            Some(language) => {
                self.localizer
                    .chain()
                    .translate(&picked.text, language, verify)
                    .await
                    .text
            }
            None => picked.text,
        }
    }

    /// Write-through after a live fetch; failures only cost a future miss.
    fn store(&self, detail: &PokemonDetail) {
        let write = CacheWrite {
            code: detail.code,
            name: &detail.name,
            types: &detail.types,
            image_url: &detail.image_url,
            stats: detail.stats.as_ref(),
        };
        if let Err(e) = self.cache.upsert(&write) {
            warn!("Cache write failed for {}: {}", detail.code, e);
        }
    }
}

fn detail_from_entry(entry: CacheEntry) -> PokemonDetail {
    PokemonDetail {
        code: entry.code,
        name: entry.name,
        types: entry.types,
        image_url: entry.image_url,
        stats: entry.stats,
        ..PokemonDetail::default()
    }
}

#[async_trait]
impl DetailLookup for PokedexService {
    async fn detail(&self, code: u32, verify_tls: bool) -> Result<PokemonDetail> {
        self.get_detail(code, Some(verify_tls)).await
    }
}

#[async_trait]
impl SpeciesLookup for PokedexService {
    async fn summary(&self, code: u32, verify_tls: bool) -> Result<EvolutionTarget> {
        let detail = self.get_detail(code, Some(verify_tls)).await?;
        Ok(EvolutionTarget {
            code: detail.code,
            name: detail.name,
            image_url: detail.image_url,
            types: detail.types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{keys, StaticSettings};
    use crate::models::PokemonStats;
    use crate::testing::{named, pokemon_record, species_record, FakeProvider};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::time::Duration;

    fn service(fake: &Arc<FakeProvider>, cache: Arc<SqlitePokemonCache>) -> PokedexService {
        let settings = Settings::new(StaticSettings::new().with(keys::TRANSLATION_ENABLED, "0"));
        PokedexService::builder(settings)
            .fetch(fake.clone())
            .cache(cache)
            .translators(Vec::new())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_entry_needs_no_remote_call() {
        let fake = Arc::new(FakeProvider::new());
        let cache = Arc::new(SqlitePokemonCache::in_memory().unwrap());
        let stats = PokemonStats::new(35, 55, 40, 50, 50, 90);
        let types = vec!["electric".to_string()];
        cache
            .upsert_at(
                &CacheWrite {
                    code: 25,
                    name: "Pikachu",
                    types: &types,
                    image_url: "https://img.test/25.png",
                    stats: Some(&stats),
                },
                Utc::now() - chrono::Duration::seconds(10),
            )
            .unwrap();

        let svc = service(&fake, cache);
        let detail = svc.get_detail(25, None).await.unwrap();
        assert_eq!(detail.name, "Pikachu");
        assert_eq!(detail.types, types);
        assert_eq!(detail.image_url, "https://img.test/25.png");
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_localizes_and_stores() {
        let fake = Arc::new(FakeProvider::new());
        fake.insert("pokemon/25", pokemon_record(25, "pikachu", &["electric"], [35, 55, 40, 50, 50, 90]));
        fake.insert(
            "pokemon-species/25/",
            species_record(25, &[("ピカチュウ", "ja"), ("Pikachu", "en")]),
        );
        let cache = Arc::new(SqlitePokemonCache::in_memory().unwrap());
        let svc = service(&fake, cache.clone());

        let detail = svc.get_detail(25, None).await.unwrap();
        assert_eq!(detail.name, "Pikachu");
        assert_eq!(detail.stats.unwrap().total, 320);

        let entry = cache.get(25).unwrap().unwrap();
        assert_eq!(entry.name, "Pikachu");
        assert_eq!(entry.types, vec!["electric"]);
    }

    #[tokio::test]
    async fn test_species_failure_keeps_provider_name() {
        let fake = Arc::new(FakeProvider::new());
        fake.insert("pokemon/25", pokemon_record(25, "pikachu", &["electric"], [35, 55, 40, 50, 50, 90]));
        fake.fail("pokemon-species/25/", 500);
        let svc = service(&fake, Arc::new(SqlitePokemonCache::in_memory().unwrap()));

        let detail = svc.get_detail(25, None).await.unwrap();
        assert_eq!(detail.name, "pikachu");
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let fake = Arc::new(FakeProvider::new());
        fake.fail("pokemon/25", 502);
        let svc = service(&fake, Arc::new(SqlitePokemonCache::in_memory().unwrap()));

        let err = svc.get_detail(25, None).await.unwrap_err();
        assert_eq!(err.http_status(), 502);

        let err = svc.get_detail(99999, None).await.unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn test_sync_types_is_idempotent() {
        let fake = Arc::new(FakeProvider::new());
        fake.insert(
            "type",
            json!({"count": 3, "results": [
                {"name": "normal", "url": ""},
                {"name": "fire", "url": ""},
                {"name": "water", "url": ""}
            ]}),
        );
        let svc = service(&fake, Arc::new(SqlitePokemonCache::in_memory().unwrap()));

        let first = svc.sync_types(None).await.unwrap();
        assert_eq!((first.created, first.existing, first.count), (3, 0, 3));

        let second = svc.sync_types(Some(false)).await.unwrap();
        assert_eq!((second.created, second.existing, second.count), (0, 3, 3));
        assert_eq!(svc.cache_stats().unwrap().known_types, 3);
    }

    #[tokio::test]
    async fn test_purge_and_invalidate_through_service() {
        let fake = Arc::new(FakeProvider::new());
        fake.insert("pokemon/25", pokemon_record(25, "pikachu", &["electric"], [35, 55, 40, 50, 50, 90]));
        let cache = Arc::new(SqlitePokemonCache::in_memory().unwrap());
        let stats = PokemonStats::default();
        let types = vec!["water".to_string()];
        cache
            .upsert_at(
                &CacheWrite {
                    code: 7,
                    name: "squirtle",
                    types: &types,
                    image_url: "",
                    stats: Some(&stats),
                },
                Utc::now() - chrono::Duration::days(2),
            )
            .unwrap();
        let svc = service(&fake, cache.clone());

        svc.get_detail(25, None).await.unwrap();
        assert_eq!(svc.purge_stale().unwrap(), 1);
        assert!(cache.get(7).unwrap().is_none());

        assert!(svc.invalidate(25).unwrap());
        assert!(!svc.invalidate(25).unwrap());

        fake.reset_calls();
        svc.get_detail(25, None).await.unwrap();
        assert_eq!(fake.calls_to("pokemon/25"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ability_lookups_are_bounded() {
        let fake = Arc::new(FakeProvider::new().with_latency(Duration::from_millis(10)));
        let mut record = pokemon_record(25, "pikachu", &["electric"], [35, 55, 40, 50, 50, 90]);
        let slots: Vec<Value> = (1..=12u32)
            .rev()
            .map(|i| json!({"ability": named("ability", &format!("ability-{}", i), i), "is_hidden": false, "slot": i}))
            .collect();
        record["abilities"] = Value::Array(slots);
        fake.insert("pokemon/25", record);
        let svc = service(&fake, Arc::new(SqlitePokemonCache::in_memory().unwrap()));

        let full = svc.get_full_detail(25, None).await.unwrap();
        let names: Vec<String> = full
            .detail
            .abilities
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        let expected: Vec<String> = (1..=12).map(|i| format!("ability-{}", i)).collect();
        assert_eq!(names, expected);
        assert_eq!(fake.calls_to("ability/"), 12);
        assert!(fake.peak_in_flight() <= NetworkConfig::MAX_CONCURRENT_REQUESTS);
    }

    #[tokio::test]
    async fn test_translation_uses_caller_tls_mode() {
        let fake = Arc::new(FakeProvider::new());
        fake.insert("pokemon/25", pokemon_record(25, "pikachu", &["electric"], [35, 55, 40, 50, 50, 90]));
        fake.insert(
            "pokemon-species/25/",
            json!({
                "id": 25,
                "names": [],
                "flavor_text_entries": [
                    {"flavor_text": "Stores electricity.", "language": {"name": "en", "url": ""}}
                ],
                "genera": [],
                "gender_rate": 4
            }),
        );
        let primary = "https://translate.test/single";
        let settings = Settings::new(
            StaticSettings::new()
                .with(keys::TRANSLATION_PRIMARY_URL, primary)
                .with(keys::TRANSLATION_SECONDARY_URL, "https://memory.test/get")
                .with(keys::VERIFY_SSL, "1"),
        );
        let svc = PokedexService::builder(settings)
            .fetch(fake.clone())
            .cache(Arc::new(SqlitePokemonCache::in_memory().unwrap()))
            .build()
            .unwrap();

        svc.get_full_detail(25, Some(false)).await.unwrap();

        let unverified = fake.unverified_calls();
        assert_eq!(unverified.len(), fake.call_count());
        assert!(unverified.iter().any(|url| url.starts_with(primary)));
    }
}
