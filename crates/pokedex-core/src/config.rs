//! Centralized configuration for the pokedex core.
//!
//! Constant tables live on unit structs. Runtime settings are plain
//! key/value strings behind [`SettingsSource`]; [`Settings`] resolves them
//! into typed values on every call and silently falls back to defaults when
//! a value cannot be parsed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
    /// Retries after the first attempt.
    pub const MAX_RETRIES: u32 = 3;
    pub const BACKOFF_FACTOR: Duration = Duration::from_millis(500);
    pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
    pub const USER_AGENT: &'static str = "pokedex-core/0.3";
    /// Upper bound on provider requests one fan-out keeps in flight.
    pub const MAX_CONCURRENT_REQUESTS: usize = 8;
}

/// Defaults for provider-facing settings.
pub struct ProviderDefaults;

impl ProviderDefaults {
    pub const BASE_URL: &'static str = "https://pokeapi.co/api/v2";
    pub const IMAGE_BASE_URL: &'static str =
        "https://raw.githubusercontent.com/PokeAPI/sprites/master/sprites/pokemon/other/official-artwork";
    pub const CACHE_TTL_SECS: u64 = 86_400;
    pub const VERIFY_TLS: bool = true;
    /// Size of the catalog snapshot used for name-only searches.
    pub const CATALOG_SNAPSHOT_SIZE: u32 = 1000;
    pub const TYPE_NAMES: [&'static str; 18] = [
        "normal", "fire", "water", "electric", "grass", "ice", "fighting", "poison", "ground",
        "flying", "psychic", "bug", "rock", "ghost", "dragon", "dark", "steel", "fairy",
    ];
}

/// Pagination limits.
pub struct PaginationConfig;

impl PaginationConfig {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;
}

/// Translation defaults.
pub struct TranslationConfig;

impl TranslationConfig {
    pub const TARGET_LANGUAGE: &'static str = "pt";
    pub const PRIMARY_URL: &'static str = "https://translate.googleapis.com/translate_a/single";
    pub const SECONDARY_URL: &'static str = "https://api.mymemory.translated.net/get";
    /// Language preference used when picking localized entries.
    pub const PREFERRED_LANGUAGES: [&'static str; 4] = ["pt-BR", "pt", "es", "en"];
}

/// Setting keys understood by [`Settings`].
pub mod keys {
    pub const PROVIDER_BASE: &str = "POKEAPI_BASE";
    pub const IMAGE_BASE: &str = "POKEMON_IMAGE_BASE";
    pub const CACHE_TTL: &str = "POKEMON_CACHE_TTL";
    pub const VERIFY_SSL: &str = "POKEAPI_VERIFY_SSL";
    pub const TRANSLATION_ENABLED: &str = "TRANSLATION_ENABLED";
    pub const TRANSLATION_PRIMARY_URL: &str = "TRANSLATION_PRIMARY_URL";
    pub const TRANSLATION_SECONDARY_URL: &str = "TRANSLATION_SECONDARY_URL";
    pub const DEFAULT_LIMIT: &str = "DEFAULT_POKEMON_LIMIT";
    pub const MAX_LIMIT: &str = "MAX_POKEMON_LIMIT";
    pub const CACHE_DB: &str = "POKEDEX_CACHE_DB";
}

/// Source of raw key/value settings.
pub trait SettingsSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads settings from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed settings, mostly for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticSettings(HashMap<String, String>);

impl StaticSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

impl SettingsSource for StaticSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

/// Typed view over a [`SettingsSource`].
#[derive(Clone)]
pub struct Settings {
    source: Arc<dyn SettingsSource>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("provider_base_url", &self.provider_base_url())
            .field("cache_ttl", &self.cache_ttl())
            .field("translation_enabled", &self.translation_enabled())
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Settings {
    pub fn new(source: impl SettingsSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn from_env() -> Self {
        Self::new(EnvSettings)
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.source
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match self.raw(key) {
            Some(value) => value.parse().unwrap_or_else(|_| {
                warn!("Ignoring malformed setting {}={:?}, using default", key, value);
                default
            }),
            None => default,
        }
    }

    pub fn provider_base_url(&self) -> String {
        self.raw(keys::PROVIDER_BASE)
            .unwrap_or_else(|| ProviderDefaults::BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn image_base_url(&self) -> String {
        self.raw(keys::IMAGE_BASE)
            .unwrap_or_else(|| ProviderDefaults::IMAGE_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// Deterministic artwork URL for a code, used for degraded page items.
    pub fn image_url_for(&self, code: u32) -> String {
        format!("{}/{}.png", self.image_base_url(), code)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.parsed(keys::CACHE_TTL, ProviderDefaults::CACHE_TTL_SECS))
    }

    pub fn verify_tls_default(&self) -> bool {
        match self.raw(keys::VERIFY_SSL) {
            Some(value) => value == "1",
            None => ProviderDefaults::VERIFY_TLS,
        }
    }

    /// Explicit override, then environment default, then verify.
    pub fn resolve_verify(&self, verify_override: Option<bool>) -> bool {
        verify_override.unwrap_or_else(|| self.verify_tls_default())
    }

    pub fn translation_enabled(&self) -> bool {
        match self.raw(keys::TRANSLATION_ENABLED) {
            Some(value) => !matches!(
                value.to_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            ),
            None => true,
        }
    }

    pub fn translation_primary_url(&self) -> String {
        self.raw(keys::TRANSLATION_PRIMARY_URL)
            .unwrap_or_else(|| TranslationConfig::PRIMARY_URL.to_string())
    }

    pub fn translation_secondary_url(&self) -> String {
        self.raw(keys::TRANSLATION_SECONDARY_URL)
            .unwrap_or_else(|| TranslationConfig::SECONDARY_URL.to_string())
    }

    pub fn max_limit(&self) -> u32 {
        self.parsed(keys::MAX_LIMIT, PaginationConfig::MAX_LIMIT).max(1)
    }

    pub fn default_limit(&self) -> u32 {
        self.parsed(keys::DEFAULT_LIMIT, PaginationConfig::DEFAULT_LIMIT)
            .clamp(1, self.max_limit())
    }

    pub fn cache_db_path(&self) -> Option<String> {
        self.raw(keys::CACHE_DB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_settings() {
        let settings = Settings::new(StaticSettings::new());
        assert_eq!(settings.provider_base_url(), ProviderDefaults::BASE_URL);
        assert_eq!(settings.cache_ttl(), Duration::from_secs(86_400));
        assert!(settings.verify_tls_default());
        assert!(settings.translation_enabled());
        assert_eq!(settings.default_limit(), 20);
        assert_eq!(settings.max_limit(), 100);
    }

    #[test]
    fn test_malformed_ttl_falls_back() {
        let settings = Settings::new(StaticSettings::new().with(keys::CACHE_TTL, "one day"));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(86_400));

        let settings = Settings::new(StaticSettings::new().with(keys::CACHE_TTL, "60"));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_verify_resolution_order() {
        let settings = Settings::new(StaticSettings::new().with(keys::VERIFY_SSL, "0"));
        assert!(!settings.resolve_verify(None));
        assert!(settings.resolve_verify(Some(true)));

        let settings = Settings::new(StaticSettings::new());
        assert!(settings.resolve_verify(None));
        assert!(!settings.resolve_verify(Some(false)));
    }

    #[test]
    fn test_translation_toggle() {
        for off in ["0", "false", "OFF", "no"] {
            let settings =
                Settings::new(StaticSettings::new().with(keys::TRANSLATION_ENABLED, off));
            assert!(!settings.translation_enabled(), "{} should disable", off);
        }
        let settings = Settings::new(StaticSettings::new().with(keys::TRANSLATION_ENABLED, "1"));
        assert!(settings.translation_enabled());
    }

    #[test]
    fn test_image_url_template() {
        let settings =
            Settings::new(StaticSettings::new().with(keys::IMAGE_BASE, "https://img.test/art/"));
        assert_eq!(settings.image_url_for(25), "https://img.test/art/25.png");
    }

    #[test]
    fn test_type_table_has_eighteen_entries() {
        assert_eq!(ProviderDefaults::TYPE_NAMES.len(), 18);
    }
}
