//! Scripted provider for tests.
//!
//! [`FakeProvider`] answers [`ProviderFetch`] calls from a URL -> JSON map and
//! records every URL it was asked for, so tests can assert on remote call
//! counts without a network. With a latency set it also tracks how many
//! requests were in flight at once. Fixture builders produce the provider
//! record shapes the service consumes.

use crate::error::{PokedexError, Result};
use crate::network::{ProviderFetch, QueryParams};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Base URL the fake resolves relative paths against.
pub const FAKE_BASE_URL: &str = "https://pokeapi.test/api/v2";

#[derive(Debug, Clone)]
enum Scripted {
    Json(Value),
    Status(u16),
}

/// In-memory [`ProviderFetch`] with a call log.
#[derive(Debug)]
pub struct FakeProvider {
    base_url: String,
    responses: Mutex<HashMap<String, Scripted>>,
    /// Requested URL and the TLS flag it was requested with.
    calls: Mutex<Vec<(String, bool)>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::with_base_url(FAKE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every answer for `latency` (on the tokio clock).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer `path` (relative or absolute, no query) with `value`.
    pub fn insert(&self, path: &str, value: Value) {
        self.insert_with_params(path, &[], value);
    }

    pub fn insert_with_params(&self, path: &str, params: QueryParams<'_>, value: Value) {
        let url = self.resolve(path, params);
        self.lock_responses().insert(url, Scripted::Json(value));
    }

    /// Answer `path` with an HTTP failure status.
    pub fn fail(&self, path: &str, status: u16) {
        let url = self.resolve(path, &[]);
        self.lock_responses().insert(url, Scripted::Status(status));
    }

    /// Every URL requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|(url, _)| url.clone()).collect())
            .unwrap_or_default()
    }

    /// URLs requested with TLS verification turned off.
    pub fn unverified_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| {
                c.iter()
                    .filter(|(_, verify)| !verify)
                    .map(|(url, _)| url.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Highest number of concurrent requests observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Number of requests whose URL starts with `path` resolved against the base.
    pub fn calls_to(&self, path: &str) -> usize {
        let prefix = self.resolve(path, &[]);
        self.calls().iter().filter(|u| u.starts_with(&prefix)).count()
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, HashMap<String, Scripted>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl ProviderFetch for FakeProvider {
    async fn get_json(
        &self,
        path: &str,
        params: QueryParams<'_>,
        verify_tls: bool,
    ) -> Result<Value> {
        let url = self.resolve(path, params);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.clone(), verify_tls));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.lock_responses().get(&url).cloned();
        match scripted {
            Some(Scripted::Json(value)) => Ok(value),
            Some(Scripted::Status(404)) | None => Err(PokedexError::NotFound { resource: url }),
            Some(Scripted::Status(status)) => Err(PokedexError::Upstream {
                status,
                url,
                message: format!("scripted status {}", status),
            }),
        }
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// `pokemon/{id}` record with official artwork and six stats.
pub fn pokemon_record(id: u32, name: &str, types: &[&str], stats: [u32; 6]) -> Value {
    let stat_names = [
        "hp",
        "attack",
        "defense",
        "special-attack",
        "special-defense",
        "speed",
    ];
    json!({
        "id": id,
        "name": name,
        "height": 7,
        "weight": 69,
        "types": types
            .iter()
            .enumerate()
            .map(|(i, t)| json!({"slot": i + 1, "type": {"name": t, "url": format!("{}/type/{}/", FAKE_BASE_URL, t)}}))
            .collect::<Vec<_>>(),
        "sprites": {
            "front_default": format!("https://img.test/front/{}.png", id),
            "other": {"official-artwork": {"front_default": format!("https://img.test/art/{}.png", id)}}
        },
        "stats": stat_names
            .iter()
            .zip(stats)
            .map(|(n, v)| json!({"base_stat": v, "stat": {"name": n}}))
            .collect::<Vec<_>>(),
        "abilities": [],
        "species": {"name": name, "url": species_url(id)}
    })
}

/// Absolute URL of a species record, as the provider links it.
pub fn species_url(id: u32) -> String {
    format!("{}/pokemon-species/{}/", FAKE_BASE_URL, id)
}

/// Named resource `{name, url}` pointing at `{kind}/{id}/`.
pub fn named(kind: &str, name: &str, id: u32) -> Value {
    json!({"name": name, "url": format!("{}/{}/{}/", FAKE_BASE_URL, kind, id)})
}

/// Minimal `pokemon-species/{id}` record with localized names.
pub fn species_record(id: u32, names: &[(&str, &str)]) -> Value {
    json!({
        "id": id,
        "names": names
            .iter()
            .map(|(text, lang)| json!({"name": text, "language": {"name": lang, "url": ""}}))
            .collect::<Vec<_>>(),
        "flavor_text_entries": [],
        "genera": [],
        "gender_rate": 4
    })
}

/// `type/{name}` record from relation lists `(category, [type names])`.
pub fn type_record(name: &str, relations: &[(&str, &[&str])]) -> Value {
    let mut damage = serde_json::Map::new();
    for category in [
        "double_damage_from",
        "half_damage_from",
        "no_damage_from",
        "double_damage_to",
        "half_damage_to",
        "no_damage_to",
    ] {
        damage.insert(category.to_string(), json!([]));
    }
    for (category, names) in relations {
        let list: Vec<Value> = names
            .iter()
            .map(|n| json!({"name": n, "url": format!("{}/type/{}/", FAKE_BASE_URL, n)}))
            .collect();
        damage.insert((*category).to_string(), Value::Array(list));
    }
    json!({"name": name, "damage_relations": damage})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_answers_and_logs() {
        let fake = FakeProvider::new();
        fake.insert("pokemon/25", json!({"id": 25}));
        fake.fail("pokemon/26", 503);

        let value = fake.get_json("pokemon/25", &[], true).await.unwrap();
        assert_eq!(value["id"], 25);

        let err = fake.get_json("pokemon/26", &[], true).await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(503));

        let err = fake.get_json("pokemon/27", &[], true).await.unwrap_err();
        assert!(matches!(err, PokedexError::NotFound { .. }));

        assert_eq!(fake.call_count(), 3);
        assert_eq!(fake.calls_to("pokemon/25"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fake_tracks_concurrency_and_tls_flag() {
        let fake = FakeProvider::new().with_latency(Duration::from_millis(10));
        fake.insert("pokemon/1", json!({"id": 1}));

        let (a, b) = tokio::join!(
            fake.get_json("pokemon/1", &[], true),
            fake.get_json("pokemon/1", &[], false)
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(fake.peak_in_flight(), 2);
        assert_eq!(fake.unverified_calls(), vec![format!("{}/pokemon/1", FAKE_BASE_URL)]);
    }

    #[tokio::test]
    async fn test_absolute_and_relative_paths_share_keys() {
        let fake = FakeProvider::new();
        fake.insert("pokemon-species/25/", json!({"id": 25}));
        let value = fake.get_json(&species_url(25), &[], true).await.unwrap();
        assert_eq!(value["id"], 25);
    }
}
