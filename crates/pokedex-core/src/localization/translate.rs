//! Best-effort translation through an ordered chain of backends.
//!
//! The chain consults a process-wide memo first, then tries each backend in
//! order. The first success wins and is memoized; when every backend fails
//! the source text comes back unchanged. Translation never fails a request.

use super::is_portuguese;
use crate::config::{Settings, TranslationConfig};
use crate::error::{PokedexError, Result};
use crate::network::ProviderFetch;
use async_trait::async_trait;
use mini_moka::sync::Cache;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A translation backend.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Translate `text` from `source` into `target` (ISO-ish codes).
    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        verify_tls: bool,
    ) -> Result<String>;
}

/// Map provider language tags onto codes translation services accept.
fn service_language(provider_language: &str) -> &str {
    match provider_language {
        "ja-Hrkt" | "roomaji" => "ja",
        "zh-Hant" => "zh-TW",
        "zh-Hans" => "zh-CN",
        other => other,
    }
}

/// Google's public `translate_a/single` endpoint.
pub struct GoogleTranslate {
    fetch: Arc<dyn ProviderFetch>,
    endpoint: String,
}

impl GoogleTranslate {
    pub fn new(fetch: Arc<dyn ProviderFetch>, endpoint: impl Into<String>) -> Self {
        Self {
            fetch,
            endpoint: endpoint.into(),
        }
    }

    /// Response is `[[["chunk", "source chunk", ...], ...], ...]`.
    fn parse(body: &Value) -> Option<String> {
        let chunks = body.get(0)?.as_array()?;
        let text: String = chunks
            .iter()
            .filter_map(|chunk| chunk.get(0).and_then(Value::as_str))
            .collect();
        let text = text.trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl Translator for GoogleTranslate {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        verify_tls: bool,
    ) -> Result<String> {
        let params = [
            ("client", "gtx".to_string()),
            ("sl", service_language(source).to_string()),
            ("tl", target.to_string()),
            ("dt", "t".to_string()),
            ("q", text.to_string()),
        ];
        let body = self
            .fetch
            .get_json(&self.endpoint, &params, verify_tls)
            .await?;

        Self::parse(&body).ok_or_else(|| PokedexError::Other(format!(
            "{} returned no translation",
            self.name()
        )))
    }
}

/// MyMemory's `get` endpoint.
pub struct MyMemoryTranslate {
    fetch: Arc<dyn ProviderFetch>,
    endpoint: String,
}

impl MyMemoryTranslate {
    pub fn new(fetch: Arc<dyn ProviderFetch>, endpoint: impl Into<String>) -> Self {
        Self {
            fetch,
            endpoint: endpoint.into(),
        }
    }

    fn parse(body: &Value) -> Option<String> {
        let status = body.get("responseStatus").and_then(Value::as_u64).unwrap_or(200);
        if status != 200 {
            return None;
        }
        let text = body
            .get("responseData")?
            .get("translatedText")?
            .as_str()?
            .trim();
        // Quota problems come back as a 200 with a warning in the text.
        if text.is_empty() || text.starts_with("MYMEMORY WARNING") {
            return None;
        }
        Some(text.to_string())
    }
}

#[async_trait]
impl Translator for MyMemoryTranslate {
    fn name(&self) -> &'static str {
        "mymemory"
    }

    async fn translate(
        &self,
        text: &str,
        source: &str,
        target: &str,
        verify_tls: bool,
    ) -> Result<String> {
        let target = if target == "pt" { "pt-BR" } else { target };
        let params = [
            ("q", text.to_string()),
            ("langpair", format!("{}|{}", service_language(source), target)),
        ];
        let body = self
            .fetch
            .get_json(&self.endpoint, &params, verify_tls)
            .await?;

        Self::parse(&body).ok_or_else(|| PokedexError::Other(format!(
            "{} returned no translation",
            self.name()
        )))
    }
}

/// Process-scoped memo of `(text, source language) -> translation`.
///
/// Unbounded and never evicted; the vocabulary of flavor texts and ability
/// effects is finite. Clones share the same storage.
#[derive(Clone)]
pub struct TranslationMemo {
    entries: Cache<(String, String), String>,
}

impl Default for TranslationMemo {
    fn default() -> Self {
        Self::new()
    }
}

impl TranslationMemo {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    pub fn get(&self, text: &str, source: &str) -> Option<String> {
        self.entries.get(&(text.to_string(), source.to_string()))
    }

    pub fn insert(&self, text: &str, source: &str, translated: &str) {
        self.entries
            .insert((text.to_string(), source.to_string()), translated.to_string());
    }

    pub fn contains(&self, text: &str, source: &str) -> bool {
        self.get(text, source).is_some()
    }
}

/// Where a [`Translation`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationSource {
    /// Already Portuguese, empty, or translation disabled.
    Unchanged,
    Memo,
    Backend(&'static str),
    /// Every backend failed; text is the original.
    Exhausted,
}

/// Outcome of one translation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub source: TranslationSource,
}

impl Translation {
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            source: TranslationSource::Unchanged,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.source == TranslationSource::Exhausted
    }
}

/// Ordered chain of translation backends sharing one memo.
#[derive(Clone)]
pub struct TranslationChain {
    backends: Vec<Arc<dyn Translator>>,
    memo: TranslationMemo,
    settings: Settings,
}

impl TranslationChain {
    pub fn new(backends: Vec<Arc<dyn Translator>>, memo: TranslationMemo, settings: Settings) -> Self {
        Self {
            backends,
            memo,
            settings,
        }
    }

    /// Google first, MyMemory second, both through `fetch`.
    pub fn default_backends(
        fetch: Arc<dyn ProviderFetch>,
        memo: TranslationMemo,
        settings: Settings,
    ) -> Self {
        let backends: Vec<Arc<dyn Translator>> = vec![
            Arc::new(GoogleTranslate::new(
                fetch.clone(),
                settings.translation_primary_url(),
            )),
            Arc::new(MyMemoryTranslate::new(
                fetch,
                settings.translation_secondary_url(),
            )),
        ];
        Self::new(backends, memo, settings)
    }

    pub fn memo(&self) -> &TranslationMemo {
        &self.memo
    }

    /// Translate `text` (written in `source`) into Portuguese, best effort.
    ///
    /// Backends reach their services with the caller's TLS mode.
    pub async fn translate(&self, text: &str, source: &str, verify_tls: bool) -> Translation {
        if text.trim().is_empty() || is_portuguese(source) || !self.settings.translation_enabled() {
            return Translation::unchanged(text);
        }

        if let Some(hit) = self.memo.get(text, source) {
            debug!("Translation memo hit ({})", source);
            return Translation {
                text: hit,
                source: TranslationSource::Memo,
            };
        }

        for backend in &self.backends {
            match backend
                .translate(text, source, TranslationConfig::TARGET_LANGUAGE, verify_tls)
                .await
            {
                Ok(translated) => {
                    self.memo.insert(text, source, &translated);
                    return Translation {
                        text: translated,
                        source: TranslationSource::Backend(backend.name()),
                    };
                }
                Err(e) => {
                    warn!("Translation backend {} failed: {}", backend.name(), e);
                }
            }
        }

        warn!("All translation backends failed; keeping {} text", source);
        Translation {
            text: text.to_string(),
            source: TranslationSource::Exhausted,
        }
    }
}
