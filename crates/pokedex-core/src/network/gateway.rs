//! HTTP gateway to the provider.
//!
//! Wraps reqwest with:
//! - One client per TLS mode, selected per call
//! - Configurable per-attempt timeout
//! - Status-based retry (transport errors and timeouts are not retried)

use super::retry::{retry_async, RetryPolicy};
use crate::config::{NetworkConfig, Settings};
use crate::error::{PokedexError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Query string pairs appended to a request.
pub type QueryParams<'a> = &'a [(&'a str, String)];

/// Capability to fetch one JSON record from the provider.
///
/// `path` is either relative to the provider base URL (`pokemon/25`) or an
/// absolute URL; the provider links related records by absolute URL.
#[async_trait]
pub trait ProviderFetch: Send + Sync {
    async fn get_json(&self, path: &str, params: QueryParams<'_>, verify_tls: bool)
        -> Result<Value>;

    /// Base URL relative paths are resolved against.
    fn base_url(&self) -> &str;

    /// Resolve `path` and `params` into the URL that would be requested.
    fn resolve(&self, path: &str, params: QueryParams<'_>) -> String {
        build_url(self.base_url(), path, params)
    }
}

/// Check whether a provider status is worth another attempt.
pub fn is_retryable_status(status: u16) -> bool {
    NetworkConfig::RETRYABLE_STATUSES.contains(&status)
}

/// Only provider answers with a retryable status are attempted again.
pub(crate) fn should_retry(err: &PokedexError) -> bool {
    matches!(err, PokedexError::Upstream { status, .. } if is_retryable_status(*status))
}

/// Join `path` onto `base` (unless already absolute) and append `params`.
pub(crate) fn build_url(base: &str, path: &str, params: QueryParams<'_>) -> String {
    let mut url = if url::Url::parse(path).is_ok() {
        path.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    };

    if !params.is_empty() {
        let query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query.join("&"));
    }

    url
}

/// Retrying reqwest-backed gateway.
pub struct HttpGateway {
    base_url: String,
    verified: Client,
    unverified: Client,
    policy: RetryPolicy,
    timeout: Duration,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpGateway {
    /// Create a gateway with the default timeout and retry policy.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_policy(base_url, RetryPolicy::default(), NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a gateway pointed at the configured provider.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.provider_base_url())
    }

    pub fn with_policy(
        base_url: impl Into<String>,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self> {
        let build = |verify: bool| {
            Client::builder()
                .timeout(timeout)
                .user_agent(NetworkConfig::USER_AGENT)
                .danger_accept_invalid_certs(!verify)
                .build()
                .map_err(|e| PokedexError::Config {
                    message: format!("Failed to create HTTP client: {}", e),
                })
        };

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            verified: build(true)?,
            unverified: build(false)?,
            policy,
            timeout,
        })
    }

    /// Per-attempt timeout applied by both clients.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn get_once(&self, url: &str, verify_tls: bool) -> Result<Value> {
        let client = if verify_tls {
            &self.verified
        } else {
            &self.unverified
        };

        let response = client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                PokedexError::Timeout(self.timeout)
            } else {
                PokedexError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    cause: Some(e.to_string()),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| PokedexError::Json {
                message: format!("Failed to parse provider response from {}: {}", url, e),
                source: None,
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(PokedexError::NotFound {
                resource: url.to_string(),
            });
        }

        Err(PokedexError::Upstream {
            status: status.as_u16(),
            url: url.to_string(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        })
    }
}

#[async_trait]
impl ProviderFetch for HttpGateway {
    async fn get_json(
        &self,
        path: &str,
        params: QueryParams<'_>,
        verify_tls: bool,
    ) -> Result<Value> {
        let url = self.resolve(path, params);
        debug!("GET {}", url);

        let (result, stats) =
            retry_async(&self.policy, || self.get_once(&url, verify_tls), should_retry).await;

        if stats.attempts > 1 {
            debug!("GET {} finished after {} attempts", url, stats.attempts);
        }
        result
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
