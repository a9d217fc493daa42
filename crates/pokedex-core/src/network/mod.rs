//! Fetch gateway for the reference-data provider.
//!
//! Every remote call made by the core goes through [`ProviderFetch`]:
//! - Status-based retry with exponential backoff (see [`RetryPolicy`])
//! - Per-call timeout and caller-selected TLS verification
//! - Upstream 404 surfaced as `NotFound`, other failures as `Upstream`

mod gateway;
mod retry;

pub use gateway::{is_retryable_status, HttpGateway, ProviderFetch, QueryParams};
pub use retry::{retry_async, RetryPolicy, RetryStats};
