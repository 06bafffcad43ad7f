// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Region fact lookup for welcome notifications.
//!
//! The fact collaborator owns its own fallback chain (network, then cache,
//! then a generic welcome); callers only bound how long they wait.

use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Text used when no fact is available for a region.
pub fn generic_fact(region: &str) -> String {
    format!("Welcome to {region}!")
}

/// Source of short educational facts keyed by region name.
pub trait FactProvider: Send + Sync {
    fn fetch_fact(&self, region: &str) -> impl Future<Output = Option<String>> + Send;
}

/// Cache of the last fact fetched per region.
pub type FactCache = Arc<DashMap<String, String>>;

#[derive(Deserialize)]
struct FactResponse {
    fact: String,
}

/// Fetches facts from `GET {base}/facts/{region}`.
///
/// Successful responses are cached; on failure the cached fact is reused,
/// and failing that the generic welcome is returned. Never yields `None`.
#[derive(Clone)]
pub struct HttpFactProvider {
    http: reqwest::Client,
    base_url: String,
    cache: FactCache,
}

impl HttpFactProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(DashMap::new()),
        })
    }

    pub fn cached(&self, region: &str) -> Option<String> {
        self.cache.get(region).map(|fact| fact.value().clone())
    }

    async fn fetch_remote(&self, region: &str) -> Result<String, String> {
        let url = format!("{}/facts/{}", self.base_url, urlencoding::encode(region));
        let response = self.http.get(&url).send().await.map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let body: FactResponse = response.json().await.map_err(|e| e.to_string())?;
        let fact = body.fact.trim().to_string();
        if fact.is_empty() {
            return Err("empty fact".to_string());
        }
        Ok(fact)
    }
}

impl FactProvider for HttpFactProvider {
    async fn fetch_fact(&self, region: &str) -> Option<String> {
        match self.fetch_remote(region).await {
            Ok(fact) => {
                self.cache.insert(region.to_string(), fact.clone());
                Some(fact)
            }
            Err(e) => {
                tracing::warn!(region, error = %e, "Fact fetch failed, using fallback");
                Some(self.cached(region).unwrap_or_else(|| generic_fact(region)))
            }
        }
    }
}

/// Facts from a fixed table, optionally slowed down to simulate a sluggish
/// network.
#[derive(Debug, Clone, Default)]
pub struct StaticFactProvider {
    facts: HashMap<String, String>,
    delay: Option<Duration>,
}

impl StaticFactProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fact(mut self, region: &str, fact: &str) -> Self {
        self.facts.insert(region.to_string(), fact.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl FactProvider for StaticFactProvider {
    async fn fetch_fact(&self, region: &str) -> Option<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.facts.get(region).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_lookup() {
        let facts = StaticFactProvider::new().with_fact("Ohio", "Ohio has 88 counties.");
        assert_eq!(
            facts.fetch_fact("Ohio").await.as_deref(),
            Some("Ohio has 88 counties.")
        );
        assert_eq!(facts.fetch_fact("Utah").await, None);
    }

    #[tokio::test]
    async fn test_http_provider_falls_back_when_unreachable() {
        // Port 9 (discard) on localhost: the connection is refused.
        let provider =
            HttpFactProvider::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        assert_eq!(
            provider.fetch_fact("Utah").await.as_deref(),
            Some("Welcome to Utah!")
        );

        provider
            .cache
            .insert("Utah".to_string(), "Utah has five national parks.".to_string());
        assert_eq!(
            provider.fetch_fact("Utah").await.as_deref(),
            Some("Utah has five national parks.")
        );
    }

    #[test]
    fn test_generic_fact() {
        assert_eq!(generic_fact("Ohio"), "Welcome to Ohio!");
    }
}
