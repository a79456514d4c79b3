//! Chat server selector: a cached, periodically refreshed list of chat
//! server URLs with atomic round-robin assignment.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::model::CHAT_SERVER_REFRESH_SECS;

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    #[serde(alias = "urls", alias = "servers")]
    chat_servers: Vec<String>,
}

struct Cache {
    urls: Vec<String>,
    fetched_at: Option<Instant>,
}

/// Discovers chat server URLs from `discovery_server_url` and hands them out
/// round robin. Concurrent `next()` calls never see overlapping indices —
/// the index is a single atomic counter.
pub struct Selector {
    client: reqwest::Client,
    discovery_url: String,
    cache: RwLock<Cache>,
    index: AtomicUsize,
    refresh_interval: Duration,
}

impl Selector {
    pub fn new(client: reqwest::Client, discovery_url: String) -> Self {
        Self {
            client,
            discovery_url,
            cache: RwLock::new(Cache { urls: Vec::new(), fetched_at: None }),
            index: AtomicUsize::new(0),
            refresh_interval: Duration::from_secs(CHAT_SERVER_REFRESH_SECS),
        }
    }

    /// Returns the next chat server URL, refreshing the cache first if it is
    /// empty or stale.
    pub async fn next(&self) -> Result<String, AppError> {
        self.maybe_refresh().await?;
        let cache = self.cache.read().await;
        if cache.urls.is_empty() {
            return Err(AppError::DiscoveryUnavailable(
                "no chat servers available from discovery".to_string(),
            ));
        }
        let i = self.index.fetch_add(1, Ordering::Relaxed) % cache.urls.len();
        Ok(cache.urls[i].clone())
    }

    async fn maybe_refresh(&self) -> Result<(), AppError> {
        {
            let cache = self.cache.read().await;
            if let Some(fetched_at) = cache.fetched_at {
                if !cache.urls.is_empty() && fetched_at.elapsed() < self.refresh_interval {
                    return Ok(());
                }
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<(), AppError> {
        let urls = self.fetch_urls().await?;
        let mut cache = self.cache.write().await;
        if !urls.is_empty() {
            cache.urls = urls;
        }
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }

    async fn fetch_urls(&self) -> Result<Vec<String>, AppError> {
        let response = self
            .client
            .get(&self.discovery_url)
            .send()
            .await
            .map_err(|e| AppError::DiscoveryUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::DiscoveryUnavailable(format!(
                "discovery server returned {}",
                response.status()
            )));
        }

        let body: DiscoveryResponse = response
            .json()
            .await
            .map_err(|e| AppError::DiscoveryUnavailable(e.to_string()))?;
        Ok(body.chat_servers)
    }
}

pub type SharedSelector = Arc<Selector>;
