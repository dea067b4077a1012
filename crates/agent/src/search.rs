//! Web search adapter
//!
//! [`GoogleSearch`] talks to the Custom Search JSON API. [`WebSearch`] wraps
//! any [`SearchProvider`] with query sanitizing and the simpler-query
//! fallbacks, and never fails: every problem ends in an empty list.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const GOOGLE_CSE_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// Longest query sent to the provider, in characters
pub const MAX_QUERY_CHARS: usize = 100;

/// Provider cap on results per request
pub const MAX_RESULTS_PER_REQUEST: usize = 10;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search is not configured (missing GOOGLE_API_KEY or CSE_ID)")]
    NotConfigured,

    #[error("search provider rejected the query: {0}")]
    InvalidArgument(String),

    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// One raw search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Google Custom Search JSON API
pub struct GoogleSearch {
    client: reqwest::Client,
    api_key: Option<String>,
    cse_id: Option<String>,
    base_url: String,
}

impl GoogleSearch {
    pub fn new(api_key: Option<String>, cse_id: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()),
            cse_id: cse_id.filter(|c| !c.is_empty()),
            base_url: GOOGLE_CSE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.cse_id.is_some()
    }
}

#[async_trait]
impl SearchProvider for GoogleSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>, SearchError> {
        let (Some(key), Some(cx)) = (&self.api_key, &self.cse_id) else {
            return Err(SearchError::NotConfigured);
        };
        let num = count.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("key", key.as_str()), ("cx", cx.as_str()), ("q", query), ("num", num.as_str())])
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            if body["error"]["status"] == "INVALID_ARGUMENT" {
                return Err(SearchError::InvalidArgument(message));
            }
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let hits = body["items"]
            .as_array()
            .map(|items| items.iter().map(hit_from_item).collect())
            .unwrap_or_default();
        Ok(hits)
    }
}

fn hit_from_item(item: &Value) -> SearchHit {
    let field = |name: &str, fallback: &str| {
        item[name]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    SearchHit {
        title: field("title", "No title available"),
        link: field("link", "#"),
        snippet: field("snippet", "No snippet available"),
    }
}

/// Replace punctuation with spaces, trim, and cap the length
pub fn sanitize_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.trim().chars().take(MAX_QUERY_CHARS).collect()
}

fn first_words(query: &str, n: usize) -> String {
    query.split_whitespace().take(n).collect::<Vec<_>>().join(" ")
}

/// Search with degrade-to-simpler-query fallbacks
#[derive(Clone)]
pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearch {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Ordered results, or an empty list when nothing could be found.
    ///
    /// An empty answer for a long multi-word query is retried once with its
    /// first three words; a rejected query is retried once with its first
    /// word.
    pub async fn search(&self, query: &str, count: usize) -> Vec<SearchHit> {
        let count = count.clamp(1, MAX_RESULTS_PER_REQUEST);
        let sanitized = sanitize_query(query);
        if sanitized.is_empty() {
            error!("◆ search query is empty after sanitizing: {:?}", query);
            return Vec::new();
        }
        if sanitized.chars().count() < query.chars().count() {
            debug!(
                "◆ query trimmed from {} to {} characters",
                query.chars().count(),
                sanitized.chars().count()
            );
        }

        info!("◆ searching for \"{}\"", sanitized);
        match self.provider.search(&sanitized, count).await {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => {
                if sanitized.contains(' ') && sanitized.chars().count() > 30 {
                    let simpler = first_words(&sanitized, 3);
                    info!("◆ no results, trying simpler query \"{}\"", simpler);
                    self.attempt(&simpler, count).await
                } else {
                    info!("◆ no results for \"{}\"", sanitized);
                    Vec::new()
                }
            }
            Err(SearchError::InvalidArgument(message)) => {
                let minimal = first_words(&sanitized, 1);
                warn!(
                    "◆ query rejected ({}), retrying with \"{}\"",
                    message, minimal
                );
                self.attempt(&minimal, count).await
            }
            Err(e) => {
                error!("◆ search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn attempt(&self, query: &str, count: usize) -> Vec<SearchHit> {
        match self.provider.search(query, count).await {
            Ok(hits) => hits,
            Err(e) => {
                error!("◆ fallback search failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query("  nginx: 502 (bad gateway)?  "), "nginx  502  bad gateway");
        assert_eq!(sanitize_query("ufw_allow"), "ufw_allow");
        assert_eq!(sanitize_query("!!!"), "");

        let long = "a".repeat(150);
        assert_eq!(sanitize_query(&long).len(), MAX_QUERY_CHARS);
    }

    #[test]
    fn test_first_words() {
        assert_eq!(first_words("how to  configure ufw firewall", 3), "how to configure");
        assert_eq!(first_words("ufw", 3), "ufw");
    }

    #[test]
    fn test_hit_defaults() {
        let hit = hit_from_item(&serde_json::json!({ "title": "" }));
        assert_eq!(hit.title, "No title available");
        assert_eq!(hit.link, "#");
        assert_eq!(hit.snippet, "No snippet available");
    }

    #[tokio::test]
    async fn test_unconfigured_google_search() {
        let search = GoogleSearch::new(None, Some("cx".to_string()));
        assert!(!search.is_configured());
        assert!(matches!(
            search.search("q", 5).await,
            Err(SearchError::NotConfigured)
        ));
    }
}
