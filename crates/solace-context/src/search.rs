//! Semantic-search collaborator.
//!
//! The product's vector store is a remote service; this crate only speaks
//! its search endpoint. A trait seam keeps the enrichment pipeline
//! testable without a network.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use solace_core::config::SearchConfig;
use solace_core::error::{Result, SolaceError};

/// Search service consumed by the enrichment pipeline.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Return up to `limit` results for the query, most relevant first.
    /// Result elements are opaque to the engine.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    limit: usize,
    collection: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// Client for the `POST /vector/search` endpoint.
#[derive(Clone)]
pub struct HttpSearchClient {
    http: reqwest::Client,
    url: String,
    collection: String,
    timeout: Duration,
}

impl HttpSearchClient {
    pub fn new(http: reqwest::Client, config: &SearchConfig) -> Self {
        Self {
            http,
            url: config.search_url.clone(),
            collection: config.collection.clone(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        let request = SearchRequest {
            query,
            limit,
            collection: &self.collection,
        };

        let response = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SolaceError::SearchUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SolaceError::SearchUnavailable(format!(
                "search endpoint returned {status}"
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| SolaceError::SearchUnavailable(e.to_string()))?;
        Ok(body.results)
    }
}

/// In-memory search backend for tests and offline development. Returns
/// a fixed result list, or fails on demand.
#[derive(Default)]
pub struct StaticSearch {
    results: Vec<Value>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl StaticSearch {
    pub fn with_results(results: Vec<Value>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Queries observed so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("queries mutex poisoned").clone()
    }
}

#[async_trait]
impl SearchBackend for StaticSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Value>> {
        self.queries
            .lock()
            .expect("queries mutex poisoned")
            .push(query.to_string());
        if self.fail {
            return Err(SolaceError::SearchUnavailable(
                "static backend configured to fail".to_string(),
            ));
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_request_wire_shape() {
        let request = SearchRequest {
            query: "sleep trouble",
            limit: 5,
            collection: "conversations",
        };
        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["query"], "sleep trouble");
        assert_eq!(v["limit"], 5);
        assert_eq!(v["collection"], "conversations");
    }

    #[test]
    fn test_search_response_tolerates_missing_results() {
        let body: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(body.results.is_empty());
    }

    #[tokio::test]
    async fn test_static_search_records_queries_and_limits() {
        let backend = StaticSearch::with_results(vec![
            json!({"content": "a"}),
            json!({"content": "b"}),
            json!({"content": "c"}),
        ]);
        let results = backend.search("anything", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(backend.queries(), vec!["anything"]);
    }

    #[tokio::test]
    async fn test_static_search_failing() {
        let backend = StaticSearch::failing();
        let err = backend.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SolaceError::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_http_search_unreachable_maps_to_search_unavailable() {
        let client = HttpSearchClient::new(
            reqwest::Client::new(),
            &SearchConfig {
                search_url: "http://127.0.0.1:9/vector/search".to_string(),
                collection: "conversations".to_string(),
                limit: 5,
            },
        );
        let err = client.search("q", 5).await.unwrap_err();
        assert!(matches!(err, SolaceError::SearchUnavailable(_)));
    }
}
