//! Serper.dev web search client.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use parley_core::search::{SearchError, SearchProvider, SearchResult};

pub const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: usize,
}

#[derive(Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

/// Google results via Serper. Only organic hits are used.
pub struct SerperSearch {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
}

impl SerperSearch {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| SearchError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: SecretString::from(api_key.into()),
            endpoint: SERPER_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(SearchError::NotConfigured);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose_secret())
            .json(&SerperRequest { q: query, num: top_k })
            .send()
            .await
            .map_err(|e| SearchError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Request(format!("search returned status {status}")));
        }

        let body: SerperResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Request(format!("malformed search response: {e}")))?;

        Ok(body
            .organic
            .into_iter()
            .filter(|r| !r.snippet.is_empty())
            .take(top_k)
            .map(|r| SearchResult {
                title: r.title,
                link: r.link,
                snippet: r.snippet,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_returns_top_k_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("X-API-KEY", "serper-key"))
            .and(body_partial_json(json!({"q": "rust async", "num": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "knowledgeGraph": {"title": "ignored"},
                "organic": [
                    {"title": "Tokio", "link": "https://tokio.rs", "snippet": "An async runtime", "position": 1},
                    {"title": "Async book", "link": "https://rust-lang.github.io/async-book", "snippet": "Async in Rust", "position": 2},
                    {"title": "Third", "link": "https://example.com", "snippet": "more", "position": 3}
                ]
            })))
            .mount(&server)
            .await;

        let search = SerperSearch::new("serper-key")
            .unwrap()
            .with_endpoint(format!("{}/search", server.uri()));
        let results = search.search("rust async", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Tokio");
        assert_eq!(results[1].link, "https://rust-lang.github.io/async-book");
    }

    #[tokio::test]
    async fn search_error_status_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let search = SerperSearch::new("bad").unwrap().with_endpoint(server.uri());
        let err = search.search("q", 3).await.unwrap_err();
        assert!(matches!(err, SearchError::Request(_)));
    }

    #[tokio::test]
    async fn blank_key_is_not_configured() {
        let search = SerperSearch::new("  ").unwrap();
        let err = search.search("q", 3).await.unwrap_err();
        assert!(matches!(err, SearchError::NotConfigured));
    }
}
