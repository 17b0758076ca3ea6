//! Web search collaborator used by search-mode chat.

use serde::{Deserialize, Serialize};

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// Errors a search backend may report. Callers treat all of them as
/// "no results".
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search is not configured")]
    NotConfigured,

    #[error("search request failed: {0}")]
    Request(String),
}

/// Trait for web search backends.
///
/// Implementations live in parley-infra (e.g., `SerperSearch`).
pub trait SearchProvider: Send + Sync {
    /// Up to `top_k` results for `query`, best first.
    fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SearchResult>, SearchError>> + Send;
}

/// A search backend that is never configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSearch;

impl SearchProvider for NoSearch {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        Err(SearchError::NotConfigured)
    }
}

/// Splice search snippets into a user message.
///
/// Returns the message unchanged when `results` is empty.
pub fn augment_with_results(message: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return message.to_string();
    }

    let mut out = String::from("Web search results:\n");
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {}\n{}\nSource: {}\n",
            i + 1,
            result.title,
            result.snippet,
            result.link
        ));
    }
    out.push_str("\nUsing the results above where relevant, answer:\n");
    out.push_str(message);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(n: u32) -> SearchResult {
        SearchResult {
            title: format!("Title {n}"),
            link: format!("https://example.com/{n}"),
            snippet: format!("snippet number {n}"),
        }
    }

    #[test]
    fn augmentation_contains_every_snippet() {
        let results = vec![result(1), result(2), result(3)];
        let out = augment_with_results("what is rust?", &results);
        for r in &results {
            assert!(out.contains(&r.snippet));
            assert!(out.contains(&r.link));
        }
        assert!(out.ends_with("what is rust?"));
    }

    #[test]
    fn zero_results_leave_message_unmodified() {
        assert_eq!(augment_with_results("what is rust?", &[]), "what is rust?");
    }

    #[tokio::test]
    async fn no_search_is_not_configured() {
        let err = NoSearch.search("q", 3).await.unwrap_err();
        assert!(matches!(err, SearchError::NotConfigured));
    }
}
