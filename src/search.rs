//! Web-search provider client (Brave-style API). One GET per query; each
//! result exposes at least a URL, which the fetch workflow then scrapes and
//! summarizes independently.

use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::error::MagpieError;

pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl SearchClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        SearchClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.search_base_url.clone(),
            config.search_api_key.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )
    }

    /// Run one web search. A missing `web` section counts as zero results.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MagpieError> {
        let response = self
            .http
            .get(format!("{}/res/v1/web/search", self.base_url))
            .query(&[("q", query)])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| MagpieError::Search(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| MagpieError::Search(e.to_string()))?;
        if !status.is_success() {
            return Err(MagpieError::Search(format!("HTTP {status}: {body}")));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| MagpieError::Search(format!("invalid response body: {e}")))?;
        Ok(parsed.web.map(|w| w.results).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> SearchClient {
        SearchClient::new(base_url, "test-token", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn parses_result_urls() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/res/v1/web/search")
            .match_query(mockito::Matcher::UrlEncoded("q".into(), "rust news".into()))
            .match_header("x-subscription-token", "test-token")
            .with_status(200)
            .with_body(
                json!({
                    "web": {
                        "results": [
                            {"url": "https://a.example", "title": "A"},
                            {"url": "https://b.example"},
                        ]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let results = client(&server.url()).search("rust news").await.unwrap();
        mock.assert_async().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://a.example");
        assert_eq!(results[0].title.as_deref(), Some("A"));
        assert_eq!(results[1].url, "https://b.example");
    }

    #[tokio::test]
    async fn missing_web_section_is_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let results = client(&server.url()).search("anything").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_search_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(429)
            .with_body("slow down")
            .create_async()
            .await;

        let err = client(&server.url()).search("q").await.unwrap_err();
        match err {
            MagpieError::Search(msg) => assert!(msg.contains("429")),
            other => panic!("expected Search error, got {other:?}"),
        }
    }
}
