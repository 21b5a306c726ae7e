//! HTTP graph store client
//!
//! Talks to a REST knowledge-graph service:
//! - `POST {base}/graph/search` with a [`SearchRequest`] body
//! - `POST {base}/graph` with an [`AddRequest`] body
//!
//! Search responses are validated into typed [`SearchResults`] here so the
//! rest of the crate never handles loosely shaped JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GraphConfig;
use crate::error::{Error, Result};

use super::store::GraphStoreClient;
use super::types::{
    AddRequest, AttributeValue, Attributes, GraphEdge, GraphNode, SearchRequest, SearchResults,
};

/// Longest response excerpt carried into an error message
const ERROR_BODY_LIMIT: usize = 200;

/// Graph store client over HTTP
#[derive(Clone)]
pub struct HttpGraphStore {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for HttpGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGraphStore")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for creating an HttpGraphStore
#[derive(Default)]
pub struct HttpGraphStoreBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

impl HttpGraphStoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<HttpGraphStore> {
        let defaults = GraphConfig::default();
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Config("graph API key is required".to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(
                self.timeout_secs.unwrap_or(defaults.timeout_secs),
            ))
            .build()
            .map_err(Error::Network)?;

        Ok(HttpGraphStore {
            http_client,
            base_url: self
                .base_url
                .unwrap_or(defaults.base_url)
                .trim_end_matches('/')
                .to_string(),
            api_key,
        })
    }
}

impl HttpGraphStore {
    pub fn builder() -> HttpGraphStoreBuilder {
        HttpGraphStoreBuilder::new()
    }

    /// Build a client from configuration, taking the key from the environment
    pub fn from_config(config: &GraphConfig) -> Result<Self> {
        let api_key = config
            .resolved_api_key()
            .map_err(|e| Error::Config(e.to_string()))?
            .ok_or_else(|| {
                Error::Config("MNEMO_API_KEY is not set in the environment".to_string())
            })?;

        Self::builder()
            .base_url(config.base_url.clone())
            .api_key(api_key)
            .timeout_secs(config.timeout_secs)
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Graph store request");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Graph store request failed");
            return Err(Error::Service(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                path,
                excerpt(&text)
            )));
        }

        Ok(text)
    }
}

#[async_trait]
impl GraphStoreClient for HttpGraphStore {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        let body = self.post("/graph/search", request).await?;
        parse_search_response(&body)
    }

    async fn add(&self, request: &AddRequest) -> Result<()> {
        self.post("/graph", request).await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct RawSearchResponse {
    #[serde(default)]
    nodes: Option<Vec<RawNode>>,
    #[serde(default)]
    edges: Option<Vec<RawEdge>>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    uuid: Option<String>,
    name: Option<String>,
    summary: Option<String>,
    labels: Option<Vec<String>>,
    attributes: Option<serde_json::Value>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    uuid: Option<String>,
    name: Option<String>,
    fact: Option<String>,
    source_node_uuid: Option<String>,
    target_node_uuid: Option<String>,
}

/// Validate a search response body into typed results
pub(crate) fn parse_search_response(body: &str) -> Result<SearchResults> {
    if body.trim().is_empty() {
        return Err(Error::Service("empty search response".to_string()));
    }

    let raw: RawSearchResponse = serde_json::from_str(body)
        .map_err(|e| Error::Service(format!("malformed search response: {}", e)))?;

    let nodes = raw
        .nodes
        .unwrap_or_default()
        .into_iter()
        .map(validate_node)
        .collect::<Result<Vec<_>>>()?;
    let edges = raw
        .edges
        .unwrap_or_default()
        .into_iter()
        .map(validate_edge)
        .collect::<Result<Vec<_>>>()?;

    Ok(SearchResults { nodes, edges })
}

fn validate_node(raw: RawNode) -> Result<GraphNode> {
    let name = raw
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| Error::Service("search returned a node without a name".to_string()))?;

    let attributes = match raw.attributes {
        None | Some(serde_json::Value::Null) => Attributes::new(),
        Some(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| AttributeValue::from_json(v).map(|v| (k, v)))
            .collect(),
        Some(other) => {
            return Err(Error::Service(format!(
                "node '{}' has non-object attributes: {}",
                name,
                excerpt(&other.to_string())
            )));
        }
    };

    let created_at = raw.created_at.and_then(|ts| {
        chrono::DateTime::parse_from_rfc3339(&ts)
            .ok()
            .map(|ts| ts.with_timezone(&chrono::Utc))
    });

    Ok(GraphNode {
        uuid: raw.uuid,
        name,
        summary: raw.summary.unwrap_or_default(),
        labels: raw.labels.unwrap_or_default(),
        attributes,
        created_at,
    })
}

fn validate_edge(raw: RawEdge) -> Result<GraphEdge> {
    let fact = raw
        .fact
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| Error::Service("search returned an edge without a fact".to_string()))?;

    Ok(GraphEdge {
        uuid: raw.uuid,
        name: raw.name.unwrap_or_default(),
        fact,
        source_node_uuid: raw.source_node_uuid,
        target_node_uuid: raw.target_node_uuid,
    })
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= ERROR_BODY_LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(ERROR_BODY_LIMIT).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nodes_with_attributes() {
        let body = r#"{
            "nodes": [{
                "uuid": "n-1",
                "name": "widget",
                "summary": "widget project",
                "labels": ["Entity", "Location"],
                "attributes": {"technologies": "Rust,tokio", "technologyCount": 2, "extra": null},
                "created_at": "2025-01-02T03:04:05Z"
            }]
        }"#;
        let results = parse_search_response(body).unwrap();
        assert_eq!(results.nodes.len(), 1);
        assert!(results.edges.is_empty());

        let node = &results.nodes[0];
        assert_eq!(node.name, "widget");
        assert_eq!(node.technologies(), vec!["Rust", "tokio"]);
        assert_eq!(
            node.attribute("technologyCount"),
            Some(&AttributeValue::Integer(2))
        );
        assert!(node.attribute("extra").is_none());
        assert!(node.created_at.is_some());
    }

    #[test]
    fn test_parse_edges() {
        let body = r#"{"edges": [{"name": "USES", "fact": "widget USES Rust"}]}"#;
        let results = parse_search_response(body).unwrap();
        assert_eq!(results.edges[0].fact, "widget USES Rust");
    }

    #[test]
    fn test_absent_collections_are_empty() {
        let results = parse_search_response("{}").unwrap();
        assert_eq!(results, SearchResults::default());
    }

    #[test]
    fn test_invalid_shapes_are_service_errors() {
        for body in [
            "",
            "not json",
            r#"{"nodes": [{"summary": "nameless"}]}"#,
            r#"{"nodes": [{"name": "x", "attributes": [1, 2]}]}"#,
            r#"{"edges": [{"name": "USES"}]}"#,
        ] {
            let err = parse_search_response(body).unwrap_err();
            assert!(err.is_service(), "expected service error for {body:?}");
        }
    }

    #[test]
    fn test_builder_requires_key() {
        assert!(HttpGraphStore::builder().build().is_err());
        let store = HttpGraphStore::builder()
            .api_key("k")
            .base_url("http://localhost:8000/api/")
            .build()
            .unwrap();
        assert_eq!(store.base_url(), "http://localhost:8000/api");
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(500);
        assert_eq!(excerpt(&long).len(), ERROR_BODY_LIMIT + 3);
        assert_eq!(excerpt("short"), "short");
    }
}
