//! In-memory graph store
//!
//! Mirrors the remote service's observable semantics closely enough for
//! tests and offline use:
//!
//! - nodes are keyed by name per user; re-adding replaces the attribute map
//! - identical facts collapse into one edge
//! - search is a case-insensitive substring match on name, summary or fact
//!
//! Failures can be injected per operation.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

use super::store::GraphStoreClient;
use super::types::{
    AddRequest, DataType, GraphEdge, GraphEntity, GraphNode, Predicate, SearchRequest,
    SearchResults, SearchScope,
};

#[derive(Debug, Default)]
struct UserGraph {
    nodes: BTreeMap<String, GraphNode>,
    facts: Vec<String>,
}

/// In-process [`GraphStoreClient`]
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    graphs: RwLock<HashMap<String, UserGraph>>,
    add_log: RwLock<Vec<AddRequest>>,
    search_log: RwLock<Vec<SearchRequest>>,
    fail_search: AtomicBool,
    fail_add: AtomicBool,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `search` fail
    pub fn fail_searches(&self, fail: bool) {
        self.fail_search.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `add` fail
    pub fn fail_adds(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    /// Insert or replace a node directly, bypassing the add log
    pub async fn seed_node(&self, user_id: &str, node: GraphNode) {
        let mut graphs = self.graphs.write().await;
        graphs
            .entry(user_id.to_string())
            .or_default()
            .nodes
            .insert(node.name.clone(), node);
    }

    pub async fn node(&self, user_id: &str, name: &str) -> Option<GraphNode> {
        let graphs = self.graphs.read().await;
        graphs.get(user_id)?.nodes.get(name).cloned()
    }

    pub async fn node_count(&self, user_id: &str) -> usize {
        let graphs = self.graphs.read().await;
        graphs.get(user_id).map(|g| g.nodes.len()).unwrap_or(0)
    }

    pub async fn facts(&self, user_id: &str) -> Vec<String> {
        let graphs = self.graphs.read().await;
        graphs
            .get(user_id)
            .map(|g| g.facts.clone())
            .unwrap_or_default()
    }

    /// Every add request received, in arrival order (including failed ones)
    pub async fn add_log(&self) -> Vec<AddRequest> {
        self.add_log.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.search_log.read().await.len()
    }
}

#[async_trait]
impl GraphStoreClient for InMemoryGraphStore {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        self.search_log.write().await.push(request.clone());
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(Error::Service("injected search failure".to_string()));
        }

        let graphs = self.graphs.read().await;
        let Some(graph) = graphs.get(&request.user_id) else {
            return Ok(SearchResults::default());
        };
        let query = request.query.to_lowercase();

        match request.scope {
            SearchScope::Nodes => {
                let labels = request
                    .search_filters
                    .as_ref()
                    .map(|f| f.node_labels.as_slice())
                    .unwrap_or_default();
                let nodes = graph
                    .nodes
                    .values()
                    .filter(|node| {
                        labels.is_empty() || node.labels.iter().any(|l| labels.contains(l))
                    })
                    .filter(|node| {
                        node.name.to_lowercase().contains(&query)
                            || node.summary.to_lowercase().contains(&query)
                    })
                    .take(request.limit)
                    .cloned()
                    .collect();
                Ok(SearchResults {
                    nodes,
                    edges: Vec::new(),
                })
            }
            SearchScope::Edges => {
                let edges = graph
                    .facts
                    .iter()
                    .filter(|fact| fact.to_lowercase().contains(&query))
                    .take(request.limit)
                    .map(|fact| GraphEdge {
                        uuid: None,
                        name: fact
                            .split_whitespace()
                            .find_map(Predicate::parse)
                            .map(|p| p.as_str().to_string())
                            .unwrap_or_default(),
                        fact: fact.clone(),
                        source_node_uuid: None,
                        target_node_uuid: None,
                    })
                    .collect();
                Ok(SearchResults {
                    nodes: Vec::new(),
                    edges,
                })
            }
        }
    }

    async fn add(&self, request: &AddRequest) -> Result<()> {
        self.add_log.write().await.push(request.clone());
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Error::Service("injected add failure".to_string()));
        }

        let mut graphs = self.graphs.write().await;
        let graph = graphs.entry(request.user_id.clone()).or_default();

        match request.data_type {
            DataType::Json => {
                let entity: GraphEntity = serde_json::from_str(&request.data)
                    .map_err(|e| Error::Service(format!("unparseable entity payload: {}", e)))?;
                graph.nodes.insert(entity.name.clone(), entity.into());
            }
            DataType::Text => {
                if !graph.facts.contains(&request.data) {
                    graph.facts.push(request.data.clone());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::ProjectRelationship;

    #[tokio::test]
    async fn test_readd_overwrites_attributes() {
        let store = InMemoryGraphStore::new();
        let first = GraphEntity::new("widget", "widget project")
            .with_attribute("technologies", "Rust")
            .with_attribute("owner", "acme");
        let second = GraphEntity::new("widget", "widget project").with_attribute("technologies", "Go");

        store.add(&AddRequest::entity("u", &first).unwrap()).await.unwrap();
        store.add(&AddRequest::entity("u", &second).unwrap()).await.unwrap();

        let node = store.node("u", "widget").await.unwrap();
        assert_eq!(node.technologies(), vec!["Go"]);
        assert!(node.attribute("owner").is_none());
        assert_eq!(store.node_count("u").await, 1);
    }

    #[tokio::test]
    async fn test_identical_facts_collapse() {
        let store = InMemoryGraphStore::new();
        let rel = ProjectRelationship::new("dev", Predicate::WorksOn, "widget");
        store.add(&AddRequest::fact("u", &rel)).await.unwrap();
        store.add(&AddRequest::fact("u", &rel)).await.unwrap();

        assert_eq!(store.facts("u").await, vec!["dev WORKS_ON widget"]);
        assert_eq!(store.add_log().await.len(), 2);
    }

    #[tokio::test]
    async fn test_search_filters_by_label_and_limit() {
        let store = InMemoryGraphStore::new();
        store
            .seed_node("u", GraphEntity::new("widget", "widget project").with_labels(["Location"]).into())
            .await;
        store
            .seed_node("u", GraphEntity::new("widget-lib", "library").with_labels(["Technology"]).into())
            .await;

        let found = store
            .search(&SearchRequest::nodes("u", "WIDGET", 10).with_node_labels(["Location"]))
            .await
            .unwrap();
        assert_eq!(found.nodes.len(), 1);
        assert_eq!(found.nodes[0].name, "widget");

        let found = store.search(&SearchRequest::nodes("u", "widget", 1)).await.unwrap();
        assert_eq!(found.nodes.len(), 1);

        let other_user = store.search(&SearchRequest::nodes("v", "widget", 10)).await.unwrap();
        assert!(other_user.nodes.is_empty());
    }

    #[tokio::test]
    async fn test_edge_search_reports_predicate() {
        let store = InMemoryGraphStore::new();
        let rel = ProjectRelationship::new("widget", Predicate::Uses, "Rust");
        store.add(&AddRequest::fact("u", &rel)).await.unwrap();

        let found = store.search(&SearchRequest::edges("u", "widget", 5)).await.unwrap();
        assert_eq!(found.edges.len(), 1);
        assert_eq!(found.edges[0].name, "USES");
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryGraphStore::new();
        store.fail_searches(true);
        store.fail_adds(true);

        assert!(store.search(&SearchRequest::nodes("u", "x", 1)).await.is_err());
        let rel = ProjectRelationship::new("a", Predicate::Uses, "b");
        assert!(store.add(&AddRequest::fact("u", &rel)).await.is_err());
        assert!(store.facts("u").await.is_empty());
        assert_eq!(store.search_count().await, 1);
    }
}
