//! Staleness probe for project nodes
//!
//! Detection scans a whole tree, so before running it the reconciler asks
//! the store whether the project node was refreshed recently. Any doubt
//! (missing node, missing or unparseable timestamp, no exact match among
//! the candidates, failed query) resolves to stale.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::graph::{GraphNode, GraphStoreClient, SearchRequest};
use crate::project::ProjectContext;

/// Default freshness window for project nodes
pub const DEFAULT_FRESHNESS_HOURS: i64 = 24;

/// Label carried by every project node
pub const PROJECT_LABEL: &str = "Location";

/// Candidates requested per probe; search is ranked, not exact
pub const PROBE_CANDIDATES: usize = 10;

/// Why a project node is (or is not) considered stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Updated within the freshness window
    Fresh,
    /// Updated, but longer ago than the window
    Expired,
    /// No matching node in the store
    MissingNode,
    /// Node exists without a readable `lastUpdated`
    MissingTimestamp,
    /// Every returned candidate had a different name and the result was full
    Unresolved,
    /// The store query itself failed
    ProbeFailed,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        !matches!(self, Self::Fresh)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Expired => "expired",
            Self::MissingNode => "missing_node",
            Self::MissingTimestamp => "missing_timestamp",
            Self::Unresolved => "unresolved",
            Self::ProbeFailed => "probe_failed",
        }
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of probing the store for a project node
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub staleness: Staleness,
    /// The matching node, when one was found
    pub existing: Option<GraphNode>,
}

impl ProbeOutcome {
    pub fn is_stale(&self) -> bool {
        self.staleness.is_stale()
    }

    /// Whether the store's current state for the project is known
    pub fn is_known(&self) -> bool {
        !matches!(
            self.staleness,
            Staleness::ProbeFailed | Staleness::Unresolved
        )
    }
}

/// Classify a node against the freshness window
pub fn evaluate(node: Option<&GraphNode>, now: DateTime<Utc>, window: Duration) -> Staleness {
    let Some(node) = node else {
        return Staleness::MissingNode;
    };
    match node.last_updated() {
        Some(updated) if now - updated >= window => Staleness::Expired,
        Some(_) => Staleness::Fresh,
        None => Staleness::MissingTimestamp,
    }
}

/// Looks up a project's node and judges its freshness
pub struct StalenessProbe {
    store: Arc<dyn GraphStoreClient>,
    user_id: String,
    window: Duration,
}

impl StalenessProbe {
    pub fn new(store: Arc<dyn GraphStoreClient>, user_id: impl Into<String>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            window: Duration::hours(DEFAULT_FRESHNESS_HOURS),
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Probe the store; never fails
    ///
    /// Only a node named exactly like the project counts. When none of the
    /// candidates match and the store returned a full page, the node may
    /// still exist further down the ranking, so the state is unresolved.
    pub async fn probe(&self, context: &ProjectContext) -> ProbeOutcome {
        let request =
            SearchRequest::nodes(&self.user_id, &context.project_name, PROBE_CANDIDATES)
                .with_node_labels([PROJECT_LABEL]);

        let candidates = match self.store.search(&request).await {
            Ok(results) => results.nodes,
            Err(e) => {
                warn!(
                    project_id = %context.project_id,
                    error = %e,
                    "Staleness probe failed, assuming stale"
                );
                return ProbeOutcome {
                    staleness: Staleness::ProbeFailed,
                    existing: None,
                };
            }
        };

        let page_full = candidates.len() >= PROBE_CANDIDATES;
        let existing = candidates
            .into_iter()
            .find(|node| node.name == context.project_name);

        let staleness = if existing.is_none() && page_full {
            warn!(
                project_id = %context.project_id,
                candidates = PROBE_CANDIDATES,
                "No exact project node among search candidates"
            );
            Staleness::Unresolved
        } else {
            evaluate(existing.as_ref(), Utc::now(), self.window)
        };
        debug!(
            project_id = %context.project_id,
            staleness = %staleness,
            "Staleness probe complete"
        );

        ProbeOutcome {
            staleness,
            existing,
        }
    }

    pub async fn is_stale(&self, context: &ProjectContext) -> bool {
        self.probe(context).await.is_stale()
    }
}
