//! Graph store client trait

use async_trait::async_trait;

use crate::error::Result;

use super::types::{AddRequest, SearchRequest, SearchResults};

/// Remote knowledge-graph service
///
/// Node writes are idempotent by name with last-write-wins attributes.
/// Implementations return typed, validated results; any transport failure
/// or malformed response surfaces as a service error.
#[async_trait]
pub trait GraphStoreClient: Send + Sync {
    /// Search nodes or edges
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults>;

    /// Submit a structured entity or a free-text fact
    async fn add(&self, request: &AddRequest) -> Result<()>;
}
