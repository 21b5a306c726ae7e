//! Knowledge-graph store boundary
//!
//! Everything the reconciler sends to or reads from the remote graph
//! service passes through the types in this module:
//!
//! - **GraphEntity**: a named, labeled node with a complete attribute map
//! - **ProjectRelationship**: a subject/predicate/object fact
//! - **GraphStoreClient**: the `search`/`add` surface of the service
//!
//! Two clients ship with the crate: [`HttpGraphStore`] for the real service
//! and [`InMemoryGraphStore`] for tests and offline runs.

mod http;
mod memory;
mod store;
mod types;

pub use http::{HttpGraphStore, HttpGraphStoreBuilder};
pub use memory::InMemoryGraphStore;
pub use store::GraphStoreClient;
pub use types::{
    AddRequest, AttributeValue, Attributes, DataType, GraphEdge, GraphEntity, GraphNode,
    LAST_UPDATED_ATTR, Predicate, ProjectRelationship, SearchFilters, SearchRequest,
    SearchResults, SearchScope, TECHNOLOGIES_ATTR, join_technologies, split_technologies,
};
