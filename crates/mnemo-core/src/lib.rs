//! Mnemo Core Library
//!
//! Project memory for coding assistants. This crate keeps a temporal
//! knowledge graph in step with the projects a developer works on:
//! - Project context resolution (git-aware)
//! - Graph store clients (HTTP service, in-memory)
//! - Entity reconciliation with staleness-gated technology detection
//! - Per-project session gate persisted next to the project

pub mod config;
pub mod error;
pub mod graph;
pub mod project;
pub mod reconcile;
pub mod session;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::graph::{GraphStoreClient, HttpGraphStore, InMemoryGraphStore};
    pub use crate::project::{
        ContextScope, GitContextProvider, ProjectContext, ProjectContextProvider,
        TechnologyDetector,
    };
    pub use crate::reconcile::{EntityReconciler, SyncOptions, SyncResult};
    pub use crate::session::{ProcessingOutcome, SessionCache};
}
