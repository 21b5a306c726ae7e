//! Project identity and technology detection boundaries
//!
//! The reconciler consumes two collaborators:
//!
//! - [`ProjectContextProvider`] turns a path into a stable [`ProjectContext`]
//! - [`TechnologyDetector`] reports what a project is built with
//!
//! [`GitContextProvider`] is the bundled provider. Detection heuristics live
//! outside this crate; callers plug in their own detector.

mod context;
mod git;
mod technology;

pub use context::{ContextScope, ProjectContext, ProjectContextProvider};
pub use git::{GitContextProvider, parse_remote, project_id_for};
pub use technology::{
    DEFAULT_CONFIDENCE_THRESHOLD, DetectedTechnology, TechnologyDetectionResult,
    TechnologyDetector,
};
