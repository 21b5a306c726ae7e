//! Entity reconciliation
//!
//! Decides whether a project needs re-detection, converts the detected
//! state into graph entities and facts, and upserts them without losing
//! previously stored attributes.

mod batch;
mod builder;
mod reconciler;
mod staleness;

pub use batch::{BatchReport, PhaseReport, UpsertBatch};
pub use builder::{
    ORGANIZATION_CONFIDENCE, ORGANIZATION_LABEL, TECHNOLOGY_LABEL, build_entities,
    build_relationships, organization_entity, project_entity, session_subject, technology_entity,
};
pub use reconciler::{EntityReconciler, PerformanceMetrics, SyncOptions, SyncResult};
pub use staleness::{
    DEFAULT_FRESHNESS_HOURS, PROBE_CANDIDATES, PROJECT_LABEL, ProbeOutcome, Staleness,
    StalenessProbe, evaluate,
};
