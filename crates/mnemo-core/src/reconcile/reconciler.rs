//! Entity reconciler
//!
//! Orchestrates one project sync:
//!
//! 1. Resolve the project context
//! 2. Probe the store for the existing project node
//! 3. Run technology detection when forced or stale (unless skipped)
//! 4. Build entities and relationships
//! 5. Submit them as a two-phase batch
//!
//! `sync` always returns a [`SyncResult`]; failures are reported in it.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{Error, Result};
use crate::graph::{GraphEntity, GraphStoreClient, ProjectRelationship};
use crate::project::{
    ContextScope, DEFAULT_CONFIDENCE_THRESHOLD, ProjectContext, ProjectContextProvider,
    TechnologyDetectionResult, TechnologyDetector,
};

use super::batch::UpsertBatch;
use super::builder::{build_entities, build_relationships};
use super::staleness::{DEFAULT_FRESHNESS_HOURS, Staleness, StalenessProbe};

/// Options for a single sync
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Never run detection, regardless of staleness
    pub skip_tech_detection: bool,
    /// Run detection even when the stored node is fresh
    pub force_update: bool,
    /// Minimum confidence passed to the detector
    pub confidence_threshold: f64,
    /// Assert a session → project fact for this session
    pub session_id: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            skip_tech_detection: false,
            force_update: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            session_id: None,
        }
    }
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with the configured confidence threshold
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::default().with_confidence_threshold(config.confidence_threshold)
    }

    pub fn skip_tech_detection(mut self) -> Self {
        self.skip_tech_detection = true;
        self
    }

    pub fn force_update(mut self) -> Self {
        self.force_update = true;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Timing breakdown of a sync, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub detection_time_ms: u64,
    pub creation_time_ms: u64,
    pub total_time_ms: u64,
}

/// Outcome of [`EntityReconciler::sync`]
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub success: bool,
    pub project: Option<ProjectContext>,
    pub project_entity: Option<GraphEntity>,
    pub relationships: Vec<ProjectRelationship>,
    /// Technologies from this detection, or the stored list when detection did not run
    pub technologies: Vec<String>,
    pub technologies_detected: usize,
    pub entities_written: usize,
    pub facts_written: usize,
    pub detection_ran: bool,
    pub staleness: Option<Staleness>,
    pub performance: PerformanceMetrics,
    pub error: Option<String>,
}

impl SyncResult {
    fn failure(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            performance: PerformanceMetrics {
                total_time_ms: elapsed_ms,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}

/// Reconciles a project's detected state into the graph store
pub struct EntityReconciler {
    provider: Arc<dyn ProjectContextProvider>,
    detector: Arc<dyn TechnologyDetector>,
    store: Arc<dyn GraphStoreClient>,
    user_id: String,
    freshness: Duration,
}

impl EntityReconciler {
    pub fn new(
        provider: Arc<dyn ProjectContextProvider>,
        detector: Arc<dyn TechnologyDetector>,
        store: Arc<dyn GraphStoreClient>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            detector,
            store,
            user_id: user_id.into(),
            freshness: Duration::hours(DEFAULT_FRESHNESS_HOURS),
        }
    }

    /// Apply the freshness window from configuration
    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.freshness = Duration::hours(config.freshness_hours.max(1));
        self
    }

    pub fn with_freshness(mut self, window: Duration) -> Self {
        self.freshness = window;
        self
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Sync a project with a fresh context scope
    pub async fn sync(&self, path: &Path, options: &SyncOptions) -> SyncResult {
        let mut scope = ContextScope::new();
        self.sync_in_scope(&mut scope, path, options).await
    }

    /// Sync a project, reusing contexts already resolved in `scope`
    pub async fn sync_in_scope(
        &self,
        scope: &mut ContextScope,
        path: &Path,
        options: &SyncOptions,
    ) -> SyncResult {
        let started = Instant::now();
        info!(path = %path.display(), "Syncing project");

        match self.try_sync(scope, path, options, started).await {
            Ok(result) => {
                if result.success {
                    info!(
                        project = %result.project.as_ref().map(|p| p.project_name.as_str()).unwrap_or_default(),
                        technologies = result.technologies_detected,
                        entities = result.entities_written,
                        facts = result.facts_written,
                        total_ms = result.performance.total_time_ms,
                        "Project synced"
                    );
                }
                result
            }
            Err(e) => {
                warn!(path = %path.display(), code = e.code(), error = %e, "Project sync failed");
                SyncResult::failure(e.to_string(), elapsed_ms(started))
            }
        }
    }

    async fn try_sync(
        &self,
        scope: &mut ContextScope,
        path: &Path,
        options: &SyncOptions,
        started: Instant,
    ) -> Result<SyncResult> {
        let context = scope
            .resolve(self.provider.as_ref(), path)
            .await
            .map_err(into_detection_error)?;

        let probe = StalenessProbe::new(self.store.clone(), self.user_id.clone())
            .with_window(self.freshness);
        let outcome = probe.probe(&context).await;

        let should_detect = !options.skip_tech_detection
            && (options.force_update || outcome.is_stale());
        debug!(
            project_id = %context.project_id,
            staleness = %outcome.staleness,
            skip = options.skip_tech_detection,
            force = options.force_update,
            detect = should_detect,
            "Detection decision"
        );

        let detection_started = Instant::now();
        let detection = if should_detect {
            Some(self.detect(&context, options.confidence_threshold).await?)
        } else {
            None
        };
        let detection_time_ms = if should_detect {
            elapsed_ms(detection_started)
        } else {
            0
        };

        // Without a detection the stored attributes are the only full copy;
        // rewriting the node blind would drop them.
        if detection.is_none() && !outcome.is_known() {
            return Err(Error::Service(
                format!(
                    "project node state is unknown ({}) and no detection ran; refusing to overwrite it",
                    outcome.staleness
                ),
            ));
        }

        let creation_started = Instant::now();
        let now = Utc::now();
        let existing = outcome.existing.as_ref();
        let entities = build_entities(&context, existing, detection.as_ref(), now);
        let relationships = build_relationships(
            &self.user_id,
            &context,
            detection.as_ref(),
            options.session_id.as_deref(),
        );
        let project_entity = entities.first().cloned();

        let technologies = match &detection {
            Some(detection) => detection.names(),
            None => existing.map(|node| node.technologies()).unwrap_or_default(),
        };

        let batch = UpsertBatch::new(entities, relationships);
        let report = batch.submit(self.store.as_ref(), &self.user_id).await;
        let creation_time_ms = elapsed_ms(creation_started);

        let entities_written = report.entities.written;
        let facts_written = report.facts.written;
        let error = report.into_result().err().map(|e| e.to_string());

        Ok(SyncResult {
            success: error.is_none(),
            project: Some(context),
            project_entity,
            technologies_detected: technologies.len(),
            technologies,
            relationships: batch.relationships,
            entities_written,
            facts_written,
            detection_ran: detection.is_some(),
            staleness: Some(outcome.staleness),
            performance: PerformanceMetrics {
                detection_time_ms,
                creation_time_ms,
                total_time_ms: elapsed_ms(started),
            },
            error,
        })
    }

    async fn detect(
        &self,
        context: &ProjectContext,
        threshold: f64,
    ) -> Result<TechnologyDetectionResult> {
        let result = self
            .detector
            .detect_technologies(&context.project_path, threshold)
            .await
            .map_err(into_detection_error)?;

        debug!(
            project_id = %context.project_id,
            count = result.technologies.len(),
            overall_confidence = result.overall_confidence,
            "Technologies detected"
        );
        Ok(result)
    }
}

fn into_detection_error(error: Error) -> Error {
    if error.is_detection() {
        error
    } else {
        Error::Detection(error.to_string())
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SyncOptions::default();
        assert!(!options.skip_tech_detection);
        assert!(!options.force_update);
        assert_eq!(options.confidence_threshold, 0.6);
        assert!(options.session_id.is_none());
    }

    #[test]
    fn test_option_builders() {
        let options = SyncOptions::new()
            .force_update()
            .with_confidence_threshold(1.4)
            .with_session("s1");
        assert!(options.force_update);
        assert_eq!(options.confidence_threshold, 1.0);
        assert_eq!(options.session_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_options_from_config() {
        let config = SyncConfig {
            confidence_threshold: 0.8,
            freshness_hours: 6,
        };
        let options = SyncOptions::from_config(&config);
        assert_eq!(options.confidence_threshold, 0.8);
        assert!(!options.force_update);
    }

    #[test]
    fn test_failure_result_shape() {
        let result = SyncResult::failure("boom", 12);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.performance.total_time_ms, 12);
        assert!(result.project_entity.is_none());
    }

    #[test]
    fn test_detection_errors_pass_through() {
        let err = into_detection_error(Error::NotAProject("/x".into()));
        assert_eq!(err.code(), "E002");

        let err = into_detection_error(Error::Io(std::io::Error::other("denied")));
        assert_eq!(err.code(), "E001");
    }
}
