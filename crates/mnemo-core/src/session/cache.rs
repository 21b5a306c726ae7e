//! Per-project session cache
//!
//! One JSON document per project directory records which assistant session
//! last reconciled the project and what came of it. Reads never fail: a
//! missing, malformed or incomplete document is simply "no record".

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::fs;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};

use super::record::{ProcessingOutcome, SessionRecord, SessionUpdate};

/// Fields of the record that `update` merges key by key
const MERGED_FIELDS: [&str; 2] = ["projectEntityCache", "metadata"];

/// Reads and writes session records under project directories
#[derive(Debug, Clone, Default)]
pub struct SessionCache {
    config: SessionConfig,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Where the record for `project` lives
    pub fn record_path(&self, project: &Path) -> PathBuf {
        project
            .join(&self.config.dir_name)
            .join(&self.config.file_name)
    }

    /// Read the record, or `None` when there is no usable one
    pub async fn read(&self, project: &Path) -> Option<SessionRecord> {
        match self.load(project).await {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %self.record_path(project).display(),
                    error = %e,
                    "Ignoring unreadable session record"
                );
                None
            }
        }
    }

    async fn load(&self, project: &Path) -> Result<Option<SessionRecord>> {
        let path = self.record_path(project);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No session record");
                return Ok(None);
            }
            Err(e) => return Err(Error::CacheRead(e.to_string())),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::CacheRead(e.to_string()))
    }

    /// Overwrite the record, stamping `lastUpdated`
    pub async fn write(&self, project: &Path, record: &SessionRecord) -> Result<SessionRecord> {
        let value = serde_json::to_value(record)?;
        self.persist(project, value).await
    }

    /// Merge `partial` into the current record and write the result
    ///
    /// Scalar fields override. `projectEntityCache` and `metadata` are merged
    /// one level deep, so keys the partial does not mention survive, except
    /// `lastProcessed`, which is dropped when the session id changes.
    pub async fn update(&self, project: &Path, partial: SessionUpdate) -> Result<SessionRecord> {
        let mut merged = match self.read(project).await {
            Some(current) => into_object(serde_json::to_value(current)?),
            None => Map::new(),
        };

        let partial = into_object(strip_nulls(serde_json::to_value(partial)?));

        // A new session has not processed anything yet
        let session_changed = match (merged.get("sessionId"), partial.get("sessionId")) {
            (Some(current), Some(incoming)) => current != incoming,
            _ => false,
        };
        if session_changed {
            if let Some(Value::Object(cache)) = merged.get_mut("projectEntityCache") {
                cache.remove("lastProcessed");
            }
        }

        for (key, incoming) in partial {
            let nested = MERGED_FIELDS.contains(&key.as_str());
            match (merged.get_mut(&key), incoming) {
                (Some(Value::Object(existing)), Value::Object(fields)) if nested => {
                    existing.extend(fields);
                }
                (_, incoming) => {
                    merged.insert(key, incoming);
                }
            }
        }

        if !merged.contains_key("sessionId") {
            return Err(Error::InvalidInput(
                "session update needs a sessionId when no record exists".to_string(),
            ));
        }

        self.persist(project, Value::Object(merged)).await
    }

    /// Whether reconciliation should run for `session_id`
    pub async fn should_process(&self, project: &Path, session_id: &str) -> bool {
        let Some(record) = self.read(project).await else {
            return true;
        };
        record.session_id != session_id || record.last_processed().is_none()
    }

    /// Record that `session_id` finished a reconciliation
    pub async fn mark_processed(
        &self,
        project: &Path,
        session_id: &str,
        outcome: ProcessingOutcome,
    ) -> Result<SessionRecord> {
        let update = SessionUpdate::new()
            .session(session_id)
            .cache(outcome.into_cache(Utc::now()));
        let record = self.update(project, update).await?;
        debug!(
            path = %project.display(),
            session_id = %record.session_id,
            "Session marked processed"
        );
        Ok(record)
    }

    async fn persist(&self, project: &Path, value: Value) -> Result<SessionRecord> {
        let mut object = into_object(strip_nulls(value));
        object.insert(
            "lastUpdated".to_string(),
            serde_json::to_value(Utc::now())?,
        );
        let value = Value::Object(object);

        let record: SessionRecord = serde_json::from_value(value.clone())
            .map_err(|e| Error::InvalidInput(format!("invalid session record: {}", e)))?;

        let path = self.record_path(project);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::CacheWrite(format!("{}: {}", parent.display(), e)))?;
        }

        let content = serde_json::to_string_pretty(&value)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, content)
            .await
            .map_err(|e| Error::CacheWrite(format!("{}: {}", staging.display(), e)))?;
        fs::rename(&staging, &path)
            .await
            .map_err(|e| Error::CacheWrite(format!("{}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Session record written");
        Ok(record)
    }
}

/// Remove null values at every depth, including null array elements
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_nulls)
                .collect(),
        ),
        other => other,
    }
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::PerformanceMetrics;
    use crate::session::ProjectEntityCache;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SessionCache) {
        (TempDir::new().unwrap(), SessionCache::new())
    }

    #[tokio::test]
    async fn test_session_gate_lifecycle() {
        let (dir, cache) = setup();
        let project = dir.path();

        assert!(cache.should_process(project, "s1").await);

        cache
            .mark_processed(project, "s1", ProcessingOutcome::succeeded())
            .await
            .unwrap();
        assert!(!cache.should_process(project, "s1").await);
        assert!(cache.should_process(project, "s2").await);
    }

    #[tokio::test]
    async fn test_new_session_via_update_reopens_gate() {
        let (dir, cache) = setup();
        let project = dir.path();

        cache
            .mark_processed(project, "s1", ProcessingOutcome::succeeded())
            .await
            .unwrap();
        let record = cache
            .update(project, SessionUpdate::new().session("s2"))
            .await
            .unwrap();

        assert_eq!(record.session_id, "s2");
        assert!(record.last_processed().is_none());
        // The previous outcome is still visible
        assert_eq!(record.project_entity_cache.unwrap().success, Some(true));
        assert!(cache.should_process(project, "s2").await);

        cache
            .mark_processed(project, "s2", ProcessingOutcome::succeeded())
            .await
            .unwrap();
        assert!(!cache.should_process(project, "s2").await);
    }

    #[tokio::test]
    async fn test_failed_outcome_also_closes_gate() {
        let (dir, cache) = setup();
        let record = cache
            .mark_processed(dir.path(), "s1", ProcessingOutcome::failed("store down"))
            .await
            .unwrap();

        assert_eq!(record.project_entity_cache.unwrap().success, Some(false));
        assert!(!cache.should_process(dir.path(), "s1").await);
    }

    #[tokio::test]
    async fn test_same_session_update_keeps_gate_closed() {
        let (dir, cache) = setup();
        let project = dir.path();

        cache
            .mark_processed(project, "s1", ProcessingOutcome::succeeded())
            .await
            .unwrap();
        cache
            .update(project, SessionUpdate::new().session("s1").metadata("k", "v"))
            .await
            .unwrap();

        assert!(!cache.should_process(project, "s1").await);
    }

    #[tokio::test]
    async fn test_record_without_processing_still_gates_open() {
        let (dir, cache) = setup();
        cache
            .write(dir.path(), &SessionRecord::new("s1"))
            .await
            .unwrap();

        assert!(cache.should_process(dir.path(), "s1").await);
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (dir, cache) = setup();
        let record = SessionRecord::new("s1")
            .with_cache(ProjectEntityCache {
                success: Some(true),
                technologies: Some(vec!["Rust".into(), "TypeScript".into()]),
                performance: Some(PerformanceMetrics {
                    detection_time_ms: 5,
                    creation_time_ms: 7,
                    total_time_ms: 12,
                }),
                ..Default::default()
            })
            .with_metadata("editor", "zed");

        let written = cache.write(dir.path(), &record).await.unwrap();
        assert!(written.last_updated >= record.last_updated);

        let read = cache.read(dir.path()).await.unwrap();
        assert_eq!(read, written);
        assert_eq!(read.project_entity_cache, record.project_entity_cache);
        assert_eq!(read.metadata, record.metadata);
    }

    #[tokio::test]
    async fn test_nulls_never_reach_disk() {
        let (dir, cache) = setup();
        let record = SessionRecord::new("s1")
            .with_metadata("branch", Value::Null)
            .with_metadata("tags", json!(["a", null, {"x": null, "y": 1}]));

        cache.write(dir.path(), &record).await.unwrap();

        let raw = std::fs::read_to_string(cache.record_path(dir.path())).unwrap();
        assert!(!raw.contains("null"));

        let read = cache.read(dir.path()).await.unwrap();
        let metadata = read.metadata.unwrap();
        assert!(!metadata.contains_key("branch"));
        assert_eq!(metadata["tags"], json!(["a", {"y": 1}]));
    }

    #[tokio::test]
    async fn test_update_shallow_merges_nested_maps() {
        let (dir, cache) = setup();
        let project = dir.path();

        cache
            .update(
                project,
                SessionUpdate::new()
                    .session("s1")
                    .metadata("editor", "zed")
                    .cache(ProjectEntityCache {
                        technologies: Some(vec!["Rust".into()]),
                        ..Default::default()
                    }),
            )
            .await
            .unwrap();

        let record = cache
            .update(
                project,
                SessionUpdate::new()
                    .metadata("branch", "main")
                    .cache(ProjectEntityCache {
                        success: Some(true),
                        ..Default::default()
                    }),
            )
            .await
            .unwrap();

        assert_eq!(record.session_id, "s1");
        let metadata = record.metadata.unwrap();
        assert_eq!(metadata["editor"], json!("zed"));
        assert_eq!(metadata["branch"], json!("main"));

        let entity_cache = record.project_entity_cache.unwrap();
        assert_eq!(entity_cache.success, Some(true));
        assert_eq!(entity_cache.technologies, Some(vec!["Rust".to_string()]));
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let (dir, cache) = setup();
        let partial = SessionUpdate::new()
            .session("s1")
            .metadata("editor", "zed")
            .cache(ProjectEntityCache {
                technologies_detected: Some(2),
                ..Default::default()
            });

        let once = cache.update(dir.path(), partial.clone()).await.unwrap();
        let twice = cache.update(dir.path(), partial).await.unwrap();

        assert_eq!(once.session_id, twice.session_id);
        assert_eq!(once.project_entity_cache, twice.project_entity_cache);
        assert_eq!(once.metadata, twice.metadata);
    }

    #[tokio::test]
    async fn test_update_without_session_on_empty_cache_fails() {
        let (dir, cache) = setup();
        let err = cache
            .update(dir.path(), SessionUpdate::new().metadata("k", "v"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "E800");
        assert!(!cache.record_path(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_malformed_and_incomplete_records_read_as_absent() {
        let (dir, cache) = setup();
        let path = cache.record_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        std::fs::write(&path, "{not json").unwrap();
        assert!(cache.read(dir.path()).await.is_none());

        std::fs::write(&path, r#"{"sessionId":"s1"}"#).unwrap();
        assert!(cache.read(dir.path()).await.is_none());
        assert!(cache.should_process(dir.path(), "s1").await);
    }

    #[tokio::test]
    async fn test_deleted_record_reads_as_absent() {
        let (dir, cache) = setup();
        cache
            .mark_processed(dir.path(), "s1", ProcessingOutcome::succeeded())
            .await
            .unwrap();
        assert!(cache.read(dir.path()).await.is_some());

        std::fs::remove_file(cache.record_path(dir.path())).unwrap();
        assert!(cache.read(dir.path()).await.is_none());
        assert!(cache.should_process(dir.path(), "s1").await);
    }

    #[tokio::test]
    async fn test_custom_location() {
        let dir = TempDir::new().unwrap();
        let cache = SessionCache::with_config(SessionConfig {
            dir_name: ".state".into(),
            file_name: "gate.json".into(),
        });

        cache
            .write(dir.path(), &SessionRecord::new("s1"))
            .await
            .unwrap();
        assert!(dir.path().join(".state").join("gate.json").exists());
        assert!(!cache
            .record_path(dir.path())
            .with_extension("json.tmp")
            .exists());
    }

    #[test]
    fn test_strip_nulls_recursive() {
        let stripped = strip_nulls(json!({
            "a": null,
            "b": {"c": null, "d": [1, null, {"e": null}]},
            "f": "keep"
        }));
        assert_eq!(stripped, json!({"b": {"d": [1, {}]}, "f": "keep"}));
    }
}
