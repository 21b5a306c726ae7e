//! Session record and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::reconcile::{PerformanceMetrics, SyncResult};

/// Persisted state for one project directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_entity_cache: Option<ProjectEntityCache>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            last_updated: Utc::now(),
            project_entity_cache: None,
            metadata: None,
        }
    }

    pub fn with_cache(mut self, cache: ProjectEntityCache) -> Self {
        self.project_entity_cache = Some(cache);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// When the current session last completed a reconciliation
    pub fn last_processed(&self) -> Option<DateTime<Utc>> {
        self.project_entity_cache
            .as_ref()
            .and_then(|cache| cache.last_processed)
    }
}

/// Last reconciliation outcome for the project
///
/// Every field is optional so the same shape serves as a partial in
/// [`SessionUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntityCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technologies_detected: Option<usize>,
    /// Summary of the project entity that was submitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    /// Number of facts asserted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

/// Partial update applied by `SessionCache::update`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_entity_cache: Option<ProjectEntityCache>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn cache(mut self, cache: ProjectEntityCache) -> Self {
        self.project_entity_cache = Some(cache);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }
}

/// What a reconciliation produced, as recorded by `mark_processed`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessingOutcome {
    pub success: bool,
    pub technologies_detected: Option<usize>,
    pub project_entity: Option<String>,
    pub technologies: Option<Vec<String>>,
    pub relationships: Option<usize>,
    pub performance: Option<PerformanceMetrics>,
    pub errors: Vec<String>,
}

impl ProcessingOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Default::default()
        }
    }

    pub fn from_sync(result: &SyncResult) -> Self {
        Self {
            success: result.success,
            technologies_detected: Some(result.technologies_detected),
            project_entity: result
                .project_entity
                .as_ref()
                .map(|entity| entity.summary.clone()),
            technologies: Some(result.technologies.clone()),
            relationships: Some(result.relationships.len()),
            performance: Some(result.performance),
            errors: result.error.iter().cloned().collect(),
        }
    }

    /// Cache entry for this outcome, processed at `at`
    pub fn into_cache(self, at: DateTime<Utc>) -> ProjectEntityCache {
        ProjectEntityCache {
            last_processed: Some(at),
            success: Some(self.success),
            technologies_detected: self.technologies_detected,
            project_entity: self.project_entity,
            technologies: self.technologies,
            relationships: self.relationships,
            performance: self.performance,
            errors: if self.errors.is_empty() {
                None
            } else {
                Some(self.errors)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphEntity, Predicate, ProjectRelationship};

    #[test]
    fn test_record_serializes_camel_case_without_absent_fields() {
        let record = SessionRecord::new("s1");
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("sessionId"));
        assert!(object.contains_key("lastUpdated"));
        assert!(!object.contains_key("projectEntityCache"));
        assert!(!object.contains_key("metadata"));
    }

    #[test]
    fn test_record_requires_session_id_and_timestamp() {
        let missing_id = r#"{"lastUpdated":"2026-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<SessionRecord>(missing_id).is_err());

        let missing_ts = r#"{"sessionId":"s1"}"#;
        assert!(serde_json::from_str::<SessionRecord>(missing_ts).is_err());
    }

    #[test]
    fn test_outcome_from_sync() {
        let result = SyncResult {
            success: true,
            project_entity: Some(GraphEntity::new("widget", "widget is a repository")),
            relationships: vec![
                ProjectRelationship::new("dev", Predicate::WorksOn, "widget"),
                ProjectRelationship::new("widget", Predicate::Uses, "Rust"),
            ],
            technologies: vec!["Rust".into()],
            technologies_detected: 1,
            ..Default::default()
        };

        let outcome = ProcessingOutcome::from_sync(&result);
        assert!(outcome.success);
        assert_eq!(outcome.relationships, Some(2));
        assert_eq!(outcome.project_entity.as_deref(), Some("widget is a repository"));
        assert!(outcome.errors.is_empty());

        let cache = outcome.into_cache(Utc::now());
        assert!(cache.last_processed.is_some());
        assert_eq!(cache.success, Some(true));
        assert!(cache.errors.is_none());
    }

    #[test]
    fn test_failed_outcome_keeps_error() {
        let cache = ProcessingOutcome::failed("store down").into_cache(Utc::now());
        assert_eq!(cache.success, Some(false));
        assert_eq!(cache.errors, Some(vec!["store down".to_string()]));
    }
}
