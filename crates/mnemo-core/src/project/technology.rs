//! Technology detection results consumed by the reconciler

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default minimum confidence for a technology to be reported
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// A single technology found in a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTechnology {
    /// Case-sensitive identifier, unique within one detection result
    pub name: String,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    /// Where the evidence came from (e.g. "package.json", "Cargo.toml")
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl DetectedTechnology {
    pub fn new(name: impl Into<String>, confidence: f64, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            version: None,
            context: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Output of one detection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnologyDetectionResult {
    pub technologies: Vec<DetectedTechnology>,
    pub overall_confidence: f64,
    pub detected_at: DateTime<Utc>,
}

impl TechnologyDetectionResult {
    pub fn new(technologies: Vec<DetectedTechnology>, overall_confidence: f64) -> Self {
        Self {
            technologies,
            overall_confidence: overall_confidence.clamp(0.0, 1.0),
            detected_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0.0)
    }

    /// Technology names in detection order
    pub fn names(&self) -> Vec<String> {
        self.technologies.iter().map(|t| t.name.clone()).collect()
    }
}

/// Scans a project for the technologies it uses
///
/// Implementations are expected to de-duplicate by name before returning.
#[async_trait]
pub trait TechnologyDetector: Send + Sync {
    async fn detect_technologies(
        &self,
        path: &Path,
        confidence_threshold: f64,
    ) -> Result<TechnologyDetectionResult>;
}
