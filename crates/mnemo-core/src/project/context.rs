//! Project identity and the scoped context cache

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Stable identity of a project on disk
///
/// Immutable for the duration of one operation. `project_id` is the key used
/// by every other component and is deterministic for a given path and remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub project_id: String,
    pub project_name: String,
    pub project_path: PathBuf,
    pub project_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_remote: Option<String>,
    pub group_id: String,
}

impl ProjectContext {
    /// Display form of the project path
    pub fn path_display(&self) -> String {
        self.project_path.display().to_string()
    }
}

/// Resolves a filesystem path into a [`ProjectContext`]
///
/// What counts as a recognizable project root is up to the implementation;
/// failures are reported as detection errors.
#[async_trait]
pub trait ProjectContextProvider: Send + Sync {
    async fn detect(&self, path: &Path) -> Result<ProjectContext>;
}

/// Short-lived cache of resolved contexts for one logical operation
///
/// Owned by the caller and keyed by the path as given. Nothing is shared
/// between scopes; entries live until [`ContextScope::invalidate`] or
/// [`ContextScope::clear`] is called or the scope is dropped.
#[derive(Debug, Default)]
pub struct ContextScope {
    resolved: HashMap<PathBuf, ProjectContext>,
}

impl ContextScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a context, consulting the provider only on a miss
    pub async fn resolve(
        &mut self,
        provider: &dyn ProjectContextProvider,
        path: &Path,
    ) -> Result<ProjectContext> {
        if let Some(context) = self.resolved.get(path) {
            debug!(path = %path.display(), "Project context served from scope");
            return Ok(context.clone());
        }

        let context = provider.detect(path).await?;
        self.resolved.insert(path.to_path_buf(), context.clone());
        Ok(context)
    }

    /// Previously resolved context for a path, if any
    pub fn get(&self, path: &Path) -> Option<&ProjectContext> {
        self.resolved.get(path)
    }

    /// Drop the cached context for a path
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.resolved.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.resolved.clear();
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProjectContextProvider for CountingProvider {
        async fn detect(&self, path: &Path) -> Result<ProjectContext> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProjectContext {
                project_id: "abc".into(),
                project_name: "demo".into(),
                project_path: path.to_path_buf(),
                project_type: "directory".into(),
                organization: None,
                git_remote: None,
                group_id: "project_abc".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_scope_caches_until_invalidated() {
        let provider = CountingProvider {
            calls: AtomicUsize::new(0),
        };
        let mut scope = ContextScope::new();
        let path = Path::new("/work/demo");

        scope.resolve(&provider, path).await.unwrap();
        scope.resolve(&provider, path).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(scope.len(), 1);

        assert!(scope.invalidate(path));
        assert!(!scope.invalidate(path));
        scope.resolve(&provider, path).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        scope.clear();
        assert!(scope.is_empty());
    }

    #[test]
    fn test_context_serializes_camel_case() {
        let context = ProjectContext {
            project_id: "abc".into(),
            project_name: "demo".into(),
            project_path: PathBuf::from("/work/demo"),
            project_type: "repository".into(),
            organization: Some("acme".into()),
            git_remote: None,
            group_id: "project_abc".into(),
        };
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["projectId"], "abc");
        assert_eq!(json["organization"], "acme");
        assert!(json.get("gitRemote").is_none());
    }
}
