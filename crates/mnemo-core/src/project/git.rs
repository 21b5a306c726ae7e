//! Git-backed project context provider
//!
//! Resolves a directory to its enclosing repository (if any), reads the
//! `origin` remote and derives the project name and organization from it.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

use super::context::{ProjectContext, ProjectContextProvider};

const REMOTE_NAME: &str = "origin";

/// Number of hex characters kept from the identity digest
const PROJECT_ID_LEN: usize = 16;

/// Context provider backed by `git2` repository discovery
#[derive(Debug, Clone, Default)]
pub struct GitContextProvider;

impl GitContextProvider {
    pub fn new() -> Self {
        Self
    }

    fn detect_blocking(path: &Path) -> Result<ProjectContext> {
        let metadata = std::fs::metadata(path)
            .map_err(|_| Error::NotAProject(path.display().to_string()))?;
        if !metadata.is_dir() {
            return Err(Error::NotAProject(path.display().to_string()));
        }

        let canonical = std::fs::canonicalize(path)
            .map_err(|e| Error::Detection(format!("{}: {}", path.display(), e)))?;

        let (root, git_remote) = match git2::Repository::discover(&canonical) {
            Ok(repo) => {
                let root = repo
                    .workdir()
                    .and_then(|dir| std::fs::canonicalize(dir).ok())
                    .unwrap_or_else(|| canonical.clone());
                let remote = repo
                    .find_remote(REMOTE_NAME)
                    .ok()
                    .and_then(|remote| remote.url().map(str::to_string));
                (Some(root), remote)
            }
            Err(e) => {
                debug!(path = %canonical.display(), error = %e, "No enclosing git repository");
                (None, None)
            }
        };

        let is_repository = root.is_some();
        let project_path = root.unwrap_or(canonical);
        let parsed = git_remote.as_deref().and_then(parse_remote);

        let project_name = parsed
            .as_ref()
            .map(|(_, repo)| repo.clone())
            .or_else(|| dir_name(&project_path))
            .ok_or_else(|| Error::NotAProject(project_path.display().to_string()))?;
        let organization = parsed.map(|(org, _)| org);

        let project_id = project_id_for(&project_path, git_remote.as_deref());

        Ok(ProjectContext {
            group_id: format!("project_{}", project_id),
            project_id,
            project_name,
            project_path,
            project_type: if is_repository {
                "repository".to_string()
            } else {
                "directory".to_string()
            },
            organization,
            git_remote,
        })
    }
}

#[async_trait]
impl ProjectContextProvider for GitContextProvider {
    async fn detect(&self, path: &Path) -> Result<ProjectContext> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::detect_blocking(&path))
            .await
            .map_err(|e| Error::Detection(format!("context detection task failed: {}", e)))?
    }
}

/// Deterministic id for a path and optional remote
pub fn project_id_for(path: &Path, remote: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(b"\n");
    hasher.update(remote.unwrap_or_default().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..PROJECT_ID_LEN].to_string()
}

/// Split a remote URL into (organization, repository)
///
/// Handles `scheme://[user@]host/org/repo(.git)` and `user@host:org/repo(.git)`.
/// Nested groups are kept in the organization (`group/sub`).
pub fn parse_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim().trim_end_matches('/');
    let url = url.strip_suffix(".git").unwrap_or(url);

    let path = if let Some((_, rest)) = url.split_once("://") {
        rest.split_once('/').map(|(_, path)| path)?
    } else if let Some((_, path)) = url.split_once(':') {
        path
    } else {
        return None;
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }
    let (repo, org) = segments.split_last()?;
    Some((org.join("/"), (*repo).to_string()))
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}
