//! # Repository Workspace
//!
//! Local, disposable clone of the configuration repository.
//!
//! Every sync starts from a fresh full clone at `<scratch_root>/<repo_name>`:
//! whatever the previous run left behind (a finished clone, a half-written
//! variants file, an unpushed commit) is deleted first. Nothing is updated
//! incrementally, so no state leaks from one run into the next.
//!
//! The workspace path is shared by every run for the repository. Callers must
//! hold the repository's sync lock (see [`crate::sync`]) for the whole
//! materialize → render → publish sequence.

use crate::constants::{OVERLAYS_DIR, PRODUCTION_OVERLAY, VARIANTS_DIR};
use crate::git::{redact_url, GitClient, GitError};
use crate::observability::metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create parent directory {}", path.display())]
    CreateParent {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to clone {remote} into {}", path.display())]
    Clone {
        remote: String,
        path: PathBuf,
        #[source]
        source: GitError,
    },
}

/// Repository-relative path of an application's rendered production variant
#[must_use]
pub fn variants_relative_path(application: &str) -> String {
    format!("{application}/{VARIANTS_DIR}/{PRODUCTION_OVERLAY}.yaml")
}

/// Materializes and lays out the local clone of one repository
#[derive(Clone)]
pub struct RepositoryWorkspace {
    root: PathBuf,
    remote: String,
    branch: Option<String>,
    git: Arc<dyn GitClient>,
}

impl std::fmt::Debug for RepositoryWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryWorkspace")
            .field("root", &self.root)
            .field("remote", &redact_url(&self.remote))
            .field("branch", &self.branch)
            .finish_non_exhaustive()
    }
}

impl RepositoryWorkspace {
    #[must_use]
    pub fn new(
        root: PathBuf,
        remote: impl Into<String>,
        branch: Option<String>,
        git: Arc<dyn GitClient>,
    ) -> Self {
        Self {
            root,
            remote: remote.into(),
            branch,
            git,
        }
    }

    /// Root of the working copy
    #[must_use]
    pub fn repo_root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn application_dir(&self, application: &str) -> PathBuf {
        self.root.join(application)
    }

    /// `<app>/overlays/production`, the render input
    #[must_use]
    pub fn overlay_dir(&self, application: &str) -> PathBuf {
        self.application_dir(application)
            .join(OVERLAYS_DIR)
            .join(PRODUCTION_OVERLAY)
    }

    /// `<app>/variants/production.yaml`, the render output and publish target
    #[must_use]
    pub fn variants_file(&self, application: &str) -> PathBuf {
        self.root.join(variants_relative_path(application))
    }

    /// Delete whatever is at the workspace path and clone the remote afresh.
    ///
    /// Removal is best-effort: if it fails the clone is still attempted and
    /// reports its own error. A failed clone may leave a partial directory,
    /// which the next call deletes.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are described on WorkspaceError"
    )]
    pub async fn materialize(&self) -> Result<PathBuf, WorkspaceError> {
        let remote = redact_url(&self.remote);
        let span = info_span!(
            "git.clone",
            repository.url = %remote,
            clone.path = %self.root.display(),
            branch = self.branch.as_deref().unwrap_or("<default>")
        );

        async {
            self.clear().await;

            if let Some(parent) = self.root.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| WorkspaceError::CreateParent {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }

            metrics::increment_git_clone_total();
            let start = Instant::now();
            let result = self
                .git
                .clone_repo(&self.remote, &self.root, self.branch.as_deref())
                .await;
            metrics::observe_git_clone_duration(start.elapsed().as_secs_f64());

            match result {
                Ok(()) => {
                    info!(
                        "Cloned {} into {} in {:.2}s",
                        remote,
                        self.root.display(),
                        start.elapsed().as_secs_f64()
                    );
                    Ok(self.root.clone())
                }
                Err(source) => {
                    metrics::increment_git_clone_errors_total();
                    Err(WorkspaceError::Clone {
                        remote: remote.clone(),
                        path: self.root.clone(),
                        source,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn clear(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => info!("Removed previous workspace at {}", self.root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove workspace at {}: {}. Attempting clone anyway.",
                self.root.display(),
                e
            ),
        }
    }
}
