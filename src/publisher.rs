//! # Change Publisher
//!
//! Commits an application's rendered production variant and pushes it to the
//! configuration repository.
//!
//! Commits always carry [`SENTINEL_COMMIT_MESSAGE`]; the webhook router drops
//! pushes whose first commit message contains it, which is what keeps the
//! controller from reacting to its own pushes.
//!
//! add → commit → push stops at the first failing step and reports which one
//! failed. A failed push leaves the commit in the local workspace only; the
//! next sync re-clones and discards it.

use crate::constants::SENTINEL_COMMIT_MESSAGE;
use crate::git::{CommitAuthor, GitClient, GitError};
use crate::observability::metrics;
use crate::workspace::variants_relative_path;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};

/// Step of the publish sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Add,
    Commit,
    Push,
}

impl PublishStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStage::Add => "add",
            PublishStage::Commit => "commit",
            PublishStage::Push => "push",
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("cannot stage {}: file does not exist", .0.display())]
    MissingFile(PathBuf),
    #[error("git add failed")]
    Add(#[source] GitError),
    #[error("git commit failed")]
    Commit(#[source] GitError),
    #[error("git push failed")]
    Push(#[source] GitError),
}

impl PublishError {
    /// Step that failed. A missing file counts as a staging failure.
    #[must_use]
    pub fn stage(&self) -> PublishStage {
        match self {
            PublishError::MissingFile(_) | PublishError::Add(_) => PublishStage::Add,
            PublishError::Commit(_) => PublishStage::Commit,
            PublishError::Push(_) => PublishStage::Push,
        }
    }
}

/// Successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A variants commit was created and pushed
    Pushed { commit: String },
    /// The rendered file matches `HEAD`; nothing was committed or pushed
    Unchanged,
}

pub type PublishResult = Result<PublishOutcome, PublishError>;

/// Stages, commits and pushes rendered variants
#[derive(Clone)]
pub struct ChangePublisher {
    git: Arc<dyn GitClient>,
    author_name: String,
    author_email: String,
}

impl fmt::Debug for ChangePublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangePublisher")
            .field("author_name", &self.author_name)
            .field("author_email", &self.author_email)
            .finish_non_exhaustive()
    }
}

impl ChangePublisher {
    #[must_use]
    pub fn new(
        git: Arc<dyn GitClient>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            git,
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    /// Stage `<application>/variants/production.yaml`, commit it with the
    /// sentinel message and push.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are described on PublishError"
    )]
    pub async fn publish(&self, workspace_root: &Path, application: &str) -> PublishResult {
        let relative = variants_relative_path(application);
        let span = info_span!("git.publish", workspace = %workspace_root.display(), file = %relative);

        let result = self
            .publish_inner(workspace_root, &relative)
            .instrument(span)
            .await;

        match &result {
            Ok(PublishOutcome::Pushed { commit }) => {
                metrics::increment_publish_total("pushed");
                info!("✅ Pushed variants commit {} for {}", commit, application);
            }
            Ok(PublishOutcome::Unchanged) => {
                metrics::increment_publish_total("unchanged");
                info!(
                    "Rendered variants for {} match HEAD, nothing to publish",
                    application
                );
            }
            Err(e) => {
                metrics::increment_publish_total(e.stage().as_str());
                error!("Failed to publish {} (stage {}): {}", relative, e.stage(), e);
            }
        }
        result
    }

    async fn publish_inner(&self, workspace_root: &Path, relative: &str) -> PublishResult {
        let absolute = workspace_root.join(relative);
        if !tokio::fs::metadata(&absolute)
            .await
            .is_ok_and(|m| m.is_file())
        {
            return Err(PublishError::MissingFile(absolute));
        }

        self.git
            .add(workspace_root, relative)
            .await
            .map_err(PublishError::Add)?;

        let changed = self
            .git
            .has_staged_changes(workspace_root)
            .await
            .map_err(PublishError::Add)?;
        if !changed {
            return Ok(PublishOutcome::Unchanged);
        }

        let author = CommitAuthor::now(&self.author_name, &self.author_email);
        let commit = self
            .git
            .commit(workspace_root, SENTINEL_COMMIT_MESSAGE, &author)
            .await
            .map_err(PublishError::Commit)?;
        info!("Committed {} as {}", relative, commit);

        self.git
            .push(workspace_root)
            .await
            .map_err(PublishError::Push)?;

        Ok(PublishOutcome::Pushed { commit })
    }
}
