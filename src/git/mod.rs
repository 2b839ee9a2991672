//! # Git
//!
//! Source-control operations used by the sync pipeline.
//!
//! The pipeline talks to git through the [`GitClient`] trait. [`GitCli`] is the
//! production implementation and shells out to the `git` binary, which avoids
//! linking libgit2/OpenSSL and keeps behaviour identical to a developer's
//! terminal.

mod cli;
mod credentials;

pub use cli::GitCli;
pub use credentials::{redact_url, GitCredentials};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to execute {command}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("{command} produced unexpected output: {output}")]
    UnexpectedOutput { command: String, output: String },
}

/// Identity and timestamp recorded on a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub when: DateTime<Utc>,
}

impl CommitAuthor {
    /// Author stamped with the current time
    #[must_use]
    pub fn now(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            when: Utc::now(),
        }
    }

    /// Date in git's internal `<unix-seconds> <offset>` format
    #[must_use]
    pub fn git_date(&self) -> String {
        format!("{} +0000", self.when.timestamp())
    }
}

/// Git operations needed to materialize and publish a workspace
#[async_trait]
pub trait GitClient: Send + Sync {
    /// Full clone of `remote` into `dest`, checking out `branch` when given
    async fn clone_repo(
        &self,
        remote: &str,
        dest: &Path,
        branch: Option<&str>,
    ) -> Result<(), GitError>;

    /// Stage a single repository-relative path
    async fn add(&self, repo: &Path, path: &str) -> Result<(), GitError>;

    /// Whether the index differs from `HEAD`
    async fn has_staged_changes(&self, repo: &Path) -> Result<bool, GitError>;

    /// Commit the index and return the new commit id
    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String, GitError>;

    /// Push the current branch to `origin`
    async fn push(&self, repo: &Path) -> Result<(), GitError>;
}
