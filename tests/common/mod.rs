//! Common test utilities for pipeline integration tests
//!
//! Provides fake git and build engines for ordering and failure injection,
//! plus helpers that seed real git repositories for round-trip tests.

#![allow(dead_code, reason = "Each test binary uses a different subset")]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use variants_sync_controller::git::{CommitAuthor, GitClient, GitError};
use variants_sync_controller::kustomize::{ManifestBuilder, RenderError};

/// Shared, ordered log of fake operations
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Position of `event` in the log; panics if it never happened
pub fn position(log: &[String], event: &str) -> usize {
    log.iter()
        .position(|e| e == event)
        .unwrap_or_else(|| panic!("event {event} not found in {log:?}"))
}

/// Fake [`GitClient`] recording every call as `<tag>:<operation>`.
///
/// Cloning creates `<app>/overlays/production` for each configured
/// application so the renderer finds its input.
pub struct RecordingGit {
    tag: String,
    log: EventLog,
    applications: Vec<String>,
    clone_delay: Duration,
    staged_changes: bool,
    fail_clone: bool,
    fail_commit: bool,
    fail_push: bool,
}

impl RecordingGit {
    pub fn new(tag: &str, log: EventLog, applications: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            log,
            applications: applications.iter().map(|s| (*s).to_string()).collect(),
            clone_delay: Duration::ZERO,
            staged_changes: true,
            fail_clone: false,
            fail_commit: false,
            fail_push: false,
        }
    }

    pub fn with_clone_delay(mut self, delay: Duration) -> Self {
        self.clone_delay = delay;
        self
    }

    pub fn unchanged(mut self) -> Self {
        self.staged_changes = false;
        self
    }

    pub fn failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    fn record(&self, event: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.tag, event));
    }

    fn failed(command: &str) -> GitError {
        GitError::Failed {
            command: command.to_string(),
            status: "exit status: 1".to_string(),
            stderr: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl GitClient for RecordingGit {
    async fn clone_repo(
        &self,
        _remote: &str,
        dest: &Path,
        _branch: Option<&str>,
    ) -> Result<(), GitError> {
        self.record("clone:start");
        if !self.clone_delay.is_zero() {
            tokio::time::sleep(self.clone_delay).await;
        }
        if self.fail_clone {
            self.record("clone:failed");
            return Err(Self::failed("git clone"));
        }
        for app in &self.applications {
            std::fs::create_dir_all(dest.join(app).join("overlays/production")).unwrap();
        }
        self.record("clone:end");
        Ok(())
    }

    async fn add(&self, repo: &Path, path: &str) -> Result<(), GitError> {
        assert!(repo.join(path).is_file(), "staged file must exist");
        self.record(&format!("add:{path}"));
        Ok(())
    }

    async fn has_staged_changes(&self, _repo: &Path) -> Result<bool, GitError> {
        self.record("diff");
        Ok(self.staged_changes)
    }

    async fn commit(
        &self,
        _repo: &Path,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String, GitError> {
        if self.fail_commit {
            self.record("commit:failed");
            return Err(Self::failed("git commit"));
        }
        self.record(&format!("commit:{message}:{}", author.name));
        Ok(format!("{}-sha", self.tag))
    }

    async fn push(&self, _repo: &Path) -> Result<(), GitError> {
        if self.fail_push {
            self.record("push:failed");
            return Err(Self::failed("git push"));
        }
        self.record("push");
        Ok(())
    }
}

/// Builder returning fixed bytes
pub struct StaticBuilder(pub Vec<u8>);

impl StaticBuilder {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

#[async_trait]
impl ManifestBuilder for StaticBuilder {
    async fn build(&self, _overlay: &Path) -> Result<Vec<u8>, RenderError> {
        Ok(self.0.clone())
    }
}

/// Builder that always fails like a broken overlay
pub struct FailingBuilder;

#[async_trait]
impl ManifestBuilder for FailingBuilder {
    async fn build(&self, overlay: &Path) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::BuildFailed {
            path: overlay.to_path_buf(),
            status: "exit status: 1".to_string(),
            stderr: "accumulating resources: missing".to_string(),
        })
    }
}

/// Builder that sleeps before answering
pub struct SlowBuilder(pub Duration);

#[async_trait]
impl ManifestBuilder for SlowBuilder {
    async fn build(&self, _overlay: &Path) -> Result<Vec<u8>, RenderError> {
        tokio::time::sleep(self.0).await;
        Ok(b"kind: ConfigMap\n".to_vec())
    }
}

/// GitHub-shaped push body with one commit
pub fn push_body(message: &str, modified: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "ref": "refs/heads/main",
        "after": "f00dfeed",
        "repository": {"name": "conf", "full_name": "org/conf"},
        "commits": [{
            "id": "f00dfeed",
            "message": message,
            "added": [],
            "removed": [],
            "modified": modified,
        }]
    }))
    .unwrap()
}

pub fn git_available() -> bool {
    which::which("git").is_ok()
}

pub fn run_git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .output()
        .expect("git must be runnable");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Bare repository on branch `main` seeded with an `appX` application.
///
/// Returns the path of the bare repository.
pub fn seed_remote(root: &Path) -> PathBuf {
    let bare = root.join("remote.git");
    std::fs::create_dir_all(&bare).unwrap();
    run_git(&bare, &["init", "--bare", "--quiet"]);
    run_git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    let seed = root.join("seed");
    std::fs::create_dir_all(seed.join("appX/overlays/production")).unwrap();
    std::fs::create_dir_all(seed.join("appX/base")).unwrap();
    std::fs::write(
        seed.join("appX/base/deployment.yaml"),
        "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: appx\n",
    )
    .unwrap();
    std::fs::write(
        seed.join("appX/overlays/production/kustomization.yaml"),
        "resources:\n- ../../base\n",
    )
    .unwrap();

    run_git(&seed, &["init", "--quiet"]);
    run_git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    run_git(&seed, &["add", "."]);
    run_git(&seed, &["commit", "-q", "-m", "add feature"]);
    run_git(&seed, &["remote", "add", "origin", bare.to_str().unwrap()]);
    run_git(&seed, &["push", "-q", "origin", "main"]);

    bare
}

/// Fresh clone of `remote` for inspecting what was pushed
pub fn inspect_clone(remote: &Path, root: &Path) -> PathBuf {
    let dest = root.join(format!(
        "inspect-{}",
        uuid::Uuid::new_v4().simple()
    ));
    run_git(
        root,
        &[
            "clone",
            "-q",
            remote.to_str().unwrap(),
            dest.to_str().unwrap(),
        ],
    );
    dest
}
