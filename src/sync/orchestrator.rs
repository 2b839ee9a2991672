//! # Sync Orchestrator
//!
//! Drives one webhook delivery through the pipeline:
//!
//! ```text
//! route ─┬─ ignore / reject / loopback ──────────────────────────► done
//!        └─ accept ─► lock(repo) ─► materialize ─► render ─► publish ─► done
//! ```
//!
//! Stages run strictly in order and each one is bounded by the configured
//! stage timeout. The first failing stage ends the run; later stages never
//! start. The outcome is logged, counted and recorded in the status store,
//! and is never turned into an error for the webhook sender.

use super::locks::RepositoryLocks;
use super::status::{SyncRecord, SyncStatusStore};
use crate::config::ControllerConfig;
use crate::git::{GitCli, GitClient};
use crate::kustomize::{KustomizeCli, ManifestBuilder, ManifestRenderer, RenderError};
use crate::observability::metrics;
use crate::publisher::{ChangePublisher, PublishError, PublishOutcome};
use crate::webhook::{is_application_name, ChangeSet, EventRouter, RejectReason, RouteDecision};
use crate::workspace::{RepositoryWorkspace, WorkspaceError};
use chrono::Utc;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Materialize,
    Render,
    Publish,
}

impl SyncStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStage::Materialize => "materialize",
            SyncStage::Render => "render",
            SyncStage::Publish => "publish",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("{stage} stage timed out after {}s", .after.as_secs())]
    Timeout { stage: SyncStage, after: Duration },
}

impl SyncError {
    #[must_use]
    pub fn stage(&self) -> SyncStage {
        match self {
            SyncError::Workspace(_) => SyncStage::Materialize,
            SyncError::Render(_) => SyncStage::Render,
            SyncError::Publish(_) => SyncStage::Publish,
            SyncError::Timeout { stage, .. } => *stage,
        }
    }
}

/// What happened to a delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Delivery needs no action (ping)
    Ignored,
    Rejected(RejectReason),
    /// The controller's own push; nothing was done
    Loopback { commit_id: String },
    Published { application: String, commit: String },
    /// Rendered output matched the repository; nothing was pushed
    Unchanged { application: String },
    Failed {
        application: String,
        stage: SyncStage,
        error: String,
    },
}

impl SyncOutcome {
    /// Status string reported to the webhook sender
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            SyncOutcome::Ignored => "ignored",
            SyncOutcome::Rejected(_) => "rejected",
            SyncOutcome::Loopback { .. } => "loopback",
            SyncOutcome::Published { .. } => "published",
            SyncOutcome::Unchanged { .. } => "unchanged",
            SyncOutcome::Failed { .. } => "failed",
        }
    }
}

/// Sequential webhook → render → push pipeline for one repository
#[derive(Clone)]
pub struct SyncOrchestrator {
    repo_name: String,
    router: EventRouter,
    workspace: RepositoryWorkspace,
    renderer: ManifestRenderer,
    publisher: ChangePublisher,
    stage_timeout: Duration,
    locks: RepositoryLocks,
    status: SyncStatusStore,
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("repo_name", &self.repo_name)
            .field("workspace", &self.workspace)
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    /// Orchestrator using the `git` and `kustomize` executables from `config`
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        let git = Arc::new(GitCli::new(
            config.git_bin.clone(),
            config.credentials.clone(),
        ));
        let builder = Arc::new(KustomizeCli::new(config.kustomize_bin.clone()));
        Self::with_components(config, git, builder)
    }

    /// Orchestrator with explicit git and build engines
    #[must_use]
    pub fn with_components(
        config: &ControllerConfig,
        git: Arc<dyn GitClient>,
        builder: Arc<dyn ManifestBuilder>,
    ) -> Self {
        Self {
            repo_name: config.repo_name.clone(),
            router: EventRouter::new(config.branch.clone()),
            workspace: RepositoryWorkspace::new(
                config.workspace_path(),
                config.repo_url.clone(),
                config.branch.clone(),
                Arc::clone(&git),
            ),
            renderer: ManifestRenderer::new(builder),
            publisher: ChangePublisher::new(
                git,
                config.author_name.clone(),
                config.author_email.clone(),
            ),
            stage_timeout: config.stage_timeout(),
            locks: RepositoryLocks::new(),
            status: SyncStatusStore::new(),
        }
    }

    /// Share a lock map with other orchestrators
    #[must_use]
    pub fn with_locks(mut self, locks: RepositoryLocks) -> Self {
        self.locks = locks;
        self
    }

    #[must_use]
    pub fn status(&self) -> &SyncStatusStore {
        &self.status
    }

    #[must_use]
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Route a raw delivery and run the pipeline if it is accepted
    pub async fn handle_push(
        &self,
        event: Option<&str>,
        body: &[u8],
        delivery: &str,
    ) -> SyncOutcome {
        metrics::increment_webhook_deliveries(event.unwrap_or("unknown"));

        match self.router.route(event, body, delivery) {
            RouteDecision::Ignore => {
                info!("Delivery {} needs no action ({:?} event)", delivery, event);
                SyncOutcome::Ignored
            }
            RouteDecision::Reject(reason) => {
                metrics::increment_routing_rejections(reason.as_str());
                warn!("Rejected delivery {}: {}", delivery, reason);
                SyncOutcome::Rejected(reason)
            }
            RouteDecision::Loopback(change_set) => self.skip_loopback(&change_set),
            RouteDecision::Accept(change_set) => self.run(change_set).await,
        }
    }

    /// Run materialize → render → publish for an accepted change set.
    ///
    /// Loopback change sets are dropped without touching the workspace, and
    /// an application that is not a single top-level directory is rejected.
    pub async fn run(&self, change_set: ChangeSet) -> SyncOutcome {
        if change_set.is_loopback {
            return self.skip_loopback(&change_set);
        }
        if !is_application_name(&change_set.application) {
            let reason = RejectReason::NotAnApplicationPath(change_set.application);
            metrics::increment_routing_rejections(reason.as_str());
            warn!("Rejected delivery {}: {}", change_set.delivery, reason);
            return SyncOutcome::Rejected(reason);
        }

        let span = info_span!(
            "sync",
            delivery = %change_set.delivery,
            application = %change_set.application,
            repository = %self.repo_name
        );
        self.run_locked(change_set).instrument(span).await
    }

    fn skip_loopback(&self, change_set: &ChangeSet) -> SyncOutcome {
        metrics::increment_loopback_skips();
        info!(
            "Skipping delivery {}: commit {} was pushed by the controller",
            change_set.delivery, change_set.commit_id
        );
        SyncOutcome::Loopback {
            commit_id: change_set.commit_id.clone(),
        }
    }

    async fn run_locked(&self, change_set: ChangeSet) -> SyncOutcome {
        let application = change_set.application.as_str();
        metrics::increment_runs();
        let start = Instant::now();

        let lock = self.locks.lock_for(&self.repo_name);
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!(
                    "Another sync of {} is in progress, waiting for it to finish",
                    self.repo_name
                );
                lock.lock().await
            }
        };

        info!(
            "🔄 Syncing {} (commit {}, ref {})",
            application, change_set.commit_id, change_set.git_ref
        );
        let result = self.pipeline(application).await;
        let elapsed = start.elapsed();
        metrics::observe_run_duration(elapsed.as_secs_f64());

        let outcome = match result {
            Ok(PublishOutcome::Pushed { commit }) => {
                info!(
                    "✅ Published variants of {} as {} in {:.2}s",
                    application,
                    commit,
                    elapsed.as_secs_f64()
                );
                SyncOutcome::Published {
                    application: application.to_string(),
                    commit,
                }
            }
            Ok(PublishOutcome::Unchanged) => {
                info!("Variants of {} already up to date", application);
                SyncOutcome::Unchanged {
                    application: application.to_string(),
                }
            }
            Err(e) => {
                let stage = e.stage();
                metrics::increment_run_errors(stage.as_str());
                let detail = error_chain(&e);
                error!(
                    "❌ Sync of {} failed at {} stage: {}",
                    application, stage, detail
                );
                SyncOutcome::Failed {
                    application: application.to_string(),
                    stage,
                    error: detail,
                }
            }
        };

        self.status.record(record_for(&change_set, &outcome, elapsed));
        outcome
    }

    async fn pipeline(&self, application: &str) -> Result<PublishOutcome, SyncError> {
        let root = self
            .stage(SyncStage::Materialize, self.workspace.materialize())
            .await?;

        let application_dir = self.workspace.application_dir(application);
        self.stage(SyncStage::Render, self.renderer.render(&application_dir))
            .await?;

        self.stage(
            SyncStage::Publish,
            self.publisher.publish(&root, application),
        )
        .await
    }

    async fn stage<T, E, F>(&self, stage: SyncStage, future: F) -> Result<T, SyncError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<SyncError>,
    {
        match tokio::time::timeout(self.stage_timeout, future).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(SyncError::Timeout {
                stage,
                after: self.stage_timeout,
            }),
        }
    }
}

fn record_for(change_set: &ChangeSet, outcome: &SyncOutcome, elapsed: Duration) -> SyncRecord {
    let (pushed_commit, stage, error) = match outcome {
        SyncOutcome::Published { commit, .. } => (Some(commit.clone()), None, None),
        SyncOutcome::Failed { stage, error, .. } => {
            (None, Some(stage.to_string()), Some(error.clone()))
        }
        _ => (None, None, None),
    };

    SyncRecord {
        application: change_set.application.clone(),
        delivery: change_set.delivery.clone(),
        trigger_commit: change_set.commit_id.clone(),
        outcome: outcome.status().to_string(),
        pushed_commit,
        stage,
        error,
        finished_at: Utc::now(),
        duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Error message followed by each of its sources, joined with `: `
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}
