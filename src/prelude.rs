//! Common imports for embedding the controller.

pub use crate::config::{ControllerConfig, LogFormat};
pub use crate::git::{GitCli, GitClient, GitCredentials};
pub use crate::kustomize::{KustomizeCli, ManifestBuilder, ManifestRenderer};
pub use crate::publisher::{ChangePublisher, PublishOutcome};
pub use crate::server::{build_router, start_server, ServerState};
pub use crate::sync::{RepositoryLocks, SyncOrchestrator, SyncOutcome, SyncStage};
pub use crate::webhook::{ChangeSet, EventRouter, RouteDecision};
pub use crate::workspace::RepositoryWorkspace;
