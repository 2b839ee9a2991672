//! # Sync
//!
//! The pipeline that turns an accepted push into a published variants commit,
//! plus the per-repository locks and status store it uses.

pub mod locks;
pub mod orchestrator;
pub mod status;

pub use locks::RepositoryLocks;
pub use orchestrator::{SyncError, SyncOrchestrator, SyncOutcome, SyncStage};
pub use status::{SyncRecord, SyncStatusStore};
