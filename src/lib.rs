//! Variants Sync Controller Library
//!
//! Receives push webhooks for a kustomize configuration repository, renders
//! the production overlay of the application that changed and commits the
//! result back as `<app>/variants/production.yaml`.
//!
//! - [`webhook`]: push payload model and event routing (loop guard included)
//! - [`workspace`]: fresh clone of the repository per run
//! - [`kustomize`]: overlay rendering
//! - [`publisher`]: add, commit and push of the rendered variant
//! - [`sync`]: orchestration, per-repository locking and run status
//! - [`server`]: HTTP endpoints

pub mod config;
pub mod constants;
pub mod git;
pub mod kustomize;
pub mod observability;
pub mod prelude;
pub mod publisher;
pub mod server;
pub mod sync;
pub mod webhook;
pub mod workspace;
