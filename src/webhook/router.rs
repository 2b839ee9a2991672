//! # Event Router
//!
//! Decides what an inbound webhook delivery means for the sync pipeline.
//!
//! Only the first commit of a push is inspected:
//!
//! 1. a message containing [`SENTINEL_COMMIT_MESSAGE`] marks the push as the
//!    controller's own output (loopback) and stops the pipeline,
//! 2. otherwise the first modified path names the application, its top-level
//!    directory.
//!
//! Anything that cannot be routed is rejected with a reason. Rejections are
//! reported to the caller, never raised; the HTTP handler still acknowledges
//! the delivery.

use super::payload::PushPayload;
use crate::constants::SENTINEL_COMMIT_MESSAGE;
use std::fmt;

/// Kind of delivery, taken from the `X-GitHub-Event` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Push,
    Ping,
    Other(String),
}

impl EventKind {
    #[must_use]
    pub fn from_header(value: &str) -> Self {
        match value.trim() {
            "push" => EventKind::Push,
            "ping" => EventKind::Ping,
            other => EventKind::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Push => "push",
            EventKind::Ping => "ping",
            EventKind::Other(other) => other,
        }
    }
}

/// What a push asks the pipeline to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Top-level directory of the first modified file.
    /// Empty for a loopback push whose path could not be read.
    pub application: String,
    /// The first commit carries the sentinel message; never sync this
    pub is_loopback: bool,
    pub git_ref: String,
    /// Id of the inspected (first) commit
    pub commit_id: String,
    /// Webhook delivery id, for log correlation
    pub delivery: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingEventHeader,
    NotPushEvent(String),
    MalformedPayload(String),
    BranchMismatch { expected: String, actual: String },
    NoCommits,
    NoModifiedFiles,
    NotAnApplicationPath(String),
}

impl RejectReason {
    /// Stable label for metrics and responses
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingEventHeader => "missing_event_header",
            RejectReason::NotPushEvent(_) => "not_push_event",
            RejectReason::MalformedPayload(_) => "malformed_payload",
            RejectReason::BranchMismatch { .. } => "branch_mismatch",
            RejectReason::NoCommits => "no_commits",
            RejectReason::NoModifiedFiles => "no_modified_files",
            RejectReason::NotAnApplicationPath(_) => "not_an_application_path",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingEventHeader => write!(f, "missing X-GitHub-Event header"),
            RejectReason::NotPushEvent(kind) => write!(f, "event '{kind}' is not a push"),
            RejectReason::MalformedPayload(e) => write!(f, "malformed push payload: {e}"),
            RejectReason::BranchMismatch { expected, actual } => {
                write!(f, "push to '{actual}' ignored, syncing '{expected}' only")
            }
            RejectReason::NoCommits => write!(f, "push contains no commits"),
            RejectReason::NoModifiedFiles => write!(f, "first commit modifies no files"),
            RejectReason::NotAnApplicationPath(path) => {
                write!(f, "'{path}' is not inside an application directory")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Run the pipeline for this change set
    Accept(ChangeSet),
    /// The controller's own commit; stop here
    Loopback(ChangeSet),
    /// Delivery needs no action (ping)
    Ignore,
    Reject(RejectReason),
}

/// Classifies webhook deliveries
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    branch: Option<String>,
}

impl EventRouter {
    /// Router accepting pushes to `branch` only, or to any branch when `None`
    #[must_use]
    pub fn new(branch: Option<String>) -> Self {
        Self { branch }
    }

    /// Route a raw delivery: event header value and body
    #[must_use]
    pub fn route(&self, event: Option<&str>, body: &[u8], delivery: &str) -> RouteDecision {
        let Some(event) = event else {
            return RouteDecision::Reject(RejectReason::MissingEventHeader);
        };
        match EventKind::from_header(event) {
            EventKind::Push => {}
            EventKind::Ping => return RouteDecision::Ignore,
            EventKind::Other(kind) => {
                return RouteDecision::Reject(RejectReason::NotPushEvent(kind));
            }
        }

        match PushPayload::from_slice(body) {
            Ok(payload) => self.route_push(&payload, delivery),
            Err(e) => RouteDecision::Reject(RejectReason::MalformedPayload(e.to_string())),
        }
    }

    /// Route a parsed push payload
    #[must_use]
    pub fn route_push(&self, payload: &PushPayload, delivery: &str) -> RouteDecision {
        if let Some(expected) = &self.branch {
            if payload.branch() != Some(expected.as_str()) {
                return RouteDecision::Reject(RejectReason::BranchMismatch {
                    expected: expected.clone(),
                    actual: payload.git_ref.clone(),
                });
            }
        }

        let Some(commit) = payload.commits.first() else {
            return RouteDecision::Reject(RejectReason::NoCommits);
        };

        let application = commit.modified.first().map(|path| application_from_path(path));

        let mut change_set = ChangeSet {
            application: String::new(),
            is_loopback: false,
            git_ref: payload.git_ref.clone(),
            commit_id: commit.id.clone(),
            delivery: delivery.to_string(),
        };

        if is_loopback_message(&commit.message) {
            change_set.is_loopback = true;
            if let Some(Ok(name)) = application {
                change_set.application = name.to_string();
            }
            return RouteDecision::Loopback(change_set);
        }

        match application {
            None => RouteDecision::Reject(RejectReason::NoModifiedFiles),
            Some(Err(reason)) => RouteDecision::Reject(reason),
            Some(Ok(name)) => {
                change_set.application = name.to_string();
                RouteDecision::Accept(change_set)
            }
        }
    }
}

/// Whether a commit message marks a controller-generated commit
#[must_use]
pub fn is_loopback_message(message: &str) -> bool {
    message.contains(SENTINEL_COMMIT_MESSAGE)
}

/// Top-level directory of a repository-relative path.
///
/// Root-level files and paths whose first segment is empty, `.` or `..` are
/// not inside an application and are rejected.
#[allow(
    clippy::missing_errors_doc,
    reason = "Rejects with RejectReason::NotAnApplicationPath"
)]
pub fn application_from_path(path: &str) -> Result<&str, RejectReason> {
    match path.split_once('/') {
        Some((first, _)) if is_application_name(first) => Ok(first),
        _ => Err(RejectReason::NotAnApplicationPath(path.to_string())),
    }
}

/// Whether `name` is a single directory component inside the repository
#[must_use]
pub fn is_application_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
