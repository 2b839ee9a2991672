//! GitHub push event payload.
//!
//! Only the fields the router reads or logs are modelled; everything else in
//! the delivery is ignored. Missing fields default to empty so that partial
//! payloads from other senders still parse.

use serde::{Deserialize, Serialize};

/// Body of a `push` webhook delivery
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushPayload {
    /// Full ref that was pushed, e.g. `refs/heads/main`
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub before: String,
    /// Commit id the ref points to after the push
    #[serde(default)]
    pub after: String,
    /// Pushed commits, oldest first
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    #[serde(default)]
    pub head_commit: Option<PushCommit>,
    #[serde(default)]
    pub repository: Option<PushRepository>,
    #[serde(default)]
    pub pusher: Option<CommitUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushCommit {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub author: Option<CommitUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CommitUser {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushRepository {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub clone_url: Option<String>,
}

impl PushPayload {
    /// Parse a delivery body
    #[allow(
        clippy::missing_errors_doc,
        reason = "Returns the serde_json error unchanged"
    )]
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Branch name when `ref` is a branch ref
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.git_ref.strip_prefix("refs/heads/")
    }
}
