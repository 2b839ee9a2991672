//! Latest sync result per application, served on `/status`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Result of the most recent pipeline run for one application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub application: String,
    pub delivery: String,
    /// Commit whose push triggered the run
    pub trigger_commit: String,
    /// `published`, `unchanged` or `failed`
    pub outcome: String,
    /// Commit pushed by the run, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pushed_commit: Option<String>,
    /// Failing stage, for failed runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Shared, in-memory store of [`SyncRecord`]s keyed by application
#[derive(Debug, Clone, Default)]
pub struct SyncStatusStore {
    records: Arc<RwLock<BTreeMap<String, SyncRecord>>>,
}

impl SyncStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for `record.application`
    pub fn record(&self, record: SyncRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(record.application.clone(), record);
    }

    #[must_use]
    pub fn get(&self, application: &str) -> Option<SyncRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(application).cloned()
    }

    /// All records, ordered by application name
    #[must_use]
    pub fn snapshot(&self) -> Vec<SyncRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.values().cloned().collect()
    }
}
