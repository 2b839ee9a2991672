//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME, DEFAULT_LISTEN_ADDR, DEFAULT_SCRATCH_ROOT,
    DEFAULT_STAGE_TIMEOUT_SECS, DEFAULT_WEBHOOK_PATH,
};
use crate::git::GitCredentials;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Paths the HTTP server mounts besides the webhook
const RESERVED_PATHS: [&str; 4] = ["/metrics", "/healthz", "/readyz", "/status"];

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                reason: format!("expected json or text, got {other}"),
            }),
        }
    }
}

/// Controller-level configuration
///
/// Only `REPO_URL` is required. All other settings have defaults and can be
/// overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Clone and push target
    pub repo_url: String,
    /// Repository name, used as the workspace directory and lock key
    pub repo_name: String,
    /// Basic-auth credentials for the remote
    pub credentials: GitCredentials,
    /// Address the HTTP server binds to
    pub listen_addr: String,
    /// Path of the webhook endpoint
    pub webhook_path: String,
    /// Parent directory of the workspace
    pub scratch_root: PathBuf,
    /// Only pushes to this branch trigger a sync; also the branch cloned.
    /// `None` accepts any branch and clones the remote default branch.
    pub branch: Option<String>,
    /// Author and committer name of variants commits
    pub author_name: String,
    /// Author and committer email of variants commits
    pub author_email: String,
    /// Upper bound for each of clone, render and publish (seconds)
    pub stage_timeout_secs: u64,
    /// git executable
    pub git_bin: String,
    /// kustomize executable
    pub kustomize_bin: String,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format
    pub log_format: LogFormat,
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are described on ConfigError"
    )]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are described on ConfigError"
    )]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let repo_url = get("REPO_URL").ok_or(ConfigError::Missing("REPO_URL"))?;
        let repo_name = match get("REPO_NAME") {
            Some(name) => name,
            None => derive_repo_name(&repo_url).ok_or_else(|| ConfigError::Invalid {
                key: "REPO_NAME",
                reason: format!("cannot derive a repository name from {repo_url}"),
            })?,
        };

        let stage_timeout_secs = match get("STAGE_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "STAGE_TIMEOUT_SECS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_STAGE_TIMEOUT_SECS,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::Json,
        };

        let config = Self {
            repo_url,
            repo_name,
            credentials: GitCredentials::new(
                get("GIT_USER").unwrap_or_default(),
                get("GIT_TOKEN").unwrap_or_default(),
            ),
            listen_addr: get("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            webhook_path: get("WEBHOOK_PATH").unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string()),
            scratch_root: get("SCRATCH_ROOT")
                .map_or_else(|| PathBuf::from(DEFAULT_SCRATCH_ROOT), PathBuf::from),
            branch: get("SYNC_BRANCH"),
            author_name: get("GIT_AUTHOR_NAME").unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
            author_email: get("GIT_AUTHOR_EMAIL")
                .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
            stage_timeout_secs,
            git_bin: get("GIT_BIN").unwrap_or_else(|| "git".to_string()),
            kustomize_bin: get("KUSTOMIZE_BIN").unwrap_or_else(|| "kustomize".to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string()),
            log_format,
        };
        config.validate()?;
        Ok(config)
    }

    /// Minimal configuration for a repository, everything else defaulted
    #[must_use]
    pub fn for_repository(repo_url: impl Into<String>, repo_name: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            repo_name: repo_name.into(),
            credentials: GitCredentials::default(),
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            webhook_path: DEFAULT_WEBHOOK_PATH.to_string(),
            scratch_root: PathBuf::from(DEFAULT_SCRATCH_ROOT),
            branch: None,
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
            stage_timeout_secs: DEFAULT_STAGE_TIMEOUT_SECS,
            git_bin: "git".to_string(),
            kustomize_bin: "kustomize".to_string(),
            log_level: "INFO".to_string(),
            log_format: LogFormat::Json,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.webhook_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_PATH",
                reason: format!("must start with '/', got {}", self.webhook_path),
            });
        }
        if RESERVED_PATHS.contains(&self.webhook_path.as_str()) {
            return Err(ConfigError::Invalid {
                key: "WEBHOOK_PATH",
                reason: format!("{} is served by the controller itself", self.webhook_path),
            });
        }
        if self.repo_name.contains('/') || self.repo_name == "." || self.repo_name == ".." {
            return Err(ConfigError::Invalid {
                key: "REPO_NAME",
                reason: format!("must be a single path component, got {}", self.repo_name),
            });
        }
        if self.stage_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "STAGE_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Local path of the workspace: `<scratch_root>/<repo_name>`
    #[must_use]
    pub fn workspace_path(&self) -> PathBuf {
        self.scratch_root.join(&self.repo_name)
    }

    /// Get stage timeout duration
    #[must_use]
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

/// Repository name from a clone URL: last path segment without `.git`.
///
/// Handles `https://host/org/repo(.git)` and scp-like `git@host:org/repo.git`.
#[must_use]
pub fn derive_repo_name(repo_url: &str) -> Option<String> {
    let trimmed = repo_url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_repo_url_is_required() {
        let err = ControllerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("REPO_URL"));
    }

    #[test]
    fn test_defaults_applied() {
        let config = ControllerConfig::from_lookup(lookup(&[(
            "REPO_URL",
            "https://github.com/danielerez/acm-gitops-kustomize",
        )]))
        .unwrap();

        assert_eq!(config.repo_name, "acm-gitops-kustomize");
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.webhook_path, "/webhooks");
        assert_eq!(
            config.workspace_path(),
            PathBuf::from("/tmp/acm-gitops-kustomize")
        );
        assert_eq!(config.author_name, "Essential Conf");
        assert_eq!(config.author_email, "essential@conf.org");
        assert_eq!(config.stage_timeout(), Duration::from_secs(300));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.branch.is_none());
        assert!(!config.credentials.has_token());
    }

    #[test]
    fn test_overrides_applied() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("REPO_URL", "https://example.com/org/conf.git"),
            ("REPO_NAME", "conf-repo"),
            ("GIT_USER", "bot"),
            ("GIT_TOKEN", "s3cr3t"),
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("WEBHOOK_PATH", "/hooks/github"),
            ("SCRATCH_ROOT", "/var/lib/sync"),
            ("SYNC_BRANCH", "main"),
            ("STAGE_TIMEOUT_SECS", "30"),
            ("LOG_FORMAT", "text"),
        ]))
        .unwrap();

        assert_eq!(config.repo_name, "conf-repo");
        assert_eq!(config.credentials.username(), "bot");
        assert!(config.credentials.has_token());
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.webhook_path, "/hooks/github");
        assert_eq!(config.workspace_path(), PathBuf::from("/var/lib/sync/conf-repo"));
        assert_eq!(config.branch.as_deref(), Some("main"));
        assert_eq!(config.stage_timeout_secs, 30);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = ControllerConfig::from_lookup(lookup(&[
            ("REPO_URL", "https://example.com/org/conf.git"),
            ("SYNC_BRANCH", "  "),
        ]))
        .unwrap();
        assert!(config.branch.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = [("REPO_URL", "https://example.com/org/conf.git")];

        let mut pairs = base.to_vec();
        pairs.push(("STAGE_TIMEOUT_SECS", "soon"));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "STAGE_TIMEOUT_SECS", .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push(("STAGE_TIMEOUT_SECS", "0"));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "STAGE_TIMEOUT_SECS", .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push(("WEBHOOK_PATH", "webhooks"));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "WEBHOOK_PATH", .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push(("WEBHOOK_PATH", "/metrics"));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "WEBHOOK_PATH", .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push(("REPO_NAME", "../etc"));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "REPO_NAME", .. })
        ));

        let mut pairs = base.to_vec();
        pairs.push(("LOG_FORMAT", "xml"));
        assert!(matches!(
            ControllerConfig::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "LOG_FORMAT", .. })
        ));
    }

    #[test]
    fn test_derive_repo_name() {
        assert_eq!(
            derive_repo_name("https://github.com/org/repo.git").as_deref(),
            Some("repo")
        );
        assert_eq!(
            derive_repo_name("https://github.com/org/repo/").as_deref(),
            Some("repo")
        );
        assert_eq!(
            derive_repo_name("git@github.com:org/repo.git").as_deref(),
            Some("repo")
        );
        assert_eq!(derive_repo_name("/srv/git/conf.git").as_deref(), Some("conf"));
        assert_eq!(derive_repo_name(""), None);
        assert_eq!(derive_repo_name("https://github.com/org/.git"), None);
    }
}
