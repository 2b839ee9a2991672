//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Commit message used for every variants commit the controller pushes.
///
/// The event router treats any push whose first commit message contains this
/// string as the controller's own output and stops there. Both sides read this
/// constant; changing it in one place only reintroduces the build loop.
pub const SENTINEL_COMMIT_MESSAGE: &str = "update variants";

/// Overlay rendered for every application
pub const PRODUCTION_OVERLAY: &str = "production";

/// Directory (relative to an application) holding kustomize overlays
pub const OVERLAYS_DIR: &str = "overlays";

/// Directory (relative to an application) receiving rendered variants
pub const VARIANTS_DIR: &str = "variants";

/// Default listen address for the webhook server
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Default path the webhook endpoint is mounted on
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks";

/// Default directory workspaces are cloned under
pub const DEFAULT_SCRATCH_ROOT: &str = "/tmp";

/// Default author identity for variants commits
pub const DEFAULT_AUTHOR_NAME: &str = "Essential Conf";

/// Default author email for variants commits
pub const DEFAULT_AUTHOR_EMAIL: &str = "essential@conf.org";

/// Default upper bound for a single pipeline stage (seconds)
/// Applies separately to clone, render and publish
pub const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 300;

/// Header carrying the webhook event kind
pub const EVENT_HEADER: &str = "x-github-event";

/// Header carrying the webhook delivery id
pub const DELIVERY_HEADER: &str = "x-github-delivery";
