//! # Variants Sync Controller
//!
//! Webhook-driven bridge between a kustomize configuration repository and the
//! rendered manifests committed next to it.
//!
//! ## Overview
//!
//! For every push to the configuration repository:
//!
//! 1. **Route** - the first commit decides the application (top-level directory
//!    of its first modified file); pushes made by the controller itself are
//!    recognised by their commit message and dropped
//! 2. **Clone** - the repository is cloned afresh into the scratch directory
//! 3. **Render** - `kustomize build <app>/overlays/production`
//! 4. **Publish** - the output is committed as `<app>/variants/production.yaml`
//!    and pushed back
//!
//! ## Usage
//!
//! ```text
//! REPO_URL=https://github.com/org/conf GIT_USER=bot GIT_TOKEN=... variants-sync-controller
//! variants-sync-controller --env-file .env --listen-addr 127.0.0.1:3000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use variants_sync_controller::config::ControllerConfig;
use variants_sync_controller::git::redact_url;
use variants_sync_controller::observability;
use variants_sync_controller::server::{start_server, ServerState};
use variants_sync_controller::sync::SyncOrchestrator;

/// Render kustomize production variants on push and commit them back
#[derive(Parser, Debug)]
#[command(name = "variants-sync-controller", version, long_about = None)]
struct Cli {
    /// Load environment variables from this file before reading configuration
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Address to listen on (overrides LISTEN_ADDR)
    #[arg(long, value_name = "ADDR")]
    listen_addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("Failed to load env file {}", path.display()))?;
    }

    let mut config = ControllerConfig::from_env().context("Invalid configuration")?;
    if let Some(addr) = cli.listen_addr {
        config.listen_addr = addr;
    }

    observability::init_logging(&config)?;

    info!("Starting Variants Sync Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        "Repository: {} (workspace {}, branch {})",
        redact_url(&config.repo_url),
        config.workspace_path().display(),
        config.branch.as_deref().unwrap_or("<any>")
    );
    if !config.credentials.has_token() {
        warn!("GIT_TOKEN is not set; pushes will be sent without credentials");
    }

    observability::register_metrics()?;
    preflight(&config);

    let state = Arc::new(ServerState {
        orchestrator: Arc::new(SyncOrchestrator::new(&config)),
        is_ready: Arc::new(AtomicBool::new(false)),
    });

    let shutdown_state = Arc::clone(&state);
    let shutdown = async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_state.is_ready.store(false, Ordering::Relaxed);
    };

    state.is_ready.store(true, Ordering::Relaxed);
    start_server(
        &config.listen_addr,
        &config.webhook_path,
        Arc::clone(&state),
        shutdown,
    )
    .await
    .with_context(|| format!("HTTP server on {} failed", config.listen_addr))?;

    info!("Variants Sync Controller stopped");
    Ok(())
}

/// Warn about missing executables; a run fails at the stage that needs them
fn preflight(config: &ControllerConfig) {
    for (setting, binary) in [
        ("GIT_BIN", config.git_bin.as_str()),
        ("KUSTOMIZE_BIN", config.kustomize_bin.as_str()),
    ] {
        match which::which(binary) {
            Ok(path) => info!("Using {} at {}", binary, path.display()),
            Err(e) => warn!(
                "{} ({}) not found: {}. Syncs will fail until it is installed.",
                setting, binary, e
            ),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
