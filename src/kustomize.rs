//! # Kustomize Integration
//!
//! Renders an application's production overlay and writes the result into the
//! workspace as its production variant.
//!
//! The build engine sits behind [`ManifestBuilder`]; [`KustomizeCli`] runs
//! `kustomize build` as a child process. [`ManifestRenderer`] owns the path
//! conventions:
//!
//! - input: `<application>/overlays/production`
//! - output: `<application>/variants/production.yaml` (overwritten each run)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use variants_sync_controller::kustomize::{KustomizeCli, ManifestRenderer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let renderer = ManifestRenderer::new(Arc::new(KustomizeCli::new("kustomize")));
//! let manifest = renderer.render(Path::new("/tmp/conf-repo/appX")).await?;
//! println!("wrote {} bytes to {}", manifest.bytes.len(), manifest.path.display());
//! # Ok(())
//! # }
//! ```

use crate::constants::{OVERLAYS_DIR, PRODUCTION_OVERLAY, VARIANTS_DIR};
use crate::observability::metrics;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, info_span, Instrument};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("overlay directory does not exist: {}", .0.display())]
    MissingOverlay(PathBuf),
    #[error("failed to execute {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("kustomize build failed for {} ({status}): {stderr}", path.display())]
    BuildFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },
    #[error("failed to write rendered manifest {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build engine that turns an overlay directory into a manifest stream
#[async_trait]
pub trait ManifestBuilder: Send + Sync {
    async fn build(&self, overlay: &Path) -> Result<Vec<u8>, RenderError>;
}

/// Runs `kustomize build <overlay>` and returns its stdout
#[derive(Debug, Clone)]
pub struct KustomizeCli {
    program: String,
}

impl KustomizeCli {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ManifestBuilder for KustomizeCli {
    async fn build(&self, overlay: &Path) -> Result<Vec<u8>, RenderError> {
        let output = Command::new(&self.program)
            .arg("build")
            .arg(overlay)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::BuildFailed {
                path: overlay.to_path_buf(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Output of one render, as written to the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifest {
    /// Where the manifest was written
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`
    pub sha256: String,
}

/// Renders the production overlay of an application into its variants file
#[derive(Clone)]
pub struct ManifestRenderer {
    builder: Arc<dyn ManifestBuilder>,
}

impl std::fmt::Debug for ManifestRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestRenderer").finish_non_exhaustive()
    }
}

impl ManifestRenderer {
    #[must_use]
    pub fn new(builder: Arc<dyn ManifestBuilder>) -> Self {
        Self { builder }
    }

    /// Build `<application_dir>/overlays/production` and write the output to
    /// `<application_dir>/variants/production.yaml`.
    ///
    /// On error nothing is written, so a stale variants file from the clone
    /// stays untouched and the caller must not publish it.
    #[allow(
        clippy::missing_errors_doc,
        reason = "Errors are described on RenderError"
    )]
    pub async fn render(&self, application_dir: &Path) -> Result<RenderedManifest, RenderError> {
        let overlay = application_dir.join(OVERLAYS_DIR).join(PRODUCTION_OVERLAY);
        let span = info_span!("kustomize.build", overlay.path = %overlay.display());

        async {
            if !tokio::fs::metadata(&overlay)
                .await
                .is_ok_and(|m| m.is_dir())
            {
                metrics::increment_kustomize_build_errors_total();
                error!("Overlay not found: {}", overlay.display());
                return Err(RenderError::MissingOverlay(overlay.clone()));
            }

            info!("Running kustomize build on path: {}", overlay.display());
            metrics::increment_kustomize_build_total();
            let start = Instant::now();
            let built = self.builder.build(&overlay).await;
            metrics::observe_kustomize_build_duration(start.elapsed().as_secs_f64());

            let bytes = match built {
                Ok(bytes) => bytes,
                Err(e) => {
                    metrics::increment_kustomize_build_errors_total();
                    error!("Kustomize build failed: {}", e);
                    return Err(e);
                }
            };

            let variants_dir = application_dir.join(VARIANTS_DIR);
            let path = variants_dir.join(format!("{PRODUCTION_OVERLAY}.yaml"));
            tokio::fs::create_dir_all(&variants_dir)
                .await
                .map_err(|source| RenderError::Write {
                    path: variants_dir.clone(),
                    source,
                })?;
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|source| RenderError::Write {
                    path: path.clone(),
                    source,
                })?;

            let sha256 = format!("{:x}", Sha256::digest(&bytes));
            debug!("Rendered manifest sha256={}", sha256);
            info!(
                "Wrote {} bytes of rendered manifests to {}",
                bytes.len(),
                path.display()
            );

            Ok(RenderedManifest {
                path,
                bytes,
                sha256,
            })
        }
        .instrument(span)
        .await
    }
}
