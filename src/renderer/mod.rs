//! Frame renderers
//!
//! A renderer produces one image file per call and reports where it put it.
//! The lifecycle never looks inside the file; it only moves, measures and
//! deletes it.

pub mod command;
pub mod mock;

pub use command::CommandRenderer;
pub use mock::MockRenderer;

use crate::error::{AppError, Result};
use crate::models::FrameDescriptor;
use crate::services::{RendererMode, RendererSettings};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// File produced by one render call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Raw file location, usually inside the staging directory
    pub path: PathBuf,
    /// Instant the frame represents; defaults to the clock's now
    pub captured_at: Option<DateTime<Utc>>,
    /// Unparsed capture time as printed by an external tool, used when
    /// `captured_at` is not set
    pub captured_raw: Option<String>,
    /// Frame identity; defaults to the configured descriptor
    pub frame: Option<FrameDescriptor>,
}

impl RenderedArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            captured_at: None,
            captured_raw: None,
            frame: None,
        }
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    pub fn with_captured_raw(mut self, raw: impl Into<String>) -> Self {
        self.captured_raw = Some(raw.into());
        self
    }

    pub fn with_frame(mut self, frame: FrameDescriptor) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// Opaque frame producer
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render one frame, optionally annotated with `caption`
    async fn render(&self, caption: Option<&str>) -> Result<RenderedArtifact>;

    /// Short label for health reports (`mock`, `command`)
    fn mode(&self) -> &'static str;
}

/// Build the renderer selected by configuration
///
/// # Errors
///
/// `AppError::Config` when command mode has no command
pub fn from_settings(settings: &RendererSettings, staging_dir: &Path) -> Result<Arc<dyn Renderer>> {
    let renderer: Arc<dyn Renderer> = match settings.mode {
        RendererMode::Mock => Arc::new(MockRenderer::new(staging_dir)),
        RendererMode::Command => Arc::new(CommandRenderer::new(&settings.command, staging_dir)?),
    };
    Ok(renderer)
}

/// Delete raw files left in the staging directory by an earlier run
///
/// Only regular files directly inside `staging_dir` are touched. A missing
/// directory counts as empty.
///
/// # Returns
///
/// Number of files removed
pub async fn clear_staging(staging_dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(staging_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(AppError::io_error(
                format!("Failed to read staging directory: {}", e),
                Some(staging_dir.to_path_buf()),
            ))
        }
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if !is_file {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed stale raw artifact");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale raw artifact"),
        }
    }

    Ok(removed)
}
