use super::{RenderedArtifact, Renderer};
use crate::error::{AppError, Result};
use crate::models::FrameDescriptor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// 1x1 transparent PNG
const PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Writes a placeholder frame into the staging directory
///
/// Reports the mock frame identity and leaves the capture time to the clock.
#[derive(Debug)]
pub struct MockRenderer {
    staging_dir: PathBuf,
    sequence: AtomicU64,
}

impl MockRenderer {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    fn next_path(&self) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        self.staging_dir.join(format!("mock_{}_{}.png", nanos, seq))
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, caption: Option<&str>) -> Result<RenderedArtifact> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| {
                AppError::io_error(
                    format!("Failed to create staging directory: {}", e),
                    Some(self.staging_dir.clone()),
                )
            })?;

        let path = self.next_path();
        tokio::fs::write(&path, PLACEHOLDER_PNG)
            .await
            .map_err(|e| AppError::render_error(format!("Mock render failed: {}", e)))?;

        debug!(path = %path.display(), caption = ?caption, "Rendered mock frame");

        Ok(RenderedArtifact::new(path).with_frame(FrameDescriptor::mock()))
    }

    fn mode(&self) -> &'static str {
        "mock"
    }
}
