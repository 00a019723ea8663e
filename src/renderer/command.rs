use super::{RenderedArtifact, Renderer};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Environment variable carrying the caption to the external renderer
pub const CAPTION_ENV: &str = "FRAME_CAPTION";
/// Environment variable naming the directory the renderer should write into
pub const STAGING_ENV: &str = "FRAME_STAGING_DIR";
/// Stdout line prefix carrying the frame's capture time
pub const CAPTURED_AT_PREFIX: &str = "captured_at=";

/// Runs an external plotting command
///
/// The command prints the produced file path as its last non-empty stdout
/// line. Relative paths are resolved against the staging directory. A line
/// `captured_at=<time>` anywhere in stdout reports the scan time, either as
/// `YYYYmmdd_HHMMZ` or RFC 3339; the last such line wins.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
    staging_dir: PathBuf,
}

impl CommandRenderer {
    /// # Errors
    ///
    /// `AppError::Config` if `command` is empty
    pub fn new(command: &[String], staging_dir: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| AppError::Config("renderer.command must not be empty".to_string()))?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            staging_dir: staging_dir.into(),
        })
    }

    fn resolve(&self, reported: &str) -> PathBuf {
        let path = Path::new(reported);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.staging_dir.join(path)
        }
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, caption: Option<&str>) -> Result<RenderedArtifact> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| {
                AppError::io_error(
                    format!("Failed to create staging directory: {}", e),
                    Some(self.staging_dir.clone()),
                )
            })?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env(STAGING_ENV, &self.staging_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(caption) = caption {
            command.env(CAPTION_ENV, caption);
        }

        debug!(program = %self.program, caption = ?caption, "Running render command");

        let output = command.output().await.map_err(|e| {
            AppError::render_error(format!("Failed to run {}: {}", self.program, e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or_default().trim();
            warn!(program = %self.program, status = %output.status, stderr = %tail, "Render command failed");
            return Err(AppError::render_error(format!(
                "{} exited with {}: {}",
                self.program, output.status, tail
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut reported = None;
        let mut captured_raw = None;
        for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match line.strip_prefix(CAPTURED_AT_PREFIX) {
                Some(raw) => captured_raw = Some(raw.trim()),
                None => reported = Some(line),
            }
        }

        let reported = reported.ok_or_else(|| {
            AppError::render_error(format!("{} printed no output path", self.program))
        })?;

        let artifact = RenderedArtifact::new(self.resolve(reported));
        Ok(match captured_raw {
            Some(raw) => artifact.with_captured_raw(raw),
            None => artifact,
        })
    }

    fn mode(&self) -> &'static str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_empty_command_rejected() {
        let err = CommandRenderer::new(&[], "/tmp").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_last_stdout_line_is_path_and_caption_is_passed() {
        let temp_dir = TempDir::new().unwrap();
        let script = r#"printf '%s' "$FRAME_CAPTION" > "$FRAME_STAGING_DIR/frame.png"; echo "plotting..."; echo frame.png; echo"#;
        let renderer = CommandRenderer::new(&sh(script), temp_dir.path()).unwrap();

        let artifact = renderer.render(Some("Auto 21:30 UTC")).await.unwrap();

        assert_eq!(artifact.path, temp_dir.path().join("frame.png"));
        assert_eq!(std::fs::read_to_string(&artifact.path).unwrap(), "Auto 21:30 UTC");
        assert_eq!(renderer.mode(), "command");
        assert!(artifact.captured_raw.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captured_at_line_is_reported_raw() {
        let temp_dir = TempDir::new().unwrap();
        let script = r#"touch "$FRAME_STAGING_DIR/frame.png"; echo frame.png; echo "captured_at=20250820_2245Z""#;
        let renderer = CommandRenderer::new(&sh(script), temp_dir.path()).unwrap();

        let artifact = renderer.render(None).await.unwrap();

        assert_eq!(artifact.path, temp_dir.path().join("frame.png"));
        assert_eq!(artifact.captured_raw.as_deref(), Some("20250820_2245Z"));
        assert!(artifact.captured_at.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_render_error() {
        let temp_dir = TempDir::new().unwrap();
        let renderer =
            CommandRenderer::new(&sh("echo 'no data' >&2; exit 3"), temp_dir.path()).unwrap();

        let err = renderer.render(None).await.unwrap_err();
        assert!(err.is_render_failure());
        assert!(err.to_string().contains("no data"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_command_is_render_error() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = CommandRenderer::new(&sh("true"), temp_dir.path()).unwrap();

        assert!(renderer.render(None).await.unwrap_err().is_render_failure());
    }
}
