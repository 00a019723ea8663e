//! One generation cycle, end to end
//!
//! ```text
//! Idle -> Rendering -> DedupReject                         -> Idle
//!                   -> Persisting -> Indexed -> Evicting   -> Idle
//! ```
//!
//! Rendering happens outside the write gate. Everything from the target-path
//! check to eviction happens inside it, so a concurrent trigger can never see
//! a placed file whose insert is still undecided. The UNIQUE fingerprint
//! column settles races between triggers that both passed the advisory check.

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::lifecycle::dedup::parse_capture_time;
use crate::lifecycle::{AssetNaming, CapacityEvictor, DedupGuard};
use crate::models::{FrameDescriptor, GenerationOutcome, NewAsset, Trigger};
use crate::renderer::{RenderedArtifact, Renderer};
use crate::storage::AssetStore;
use scopeguard::ScopeGuard;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Cycle states, traced at debug level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Rendering,
    DedupReject,
    Persisting,
    Indexed,
    Evicting,
}

fn enter(state: CycleState) {
    debug!(state = ?state, "Generation cycle state");
}

/// Raw render output that is deleted unless defused after a successful move
///
/// Normal exits call [`discard`]; the drop hook only fires for a cycle whose
/// future was dropped or panicked midway.
type RawArtifact = ScopeGuard<PathBuf, fn(PathBuf)>;

fn discard_raw(path: PathBuf) {
    match std::fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "Discarded raw artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard raw artifact"),
    }
}

fn guard_raw(path: PathBuf) -> RawArtifact {
    scopeguard::guard(path, discard_raw as fn(PathBuf))
}

async fn discard(raw: RawArtifact) {
    let path = ScopeGuard::into_inner(raw);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!(path = %path.display(), "Discarded raw artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to discard raw artifact"),
    }
}

/// Tunables of the generation cycle
#[derive(Debug, Clone)]
pub struct ArbiterOptions {
    pub naming: AssetNaming,
    pub max_assets: u64,
    pub bucket_minutes: u32,
    /// Identity used when the renderer does not report one
    pub default_frame: FrameDescriptor,
    pub render_timeout: Duration,
}

impl Default for ArbiterOptions {
    fn default() -> Self {
        Self {
            naming: AssetNaming::new("/api/goes", "png"),
            max_assets: 500,
            bucket_minutes: crate::lifecycle::dedup::DEFAULT_BUCKET_MINUTES,
            default_frame: FrameDescriptor::new("GOES-19", "F", "ABI-L2-MCMIPF", "13"),
            render_timeout: Duration::from_secs(300),
        }
    }
}

/// Runs generation cycles against one store
pub struct GenerationArbiter {
    store: Arc<AssetStore>,
    renderer: Arc<dyn Renderer>,
    clock: Arc<dyn Clock>,
    dedup: DedupGuard,
    naming: AssetNaming,
    evictor: CapacityEvictor,
    default_frame: FrameDescriptor,
    render_timeout: Duration,
}

impl GenerationArbiter {
    pub fn new(
        store: Arc<AssetStore>,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
        options: ArbiterOptions,
    ) -> Self {
        let dedup = DedupGuard::new(store.index().clone(), options.bucket_minutes);
        Self {
            store,
            renderer,
            clock,
            dedup,
            naming: options.naming,
            evictor: CapacityEvictor::new(options.max_assets),
            default_frame: options.default_frame,
            render_timeout: options.render_timeout,
        }
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    pub fn naming(&self) -> &AssetNaming {
        &self.naming
    }

    pub fn evictor(&self) -> &CapacityEvictor {
        &self.evictor
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn renderer_mode(&self) -> &'static str {
        self.renderer.mode()
    }

    /// Run one full cycle
    ///
    /// Never panics and never returns `Err`: every failure is folded into
    /// [`GenerationOutcome::Failed`].
    pub async fn run_cycle(&self, trigger: Trigger, caption: Option<&str>) -> GenerationOutcome {
        let span = info_span!("generation_cycle", trigger = %trigger);

        async move {
            enter(CycleState::Rendering);
            let outcome = match self.render(caption).await {
                Ok(artifact) => self.admit(artifact, caption).await,
                Err(e) => {
                    warn!(error = %e, "Render failed");
                    GenerationOutcome::Failed(e)
                }
            };
            enter(CycleState::Idle);

            match &outcome {
                GenerationOutcome::Created(record) => {
                    info!(id = record.id, url_path = %record.url_path, "Frame stored")
                }
                GenerationOutcome::Duplicate => debug!("Frame already stored"),
                GenerationOutcome::Failed(e) => warn!(error = %e, "Generation cycle failed"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Invoke the renderer under the configured timeout
    async fn render(&self, caption: Option<&str>) -> Result<RenderedArtifact> {
        let artifact =
            match tokio::time::timeout(self.render_timeout, self.renderer.render(caption)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(AppError::Timeout(format!(
                        "Renderer did not finish within {}s",
                        self.render_timeout.as_secs_f64()
                    )))
                }
            };

        let is_file = tokio::fs::metadata(&artifact.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(AppError::render_error(format!(
                "Renderer output is not an existing regular file: {}",
                artifact.path.display()
            )));
        }

        Ok(artifact)
    }

    /// Fingerprint the artifact and hand it to `persist` unless it is a known frame
    async fn admit(&self, artifact: RenderedArtifact, caption: Option<&str>) -> GenerationOutcome {
        let raw = guard_raw(artifact.path);
        let frame = artifact.frame.unwrap_or_else(|| self.default_frame.clone());

        let (captured_at, fingerprint) = match (artifact.captured_at, artifact.captured_raw) {
            (Some(captured_at), _) => (
                captured_at,
                self.dedup.fingerprint(&frame.satellite, captured_at),
            ),
            (None, Some(raw_time)) => {
                let captured_at = parse_capture_time(&raw_time).unwrap_or_else(|| {
                    warn!(raw = %raw_time, "Unparsable capture time, naming frame by clock");
                    self.clock.now()
                });
                (
                    captured_at,
                    self.dedup.fingerprint_from_raw(&frame.satellite, &raw_time),
                )
            }
            (None, None) => {
                let captured_at = self.clock.now();
                (
                    captured_at,
                    self.dedup.fingerprint(&frame.satellite, captured_at),
                )
            }
        };

        match self.dedup.exists(&fingerprint).await {
            Ok(true) => {
                enter(CycleState::DedupReject);
                discard(raw).await;
                return GenerationOutcome::Duplicate;
            }
            Ok(false) => {}
            // 仅为提示性检查，唯一约束仍会兜底
            Err(e) => warn!(error = %e, "Advisory duplicate check failed"),
        }

        let url_path = self.naming.url_for(captured_at, &frame);
        let file_name = self.naming.file_name_for(&url_path);
        let asset = NewAsset {
            canonical_path: self.store.files().path_for(&file_name),
            url_path,
            file_name,
            captured_at,
            frame,
            caption: caption.map(str::to_string),
            file_size_bytes: 0,
            fingerprint,
        };

        self.persist(raw, asset).await
    }

    /// Move, insert and evict under the write gate
    async fn persist(&self, raw: RawArtifact, mut asset: NewAsset) -> GenerationOutcome {
        let files = self.store.files();
        let index = self.store.index();

        let writer = self.store.write_lock().await;
        enter(CycleState::Persisting);

        if files.exists(&asset.canonical_path).await {
            match index.find_by_url_path(&asset.url_path).await {
                Ok(Some(_)) => {
                    discard(raw).await;
                    return GenerationOutcome::Duplicate;
                }
                Ok(None) => warn!(
                    path = %asset.canonical_path.display(),
                    "Replacing orphan file at target path"
                ),
                Err(e) => {
                    discard(raw).await;
                    return GenerationOutcome::Failed(e);
                }
            }
        }

        asset.file_size_bytes = match files.place(raw.as_path(), &asset.canonical_path).await {
            Ok(size) => size,
            Err(e) => {
                discard(raw).await;
                return GenerationOutcome::Failed(e);
            }
        };
        let _ = ScopeGuard::into_inner(raw);

        let id = match index.insert(&asset).await {
            Ok(id) => id,
            Err(e) => {
                files.remove(&asset.canonical_path).await;
                if e.is_duplicate() {
                    debug!(fingerprint = %asset.fingerprint, "Lost insert race to another trigger");
                    return GenerationOutcome::Duplicate;
                }
                return GenerationOutcome::Failed(e);
            }
        };
        enter(CycleState::Indexed);

        let record = match index.find_by_id(id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return GenerationOutcome::Failed(AppError::Internal(format!(
                    "Record {} vanished after insert",
                    id
                )))
            }
            Err(e) => return GenerationOutcome::Failed(e),
        };

        enter(CycleState::Evicting);
        match self.evictor.enforce_locked(&self.store, &writer).await {
            // 新帧比所有保留帧都旧，立刻被淘汰
            Ok(report) if report.was_evicted(id) => GenerationOutcome::Duplicate,
            Ok(_) => GenerationOutcome::Created(record),
            Err(e) => {
                error!(error = %e, "Capacity enforcement failed after insert");
                GenerationOutcome::Created(record)
            }
        }
    }
}
