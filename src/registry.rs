//! 资产注册表：对外的读取与触发接口
//!
//! `open` 依次完成：创建目录、清理暂存区、打开索引、启动对账、容量检查。返回之后才允许读取或生成，
//! 因此读者不会看到对账前的漂移状态。

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::lifecycle::{
    AssetNaming, EvictionReport, GenerationArbiter, GenerationScheduler,
};
use crate::models::{AssetRecord, GenerationOutcome, Lookup, Trigger};
use crate::renderer::{self, Renderer};
use crate::services::{ServiceHealth, StoreConfiguration};
use crate::storage::{AssetStore, ReconcileReport, ReconciliationEngine};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "frame-vault";

/// 启动阶段的修复结果
#[derive(Debug, Clone, Default)]
pub struct StartupReport {
    /// 上次运行遗留在暂存区的原始文件数
    pub staging_cleared: usize,
    pub reconcile: ReconcileReport,
    pub eviction: EvictionReport,
}

/// Facade over the store, the generation cycle and the scheduler
pub struct AssetRegistry {
    arbiter: Arc<GenerationArbiter>,
    naming: AssetNaming,
    interval: Duration,
    public_base_url: String,
    scheduler: Mutex<Option<GenerationScheduler>>,
    startup: StartupReport,
}

impl AssetRegistry {
    /// Open with the renderer selected by configuration and the system clock
    pub async fn from_config(config: &StoreConfiguration) -> Result<Self> {
        let renderer = renderer::from_settings(&config.renderer, &config.staging_dir())?;
        Self::open(config, renderer, Arc::new(SystemClock)).await
    }

    /// Open the store, repair drift and enforce capacity
    ///
    /// # Errors
    ///
    /// - invalid configuration
    /// - directories or the database cannot be opened
    /// - the image directory or index cannot be listed during reconciliation
    pub async fn open(
        config: &StoreConfiguration,
        renderer: Arc<dyn Renderer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let staging_dir = config.staging_dir();
        tokio::fs::create_dir_all(&staging_dir).await.map_err(|e| {
            crate::error::AppError::io_error(
                format!("Failed to create staging directory: {}", e),
                Some(staging_dir.clone()),
            )
        })?;
        let staging_cleared = renderer::clear_staging(&staging_dir).await?;

        let store = Arc::new(
            AssetStore::open(
                &config.database_path(),
                &config.image_dir(),
                &config.storage.image_extension,
            )
            .await?,
        );

        let reconcile = ReconciliationEngine::new(&store).run().await?;

        let options = config.arbiter_options();
        let naming = options.naming.clone();
        let arbiter = Arc::new(GenerationArbiter::new(store, renderer, clock, options));
        let eviction = arbiter.evictor().enforce(arbiter.store()).await?;

        info!(
            image_dir = %arbiter.store().files().root().display(),
            staging_cleared,
            repaired = reconcile.change_count(),
            evicted = eviction.removed_count(),
            renderer = arbiter.renderer_mode(),
            "Asset registry opened"
        );

        Ok(Self {
            arbiter,
            naming,
            interval: config.generation_interval(),
            public_base_url: config.naming.public_base_url.clone(),
            scheduler: Mutex::new(None),
            startup: StartupReport {
                staging_cleared,
                reconcile,
                eviction,
            },
        })
    }

    pub fn startup_report(&self) -> &StartupReport {
        &self.startup
    }

    pub fn naming(&self) -> &AssetNaming {
        &self.naming
    }

    pub fn public_url(&self, record: &AssetRecord) -> String {
        record.public_url(&self.public_base_url)
    }

    /// Newest frame by capture time
    pub async fn get_latest(&self) -> Result<Option<AssetRecord>> {
        self.arbiter.store().index().find_latest().await
    }

    /// All frames, newest first
    pub async fn list_all(&self) -> Result<Vec<AssetRecord>> {
        self.arbiter.store().index().list_all().await
    }

    pub async fn count(&self) -> Result<u64> {
        self.arbiter.store().index().count_all().await
    }

    /// Look up a frame, generating one on a miss
    ///
    /// Accepts the path with or without the image extension. A record whose
    /// file has vanished counts as a miss. A miss runs exactly one on-demand
    /// cycle.
    pub async fn get_by_url_path(&self, requested: &str) -> Lookup {
        let url_path = self.naming.normalize_request(requested);
        let store = self.arbiter.store();

        match store.index().find_by_url_path(url_path).await {
            Ok(Some(record)) => {
                if store.files().exists(&record.canonical_path).await {
                    return Lookup::Found(record);
                }
                warn!(
                    url_path = %url_path,
                    path = %record.canonical_path.display(),
                    "Indexed frame is missing on disk"
                );
            }
            Ok(None) => {}
            Err(e) => return Lookup::Failed(e),
        }

        let caption = format!("On-demand {}", self.arbiter.clock().now().format("%H:%M"));
        match self
            .arbiter
            .run_cycle(Trigger::OnDemand, Some(&caption))
            .await
        {
            GenerationOutcome::Created(record) => Lookup::Generated(record),
            GenerationOutcome::Duplicate => Lookup::NotFound,
            GenerationOutcome::Failed(e) => Lookup::Failed(e),
        }
    }

    /// Run one cycle now; defaults the caption to `"Manual HH:MM"`
    pub async fn trigger_generation(&self, caption: Option<String>) -> GenerationOutcome {
        let caption = caption
            .unwrap_or_else(|| format!("Manual {}", self.arbiter.clock().now().format("%H:%M")));
        self.arbiter.run_cycle(Trigger::Manual, Some(&caption)).await
    }

    /// Generate one frame if the store is empty
    ///
    /// Returns `None` when frames already exist.
    pub async fn ensure_initial_asset(&self) -> Result<Option<GenerationOutcome>> {
        if self.count().await? > 0 {
            return Ok(None);
        }

        info!("Store is empty, generating initial frame");
        Ok(Some(
            self.arbiter
                .run_cycle(Trigger::Startup, Some("Server Started"))
                .await,
        ))
    }

    /// Start the periodic scheduler
    ///
    /// Returns `false` if it is already running.
    pub fn start(&self) -> bool {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            warn!("Scheduler already running");
            return false;
        }
        *scheduler = Some(GenerationScheduler::start(
            self.arbiter.clone(),
            self.interval,
        ));
        true
    }

    /// Stop the scheduler, waiting for an in-flight cycle
    pub async fn stop(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.stop().await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .map(|s| s.is_running())
            .unwrap_or(false)
    }

    /// Health snapshot
    pub async fn health_check(&self) -> ServiceHealth {
        let index = self.arbiter.store().index();

        if let Err(e) = index.ping().await {
            return ServiceHealth::unhealthy(SERVICE_NAME, e.to_string());
        }

        let (total, latest) = match (index.count_all().await, index.find_latest().await) {
            (Ok(total), Ok(latest)) => (total, latest),
            (Err(e), _) | (_, Err(e)) => {
                return ServiceHealth::unhealthy(SERVICE_NAME, e.to_string())
            }
        };

        let health = match &latest {
            Some(_) => ServiceHealth::healthy(SERVICE_NAME),
            None => ServiceHealth::degraded(SERVICE_NAME, "No frames stored yet"),
        };

        let health = health
            .with_detail("database", "connected")
            .with_detail("total_assets", total)
            .with_detail("max_assets", self.arbiter.evictor().max_assets())
            .with_detail("renderer_mode", self.arbiter.renderer_mode())
            .with_detail("interval_seconds", self.interval.as_secs())
            .with_detail("scheduler_running", self.is_running());

        match latest {
            Some(record) => health
                .with_detail("latest_url_path", &record.url_path)
                .with_detail("latest_captured_at", record.captured_at.to_rfc3339()),
            None => health,
        }
    }
}
