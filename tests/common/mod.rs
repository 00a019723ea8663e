//! 集成测试辅助函数
//!
//! 提供基于临时目录的注册表和可脚本化的渲染器。

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use frame_vault::services::StoreConfiguration;
use frame_vault::{AppError, AssetRegistry, ManualClock, RenderedArtifact, Renderer, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub fn utc(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 20, h, m, 0).unwrap()
}

/// Renderer whose behavior each test scripts
pub struct ScriptedRenderer {
    staging_dir: PathBuf,
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Duration>,
    captures: Mutex<VecDeque<DateTime<Utc>>>,
    captions: Mutex<Vec<Option<String>>>,
}

impl ScriptedRenderer {
    pub fn new(staging_dir: &Path) -> Self {
        Self {
            staging_dir: staging_dir.to_path_buf(),
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            captures: Mutex::new(VecDeque::new()),
            captions: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Capture times reported by the next calls, in order; afterwards the clock decides
    pub fn queue_captures(&self, captures: &[DateTime<Utc>]) {
        self.captures.lock().extend(captures.iter().copied());
    }

    pub fn captions(&self) -> Vec<Option<String>> {
        self.captions.lock().clone()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, caption: Option<&str>) -> Result<RenderedArtifact> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.captions.lock().push(caption.map(str::to_string));
        let captured_at = self.captures.lock().pop_front();

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::render_error("upstream data unavailable"));
        }

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let path = self.staging_dir.join(format!("scripted_{}.png", n));
        tokio::fs::write(&path, format!("frame {}", n)).await?;

        let mut artifact = RenderedArtifact::new(path);
        artifact.captured_at = captured_at;
        Ok(artifact)
    }

    fn mode(&self) -> &'static str {
        "scripted"
    }
}

/// A registry over a temporary data directory
pub struct TestVault {
    pub registry: AssetRegistry,
    pub renderer: Arc<ScriptedRenderer>,
    pub clock: Arc<ManualClock>,
    pub config: StoreConfiguration,
    pub temp_dir: TempDir,
}

impl TestVault {
    pub fn image_dir(&self) -> PathBuf {
        std::fs::canonicalize(self.config.image_dir()).unwrap()
    }

    /// Close and reopen the registry over the same directory
    pub async fn reopen(self, config: StoreConfiguration) -> TestVault {
        let TestVault {
            registry,
            renderer,
            clock,
            temp_dir,
            ..
        } = self;
        registry.stop().await;
        drop(registry);

        let registry = AssetRegistry::open(&config, renderer.clone(), clock.clone())
            .await
            .unwrap();
        TestVault {
            registry,
            renderer,
            clock,
            config,
            temp_dir,
        }
    }
}

pub fn test_config(data_dir: &Path, max_assets: u64) -> StoreConfiguration {
    let mut config = StoreConfiguration::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.generation.max_assets = max_assets;
    config.generation.interval_seconds = 3600;
    config.generation.render_timeout_seconds = 5;
    config
}

pub async fn open_vault(max_assets: u64) -> TestVault {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path(), max_assets);
    open_vault_with(temp_dir, config).await
}

pub async fn open_vault_with(temp_dir: TempDir, config: StoreConfiguration) -> TestVault {
    let renderer = Arc::new(ScriptedRenderer::new(&config.staging_dir()));
    let clock = Arc::new(ManualClock::new(utc(21, 30)));
    let registry = AssetRegistry::open(&config, renderer.clone(), clock.clone())
        .await
        .unwrap();

    TestVault {
        registry,
        renderer,
        clock,
        config,
        temp_dir,
    }
}
