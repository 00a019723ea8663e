//! frame-vault 主入口
//!
//! 用法: `frame-vault [CONFIG_PATH]`
//!
//! - 加载配置并初始化日志
//! - 打开注册表（对账 + 容量检查）
//! - 空库时生成首帧，启动定时调度
//! - Ctrl-C 后停止调度

use eyre::{Context, Result};
use frame_vault::logging::init_tracing;
use frame_vault::{AssetRegistry, GenerationOutcome, StoreConfiguration};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = StoreConfiguration::load(config_path.as_deref())?;

    let _log_guard = init_tracing(&config.logging)?;

    info!(
        "frame-vault v{} starting (renderer: {:?}, interval: {}s, max assets: {})",
        env!("CARGO_PKG_VERSION"),
        config.renderer.mode,
        config.generation.interval_seconds,
        config.generation.max_assets
    );

    let registry = AssetRegistry::from_config(&config)
        .await
        .context("Failed to open asset registry")?;

    match registry.ensure_initial_asset().await? {
        Some(GenerationOutcome::Created(record)) => {
            info!(url = %registry.public_url(&record), "Initial frame stored")
        }
        Some(GenerationOutcome::Failed(e)) => warn!(error = %e, "Initial frame generation failed"),
        Some(GenerationOutcome::Duplicate) | None => {}
    }

    registry.start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");
    registry.stop().await;

    let health = registry.health_check().await;
    info!(status = %health.status, details = ?health.details, "Final health");

    Ok(())
}
