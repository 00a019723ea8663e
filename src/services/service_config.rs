//! 服务配置模块
//!
//! 分层加载：
//! - 默认值
//! - TOML/JSON 配置文件（可选）
//! - `FRAME_VAULT__SECTION__KEY` 环境变量覆盖
//!
//! 加载后立即校验，无效配置在启动时失败。

use crate::error::{AppError, Result as AppResult};
use crate::lifecycle::{ArbiterOptions, AssetNaming};
use crate::models::FrameDescriptor;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use validator::Validate;

pub const ENV_PREFIX: &str = "FRAME_VAULT";
pub const ENV_SEPARATOR: &str = "__";

/// 服务配置
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreConfiguration {
    #[validate(nested)]
    pub storage: StorageSettings,
    #[validate(nested)]
    pub generation: GenerationSettings,
    #[validate(nested)]
    pub naming: NamingSettings,
    #[validate(nested)]
    pub frame: FrameSettings,
    pub renderer: RendererSettings,
    #[validate(nested)]
    pub logging: LoggingSettings,
}

/// 存储布局配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StorageSettings {
    /// 数据根目录
    pub data_dir: PathBuf,
    /// 图片目录（相对于 data_dir）
    pub image_dir: PathBuf,
    /// SQLite 文件名（相对于 data_dir）
    pub database_file: PathBuf,
    /// 渲染暂存目录（相对于 data_dir）
    pub staging_dir: PathBuf,
    #[validate(length(min = 1, max = 16))]
    pub image_extension: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            image_dir: PathBuf::from("images"),
            database_file: PathBuf::from("metadata.db"),
            staging_dir: PathBuf::from("staging"),
            image_extension: "png".to_string(),
        }
    }
}

/// 生成周期配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GenerationSettings {
    /// 保留的最大帧数
    #[validate(range(min = 1, max = 1_000_000))]
    pub max_assets: u64,
    /// 定时生成间隔（秒）
    #[validate(range(min = 1, max = 86_400))]
    pub interval_seconds: u64,
    /// 去重时间桶宽度（分钟）
    #[validate(range(min = 1, max = 60))]
    pub dedup_bucket_minutes: u32,
    /// 渲染超时（秒）
    #[validate(range(min = 1, max = 3_600))]
    pub render_timeout_seconds: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_assets: 500,
            interval_seconds: 180, // 3 分钟
            dedup_bucket_minutes: 3,
            render_timeout_seconds: 300, // 5 分钟
        }
    }
}

/// URL 命名配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NamingSettings {
    #[validate(length(max = 200))]
    pub namespace: String,
    #[validate(length(min = 1, max = 500))]
    pub public_base_url: String,
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            namespace: "/api/goes".to_string(),
            public_base_url: "https://data.pettusplots.com".to_string(),
        }
    }
}

/// 渲染器未报告帧身份时使用的默认值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FrameSettings {
    #[validate(length(min = 1, max = 64))]
    pub satellite: String,
    #[validate(length(min = 1, max = 16))]
    pub sector: String,
    #[validate(length(min = 1, max = 64))]
    pub product: String,
    #[validate(length(min = 1, max = 8))]
    pub band: String,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            satellite: "GOES-19".to_string(),
            sector: "F".to_string(),
            product: "ABI-L2-MCMIPF".to_string(),
            band: "13".to_string(),
        }
    }
}

impl FrameSettings {
    pub fn descriptor(&self) -> FrameDescriptor {
        FrameDescriptor::new(&self.satellite, &self.sector, &self.product, &self.band)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererMode {
    #[default]
    Mock,
    Command,
}

/// 渲染器配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub mode: RendererMode,
    /// 外部命令及参数，`mode = "command"` 时必填
    pub command: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoggingSettings {
    /// EnvFilter 指令，`RUST_LOG` 优先
    #[validate(length(min = 1, max = 500))]
    pub level: String,
    pub json: bool,
    /// 设置后按天滚动写入文件
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: None,
        }
    }
}

impl StoreConfiguration {
    /// 加载配置：可选文件 + 环境变量
    ///
    /// # Errors
    /// 文件缺失、格式错误或校验失败时返回错误
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .list_separator(" ")
            .with_list_parse_key("renderer.command")
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(env)
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        match path {
            Some(path) => tracing::info!("Loaded configuration from: {}", path.display()),
            None => tracing::info!("Loaded default configuration"),
        }
        Ok(config)
    }

    /// 从 TOML 文件加载配置（不读取环境变量）
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// 创建开发环境默认配置
    pub fn development() -> Self {
        Self {
            storage: StorageSettings {
                data_dir: PathBuf::from("./data-dev"),
                ..Default::default()
            },
            generation: GenerationSettings {
                max_assets: 50,
                interval_seconds: 60,
                ..Default::default()
            },
            logging: LoggingSettings {
                level: "debug".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// 创建生产环境默认配置
    pub fn production() -> Self {
        Self {
            logging: LoggingSettings {
                level: "info".to_string(),
                json: true,
                directory: Some(PathBuf::from("./logs")),
            },
            ..Default::default()
        }
    }

    /// 验证配置
    ///
    /// # Errors
    /// 字段越界或渲染器配置不完整时返回 `AppError::Validation`
    pub fn validate(&self) -> AppResult<()> {
        Validate::validate(self).map_err(|e| AppError::validation_error(e.to_string()))?;

        if self.renderer.mode == RendererMode::Command && self.renderer.command.is_empty() {
            return Err(AppError::validation_error(
                "renderer.command must be set when renderer.mode is \"command\"",
            ));
        }

        if self.storage.image_dir == self.storage.staging_dir {
            return Err(AppError::validation_error(
                "storage.staging_dir must differ from storage.image_dir",
            ));
        }

        // 启动时会清空暂存区，不能指向数据根目录
        let names_subdir = self
            .storage
            .staging_dir
            .components()
            .any(|c| matches!(c, Component::Normal(_)));
        if !names_subdir || self.storage.staging_dir.is_absolute() {
            return Err(AppError::validation_error(
                "storage.staging_dir must be a subdirectory of storage.data_dir",
            ));
        }

        tracing::debug!("Configuration validated successfully");
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.database_file)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.image_dir)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.staging_dir)
    }

    pub fn generation_interval(&self) -> Duration {
        Duration::from_secs(self.generation.interval_seconds)
    }

    pub fn naming(&self) -> AssetNaming {
        AssetNaming::new(&self.naming.namespace, &self.storage.image_extension)
    }

    pub fn arbiter_options(&self) -> ArbiterOptions {
        ArbiterOptions {
            naming: self.naming(),
            max_assets: self.generation.max_assets,
            bucket_minutes: self.generation.dedup_bucket_minutes,
            default_frame: self.frame.descriptor(),
            render_timeout: Duration::from_secs(self.generation.render_timeout_seconds),
        }
    }
}
