//! 日志初始化
//!
//! 控制台输出（文本或 JSON），可选按天滚动的文件输出。`RUST_LOG` 优先于配置中的级别。

use crate::services::LoggingSettings;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "frame-vault.log";

/// Install the global subscriber
///
/// Returns the file writer guard when file output is enabled; keep it alive
/// for the lifetime of the process or buffered lines are lost. Calling this
/// twice (as tests do) leaves the first subscriber in place.
pub fn init_tracing(settings: &LoggingSettings) -> eyre::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.level))?;

    let (file_layer, guard) = match &settings.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let (json_layer, text_layer) = if settings.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer().with_target(true)))
    };

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already initialized, skipping");
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_with_file_output_returns_guard() {
        let temp_dir = TempDir::new().unwrap();
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json: true,
            directory: Some(temp_dir.path().join("logs")),
        };

        let guard = init_tracing(&settings).unwrap();
        assert!(guard.is_some());
        assert!(temp_dir.path().join("logs").is_dir());

        // 重复初始化不应失败
        assert!(init_tracing(&LoggingSettings::default()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let settings = LoggingSettings {
            level: "frame_vault=notalevel".to_string(),
            ..Default::default()
        };
        // RUST_LOG 未设置时才会读取配置中的级别
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(init_tracing(&settings).is_err());
        }
    }
}
