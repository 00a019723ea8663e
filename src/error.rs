use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/**
 * 资产存储错误类型 - 使用 miette 提供诊断信息
 *
 * 重复帧 (`DuplicateKey`) 是正常结果而不是故障，调用方应通过
 * `is_duplicate()` 分支处理，而不是匹配日志字符串。
 */
#[derive(Error, Debug, Diagnostic)]
pub enum AppError {
    #[error("IO error: {0}")]
    #[diagnostic(code(vault::io_error))]
    Io(#[from] std::io::Error),

    #[error("IO error: {message}")]
    #[diagnostic(code(vault::io_error_detailed))]
    IoDetailed {
        message: String,
        path: Option<PathBuf>,
    },

    #[error("Database error: {0}")]
    #[diagnostic(
        code(vault::database_error),
        help("Check database connection and schema integrity")
    )]
    DatabaseError(String),

    #[error("Duplicate key: {0}")]
    #[diagnostic(code(vault::duplicate_key))]
    DuplicateKey(String),

    #[error("Not found: {0}")]
    #[diagnostic(code(vault::not_found))]
    NotFound(String),

    #[error("Render error: {0}")]
    #[diagnostic(
        code(vault::render_error),
        help("Check the renderer configuration and its output location")
    )]
    Render(String),

    #[error("Timeout error: {0}")]
    #[diagnostic(code(vault::timeout_error))]
    Timeout(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(vault::config_error))]
    Config(String),

    #[error("Validation error: {0}")]
    #[diagnostic(
        code(vault::validation_error),
        help("Check that the configuration meets the required constraints")
    )]
    Validation(String),

    #[error("Internal error: {0}")]
    #[diagnostic(code(vault::internal_error))]
    Internal(String),
}

impl AppError {
    /**
     * 创建数据库错误
     */
    pub fn database_error(message: impl Into<String>) -> Self {
        AppError::DatabaseError(message.into())
    }

    /**
     * 创建详细的IO错误
     */
    pub fn io_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        AppError::IoDetailed {
            message: message.into(),
            path,
        }
    }

    pub fn render_error(message: impl Into<String>) -> Self {
        AppError::Render(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    /// 唯一约束冲突（同一帧已被其他触发器写入）
    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppError::DuplicateKey(_))
    }

    /// 渲染阶段的失败（包括超时）
    pub fn is_render_failure(&self) -> bool {
        matches!(self, AppError::Render(_) | AppError::Timeout(_))
    }

    /// 文件存储阶段的失败
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, AppError::Io(_) | AppError::IoDetailed { .. })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::DuplicateKey(db_err.message().to_string())
            }
            other => AppError::DatabaseError(other.to_string()),
        }
    }
}

/**
 * 统一结果类型
 */
pub type Result<T> = std::result::Result<T, AppError>;
