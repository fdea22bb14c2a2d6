//! 标准化错误处理
//!
//! 定义项目专用的错误类型

use thiserror::Error;

/// 项目主要错误类型
#[derive(Error, Debug)]
pub enum RelayError {
    /// 提示词配置文件缺失或格式错误（启动时致命）
    #[error("Prompt config load error: {0}")]
    ConfigLoad(String),

    /// 历史记录存储格式错误（启动时致命）
    #[error("History load error: {0}")]
    HistoryLoad(String),

    /// 持久化写入错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 文本生成后端错误
    #[error("Backend error: {0}")]
    Backend(String),

    /// 消息平台错误
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// 进程配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// 内部任务错误（例如处理任务 panic）
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Storage(err.to_string())
    }
}

impl From<rusqlite::Error> for RelayError {
    fn from(err: rusqlite::Error) -> Self {
        RelayError::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest 的错误信息里带有请求 URL，而 Telegram 的 URL 含有 bot token
        RelayError::Messaging(err.without_url().to_string())
    }
}

/// 项目结果类型别名
pub type Result<T> = std::result::Result<T, RelayError>;
