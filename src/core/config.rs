//! 配置管理
//!
//! 所有参数既可以通过命令行传入，也可以通过环境变量（或 `.env` 文件）设置

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::domain::{AdminSet, DEFAULT_HISTORY_LIMIT};
use crate::errors::{RelayError, Result};

/// 默认的管理员命令前缀
pub const DEFAULT_COMMAND_PREFIX: &str = "/setprompt";

/// 历史存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// 整体重写的 JSON 快照文件
    Json,
    /// 嵌入式 SQLite 数据库
    Sqlite,
}

impl std::str::FromStr for StoreType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StoreType::Json),
            "sqlite" => Ok(StoreType::Sqlite),
            _ => Err(format!("Unknown store type: {}", s)),
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreType::Json => write!(f, "json"),
            StoreType::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// 单行彩色输出，带 span 字段
    Pretty,
    /// tracing-subscriber 自带的 compact 格式
    Compact,
    /// 每行一个 JSON 对象
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log format `{}` (expected pretty, compact or json)", s))
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Telegram bot relaying conversations to an OpenAI-compatible backend"
)]
pub struct AppConfig {
    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// 管理员 ID 列表（逗号分隔）
    #[arg(long, env = "ADMINS", default_value = "")]
    pub admins: String,

    /// 提示词配置文件
    #[arg(long, env = "PROMPTS_FILE", default_value = "prompts.json")]
    pub prompts_file: PathBuf,

    /// 历史存储类型: json, sqlite
    #[arg(long, env = "HISTORY_STORE", default_value = "json")]
    pub history_store: StoreType,

    /// JSON 历史文件（json 存储下使用）
    #[arg(long, env = "HISTORY_FILE", default_value = "history.json")]
    pub history_file: PathBuf,

    /// SQLite 数据库文件（sqlite 存储下使用）
    #[arg(long, env = "HISTORY_DB", default_value = "history.db")]
    pub history_db: PathBuf,

    /// 每个会话保留的历史条数
    #[arg(long, env = "HISTORY_LIMIT", default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// 管理员设置提示词的命令前缀
    #[arg(long, env = "COMMAND_PREFIX", default_value = DEFAULT_COMMAND_PREFIX)]
    pub command_prefix: String,

    /// 非管理员发送管理员命令时直接拒绝，而不是当作普通对话处理
    #[arg(long, env = "REJECT_UNAUTHORIZED_COMMANDS")]
    pub reject_unauthorized_commands: bool,

    // LLM 配置
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub openai_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// getUpdates 长轮询超时（秒）
    #[arg(long, env = "POLLING_TIMEOUT", default_value_t = 30)]
    pub polling_timeout: u32,

    /// 停止后等待处理中消息的宽限期（秒）
    #[arg(long, env = "SHUTDOWN_GRACE", default_value_t = 10)]
    pub shutdown_grace: u64,

    /// 日志格式: pretty, compact, json
    #[arg(long, env = "LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() {
            return Err(RelayError::Config("BOT_TOKEN is required".to_string()));
        }
        if self.history_limit == 0 {
            return Err(RelayError::Config(
                "HISTORY_LIMIT must be at least 1".to_string(),
            ));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(RelayError::Config(
                "COMMAND_PREFIX must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }

    /// 解析管理员集合
    pub fn admin_set(&self) -> AdminSet {
        AdminSet::parse(&self.admins)
    }
}
