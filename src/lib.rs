//! Telegram 对话转发机器人
//!
//! 接收消息平台的消息，为每个会话维护有界的短历史，
//! 连同可配置的系统提示词一起转发给文本生成后端，再把回复发回会话。
//!
//! # 架构分层
//!
//! - `domain`: 领域层，对话轮次、提示词配置、管理员集合
//! - `core`: 核心层，配置与存储/消息/后端抽象
//! - `infrastructure`: 基础设施层，Telegram、OpenAI、JSON/SQLite、日志
//! - `application`: 应用层，消息路由与运行循环

// 领域层
pub mod domain;

// 核心层
pub mod core;

// 基础设施层
pub mod infrastructure;

// 应用层
pub mod application;

pub mod bootstrap;
pub mod errors;

// 重新导出常用类型
pub use application::bot::BotRunner;
pub use application::router::{MessageRouter, Replies, RouteOutcome, RouterOptions};
pub use core::backend::ChatBackend;
pub use core::config::{AppConfig, StoreType};
pub use core::messaging::{InboundMessage, Messenger};
pub use core::store::{HistoryStore, MemoryHistoryStore, MemoryPromptStore, PromptStore};
pub use domain::{
    AdminSet, ConversationHistory, ConversationId, ConversationTurn, PromptConfig, PromptUpdate,
    Role, UserId,
};
pub use errors::{RelayError, Result};
pub use infrastructure::llm::OpenAIClient;
pub use infrastructure::store::{JsonHistoryStore, JsonPromptStore, SqliteHistoryStore};
pub use infrastructure::telegram::TelegramClient;

/// 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
