//! 领域层
//!
//! 对话轮次、提示词配置和管理员集合

pub mod admin;
pub mod prompt;
pub mod turn;

pub use admin::{AdminSet, UserId};
pub use prompt::{PromptConfig, PromptUpdate};
pub use turn::{ConversationHistory, ConversationId, ConversationTurn, Role, DEFAULT_HISTORY_LIMIT};
