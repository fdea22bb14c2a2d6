//! 存储接口定义
//!
//! 提示词配置与对话历史的持久化抽象，支持内存、JSON 文件和 SQLite 实现

use async_trait::async_trait;

use crate::domain::{ConversationId, ConversationTurn, PromptConfig, PromptUpdate, Role};
use crate::errors::Result;

pub mod memory;

pub use memory::{MemoryHistoryStore, MemoryPromptStore};

/// 提示词配置存储
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// 当前配置快照
    async fn config(&self) -> PromptConfig;

    /// 设置管理员提示词
    ///
    /// 空白输入返回 `PromptUpdate::RejectedEmpty` 且不写盘；
    /// 写盘失败以错误返回
    async fn set_admin_prompt(&self, candidate: &str) -> Result<PromptUpdate>;

    /// 当前生效的系统提示词
    async fn effective_prompt(&self) -> String {
        self.config().await.effective_prompt().to_string()
    }
}

/// 对话历史存储
///
/// 每次追加后都会同步持久化
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 追加一条轮次，超出上限时淘汰最旧的轮次
    async fn append(&self, conversation: ConversationId, turn: ConversationTurn) -> Result<()>;

    /// 按时间顺序读取会话历史，未知会话返回空
    async fn get(&self, conversation: ConversationId) -> Result<Vec<ConversationTurn>>;

    /// 每个会话的历史上限
    fn limit(&self) -> usize;

    /// 便捷方法：按角色和内容追加
    async fn append_turn(
        &self,
        conversation: ConversationId,
        role: Role,
        content: &str,
    ) -> Result<()> {
        self.append(conversation, ConversationTurn::new(role, content))
            .await
    }
}
