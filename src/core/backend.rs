//! 文本生成后端抽象

use async_trait::async_trait;

use crate::domain::ConversationTurn;
use crate::errors::Result;

/// 文本生成后端
///
/// 接收完整的消息列表（系统提示词在前，随后是会话历史），返回一次性的非流式回复
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String>;
}
