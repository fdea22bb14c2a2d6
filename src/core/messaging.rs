//! 消息平台抽象
//!
//! 入站消息结构和出站操作接口（发送文本、发送“正在输入”状态）

use async_trait::async_trait;

use crate::domain::{ConversationId, UserId};
use crate::errors::Result;

/// 入站消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// 会话标识
    pub conversation: ConversationId,
    /// 发送者标识
    pub sender: UserId,
    /// 消息正文
    pub text: String,
}

impl InboundMessage {
    pub fn new(conversation: ConversationId, sender: UserId, text: impl Into<String>) -> Self {
        Self {
            conversation,
            sender,
            text: text.into(),
        }
    }
}

/// 出站消息通道
#[async_trait]
pub trait Messenger: Send + Sync {
    /// 向会话发送文本
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<()>;

    /// 发送“正在输入”提示
    async fn send_typing(&self, conversation: ConversationId) -> Result<()>;
}
