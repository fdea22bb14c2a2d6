//! 对话轮次与有界历史
//!
//! 每个会话只保留最近 N 条轮次，超出时从最旧的一端淘汰

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

/// 会话标识（Telegram chat id）
pub type ConversationId = i64;

/// 默认保留的历史条数
pub const DEFAULT_HISTORY_LIMIT: usize = 15;

/// 轮次角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条对话轮次，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// 全部会话的有界历史
///
/// 序列化格式即历史文件格式：`{"<chat id>": [{"role": ..., "content": ...}]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    conversations: BTreeMap<ConversationId, VecDeque<ConversationTurn>>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条轮次，超过 `limit` 时从头部淘汰
    pub fn append(&mut self, conversation: ConversationId, turn: ConversationTurn, limit: usize) {
        let turns = self.conversations.entry(conversation).or_default();
        turns.push_back(turn);
        while turns.len() > limit {
            turns.pop_front();
        }
    }

    /// 按时间顺序返回会话历史，未知会话返回空
    pub fn get(&self, conversation: ConversationId) -> Vec<ConversationTurn> {
        self.conversations
            .get(&conversation)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, conversation: ConversationId) -> usize {
        self.conversations
            .get(&conversation)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// 已知会话数量
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    /// 按新的上限裁剪所有会话（加载旧文件后上限变小时使用）
    pub fn enforce_limit(&mut self, limit: usize) {
        for turns in self.conversations.values_mut() {
            while turns.len() > limit {
                turns.pop_front();
            }
        }
    }
}
