//! 内存存储实现
//!
//! 数据仅在内存中，重启后丢失，适合测试

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    ConversationHistory, ConversationId, ConversationTurn, PromptConfig, PromptUpdate,
    DEFAULT_HISTORY_LIMIT,
};
use crate::errors::Result;

use super::{HistoryStore, PromptStore};

/// 内存提示词存储
pub struct MemoryPromptStore {
    config: RwLock<PromptConfig>,
}

impl MemoryPromptStore {
    pub fn new(config: PromptConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl PromptStore for MemoryPromptStore {
    async fn config(&self) -> PromptConfig {
        self.config.read().await.clone()
    }

    async fn set_admin_prompt(&self, candidate: &str) -> Result<PromptUpdate> {
        let mut config = self.config.write().await;
        Ok(config.set_admin_prompt(candidate))
    }
}

/// 内存历史存储
pub struct MemoryHistoryStore {
    history: RwLock<ConversationHistory>,
    limit: usize,
}

impl MemoryHistoryStore {
    pub fn new(limit: usize) -> Self {
        Self {
            history: RwLock::new(ConversationHistory::new()),
            limit,
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, conversation: ConversationId, turn: ConversationTurn) -> Result<()> {
        let mut history = self.history.write().await;
        history.append(conversation, turn, self.limit);
        Ok(())
    }

    async fn get(&self, conversation: ConversationId) -> Result<Vec<ConversationTurn>> {
        let history = self.history.read().await;
        Ok(history.get(conversation))
    }

    fn limit(&self) -> usize {
        self.limit
    }
}
