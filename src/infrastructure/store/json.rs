//! JSON 文件存储实现
//!
//! 每次修改都整体重写快照文件：先写临时文件再重命名覆盖，
//! 读者不会看到写了一半的文件

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::store::{HistoryStore, PromptStore};
use crate::domain::{
    ConversationHistory, ConversationId, ConversationTurn, PromptConfig, PromptUpdate,
};
use crate::errors::{RelayError, Result};

/// 原子写入：写入同目录下的临时文件后重命名
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents)
        .await
        .map_err(|e| RelayError::Storage(format!("failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path).await.map_err(|e| {
        RelayError::Storage(format!("failed to replace {}: {}", path.display(), e))
    })?;
    Ok(())
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| RelayError::Storage(e.to_string()))
}

/// JSON 提示词存储
pub struct JsonPromptStore {
    path: PathBuf,
    config: Mutex<PromptConfig>,
}

impl JsonPromptStore {
    /// 加载提示词文件，文件缺失或格式错误都是致命错误
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let raw = tokio::fs::read(&path).await.map_err(|e| {
            RelayError::ConfigLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: PromptConfig = serde_json::from_slice(&raw).map_err(|e| {
            RelayError::ConfigLoad(format!("malformed {}: {}", path.display(), e))
        })?;

        info!(
            path = %path.display(),
            admin_override = config.admin_prompt.is_some(),
            "loaded prompt config"
        );

        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PromptStore for JsonPromptStore {
    async fn config(&self) -> PromptConfig {
        self.config.lock().await.clone()
    }

    async fn set_admin_prompt(&self, candidate: &str) -> Result<PromptUpdate> {
        let mut config = self.config.lock().await;

        // 先在副本上修改，写盘成功后再替换内存状态
        let mut updated = config.clone();
        let outcome = updated.set_admin_prompt(candidate);
        if outcome == PromptUpdate::RejectedEmpty {
            return Ok(outcome);
        }

        write_atomic(&self.path, &to_pretty_json(&updated)?).await?;
        *config = updated;
        Ok(outcome)
    }
}

/// JSON 历史存储
pub struct JsonHistoryStore {
    path: PathBuf,
    limit: usize,
    history: Mutex<ConversationHistory>,
}

impl JsonHistoryStore {
    /// 加载历史文件，文件不存在时从空历史开始
    pub async fn load(path: impl Into<PathBuf>, limit: usize) -> Result<Self> {
        let path = path.into();
        let mut history = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice::<ConversationHistory>(&raw).map_err(|e| {
                RelayError::HistoryLoad(format!("malformed {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "history file not found, starting empty");
                ConversationHistory::new()
            }
            Err(e) => {
                return Err(RelayError::HistoryLoad(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        history.enforce_limit(limit);

        info!(
            path = %path.display(),
            conversations = history.conversation_count(),
            "loaded conversation history"
        );

        Ok(Self {
            path,
            limit,
            history: Mutex::new(history),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonHistoryStore {
    async fn append(&self, conversation: ConversationId, turn: ConversationTurn) -> Result<()> {
        // 持有锁直到写盘完成，保证快照按追加顺序落盘
        let mut history = self.history.lock().await;
        history.append(conversation, turn, self.limit);
        write_atomic(&self.path, &to_pretty_json(&*history)?).await
    }

    async fn get(&self, conversation: ConversationId) -> Result<Vec<ConversationTurn>> {
        Ok(self.history.lock().await.get(conversation))
    }

    fn limit(&self) -> usize {
        self.limit
    }
}
