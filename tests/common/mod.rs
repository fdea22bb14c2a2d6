//! 测试通用工具
//!
//! 提供假后端、记录型消息通道和路由器装配辅助

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use chatrelay::{
    AdminSet, ChatBackend, ConversationId, ConversationTurn, HistoryStore, MemoryHistoryStore,
    MemoryPromptStore, MessageRouter, Messenger, PromptConfig, PromptStore, RelayError, Result,
};

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn setup() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// 测试超时包装器（用于异步测试）
pub async fn with_timeout<F, T>(duration: std::time::Duration, f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, f)
        .await
        .expect("Test timed out")
}

pub const TEST_TIMEOUT_SHORT: std::time::Duration = std::time::Duration::from_secs(5);

pub const ADMIN: i64 = 1000;
pub const STRANGER: i64 = 2000;
pub const DEFAULT_PROMPT: &str = "You are a helpful assistant.";

/// 按脚本返回结果的假后端，记录每次收到的请求
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<Vec<ConversationTurn>>>,
    delay: Option<std::time::Duration>,
    echo: bool,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.script.lock().unwrap().push_back(Ok(text.to_string()));
        self
    }

    pub fn fail(self, reason: &str) -> Self {
        self.script.lock().unwrap().push_back(Err(reason.to_string()));
        self
    }

    /// 每次调用前先挂起一段时间，让其他任务有机会插入
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 脚本为空时回复 `re: <最后一条消息>`
    pub fn echo(mut self) -> Self {
        self.echo = true;
        self
    }

    pub fn requests(&self) -> Vec<Vec<ConversationTurn>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(RelayError::Backend(reason)),
            None if self.echo => {
                let last = messages.last().map(|t| t.content.as_str()).unwrap_or("");
                Ok(format!("re: {}", last))
            }
            None => Ok("default reply".to_string()),
        }
    }
}

/// 记录所有出站操作的消息通道
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ConversationId, String)>>,
    typing: Mutex<Vec<ConversationId>>,
    fail_typing: bool,
    fail_send: bool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_typing() -> Self {
        Self {
            fail_typing: true,
            ..Self::default()
        }
    }

    pub fn failing_send() -> Self {
        Self {
            fail_send: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(ConversationId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, conversation: ConversationId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(id, _)| *id == conversation)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn typing(&self) -> Vec<ConversationId> {
        self.typing.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<()> {
        if self.fail_send {
            return Err(RelayError::Messaging("chat not found".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((conversation, text.to_string()));
        Ok(())
    }

    async fn send_typing(&self, conversation: ConversationId) -> Result<()> {
        if self.fail_typing {
            return Err(RelayError::Messaging("typing rejected".to_string()));
        }
        self.typing.lock().unwrap().push(conversation);
        Ok(())
    }
}

/// 路由器及其依赖，便于断言
pub struct Harness {
    pub router: MessageRouter,
    pub prompts: Arc<MemoryPromptStore>,
    pub history: Arc<MemoryHistoryStore>,
    pub backend: Arc<ScriptedBackend>,
    pub messenger: Arc<RecordingMessenger>,
}

impl Harness {
    pub fn new(backend: ScriptedBackend) -> Self {
        Self::with_messenger(backend, RecordingMessenger::new())
    }

    pub fn with_messenger(backend: ScriptedBackend, messenger: RecordingMessenger) -> Self {
        setup();
        let prompts = Arc::new(MemoryPromptStore::new(PromptConfig::new(DEFAULT_PROMPT)));
        let history = Arc::new(MemoryHistoryStore::default());
        let backend = Arc::new(backend);
        let messenger = Arc::new(messenger);

        let router = MessageRouter::new(
            prompts.clone() as Arc<dyn PromptStore>,
            history.clone() as Arc<dyn HistoryStore>,
            backend.clone() as Arc<dyn ChatBackend>,
            messenger.clone() as Arc<dyn Messenger>,
            AdminSet::new([ADMIN]),
        );

        Self {
            router,
            prompts,
            history,
            backend,
            messenger,
        }
    }
}
