//! 消息路由器
//!
//! 每条入站消息的唯一入口，分两条路径处理：
//! - 管理员命令：修改全局系统提示词
//! - 普通对话：记录历史、拼装请求、调用后端、转发回复

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::backend::ChatBackend;
use crate::core::config::{AppConfig, DEFAULT_COMMAND_PREFIX};
use crate::core::messaging::{InboundMessage, Messenger};
use crate::core::store::{HistoryStore, PromptStore};
use crate::domain::{AdminSet, ConversationId, ConversationTurn, PromptUpdate, Role};
use crate::errors::Result;
use crate::infrastructure::logger::Timer;

/// 固定的回复文案
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replies {
    /// 管理员命令缺少参数
    pub empty_prompt: String,
    /// 提示词已更新
    pub prompt_updated: String,
    /// 后端调用失败
    pub backend_failure: String,
    /// 非管理员使用管理员命令（仅在拒绝模式下发送）
    pub not_permitted: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            empty_prompt: "⚠️ Please provide the prompt text after the command.".to_string(),
            prompt_updated: "✅ New prompt set!".to_string(),
            backend_failure: "❌ Error while processing the request.".to_string(),
            not_permitted: "⛔ You are not allowed to change the prompt.".to_string(),
        }
    }
}

/// 路由选项
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// 管理员命令前缀
    pub command_prefix: String,
    /// 非管理员发送命令时拒绝，而不是当作普通对话
    pub reject_unauthorized_commands: bool,
    pub replies: Replies,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            reject_unauthorized_commands: false,
            replies: Replies::default(),
        }
    }
}

impl RouterOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            command_prefix: config.command_prefix.clone(),
            reject_unauthorized_commands: config.reject_unauthorized_commands,
            replies: Replies::default(),
        }
    }
}

/// 单条消息的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// 管理员提示词已更新
    PromptUpdated(String),
    /// 管理员命令参数为空，未做修改
    PromptRejected,
    /// 非管理员命令被拒绝
    CommandRefused,
    /// 后端回复已转发
    Replied,
    /// 后端调用失败，已发送通用错误提示
    BackendFailed,
}

/// 消息路由器
///
/// 自身不持有业务状态，只编排存储、后端和消息通道；
/// 同一会话的对话轮次通过会话锁串行执行
pub struct MessageRouter {
    prompts: Arc<dyn PromptStore>,
    history: Arc<dyn HistoryStore>,
    backend: Arc<dyn ChatBackend>,
    messenger: Arc<dyn Messenger>,
    admins: AdminSet,
    options: RouterOptions,
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl MessageRouter {
    pub fn new(
        prompts: Arc<dyn PromptStore>,
        history: Arc<dyn HistoryStore>,
        backend: Arc<dyn ChatBackend>,
        messenger: Arc<dyn Messenger>,
        admins: AdminSet,
    ) -> Self {
        Self {
            prompts,
            history,
            backend,
            messenger,
            admins,
            options: RouterOptions::default(),
            locks: DashMap::new(),
        }
    }

    pub fn with_options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// 处理一条入站消息
    ///
    /// 后端失败会转换成用户可见的提示；存储写入失败以错误返回
    pub async fn handle(&self, message: InboundMessage) -> Result<RouteOutcome> {
        if let Some(argument) = message.text.strip_prefix(self.options.command_prefix.as_str()) {
            if self.admins.is_authorized(message.sender) {
                return self.handle_set_prompt(&message, argument).await;
            }

            if self.options.reject_unauthorized_commands {
                warn!(
                    conversation = message.conversation,
                    sender = message.sender,
                    "refusing prompt command from non-admin"
                );
                self.deliver(message.conversation, &self.options.replies.not_permitted)
                    .await;
                return Ok(RouteOutcome::CommandRefused);
            }

            debug!(
                conversation = message.conversation,
                sender = message.sender,
                "prompt command from non-admin, treating as conversation"
            );
        }

        self.handle_turn(&message).await
    }

    async fn handle_set_prompt(
        &self,
        message: &InboundMessage,
        argument: &str,
    ) -> Result<RouteOutcome> {
        match self.prompts.set_admin_prompt(argument).await? {
            PromptUpdate::Applied(prompt) => {
                info!(
                    sender = message.sender,
                    chars = prompt.chars().count(),
                    "admin prompt updated"
                );
                self.deliver(message.conversation, &self.options.replies.prompt_updated)
                    .await;
                Ok(RouteOutcome::PromptUpdated(prompt))
            }
            PromptUpdate::RejectedEmpty => {
                self.deliver(message.conversation, &self.options.replies.empty_prompt)
                    .await;
                Ok(RouteOutcome::PromptRejected)
            }
        }
    }

    async fn handle_turn(&self, message: &InboundMessage) -> Result<RouteOutcome> {
        let conversation = message.conversation;
        let lock = self.conversation_lock(conversation);
        let _guard = lock.lock().await;

        let system_prompt = self.prompts.effective_prompt().await;
        self.history
            .append_turn(conversation, Role::User, &message.text)
            .await?;

        let mut request = vec![ConversationTurn::system(system_prompt)];
        request.extend(self.history.get(conversation).await?);

        if let Err(e) = self.messenger.send_typing(conversation).await {
            debug!(conversation, "typing indicator failed: {}", e);
        }

        let result = {
            let _timer = Timer::new("backend_call").with_conversation(conversation);
            self.backend.complete(&request).await
        };

        match result {
            Ok(reply) => {
                self.history
                    .append_turn(conversation, Role::Assistant, &reply)
                    .await?;
                self.deliver(conversation, &reply).await;
                Ok(RouteOutcome::Replied)
            }
            Err(e) => {
                error!(conversation, "backend call failed: {}", e);
                self.deliver(conversation, &self.options.replies.backend_failure)
                    .await;
                Ok(RouteOutcome::BackendFailed)
            }
        }
    }

    fn conversation_lock(&self, conversation: ConversationId) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// 发送回复，失败只记录日志
    async fn deliver(&self, conversation: ConversationId, text: &str) {
        if let Err(e) = self.messenger.send_text(conversation, text).await {
            warn!(conversation, "failed to deliver reply: {}", e);
        }
    }
}
