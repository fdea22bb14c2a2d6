//! OpenAI 兼容的文本生成后端
//!
//! 使用 async-openai 与任意 OpenAI 兼容的 chat completions 接口交互

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::debug;

use crate::core::backend::ChatBackend;
use crate::domain::{ConversationTurn, Role};
use crate::errors::{RelayError, Result};

/// chat completions 后端，`base_url` 可指向任意兼容服务
#[derive(Clone)]
pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIClient {
    /// 按模型和服务地址创建后端
    ///
    /// 未提供 api key 时沿用 async-openai 的默认行为（读取 `OPENAI_API_KEY`）
    pub fn new_with_base_url(api_key: Option<String>, model: String, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut config = OpenAIConfig::new().with_api_base(base_url);
        if let Some(api_key) = api_key {
            config = config.with_api_key(api_key);
        }

        let client = Client::with_config(config);

        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_request_message(turn: &ConversationTurn) -> Result<ChatCompletionRequestMessage> {
        let content = turn.content.clone();
        let message = match turn.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()
                .map(ChatCompletionRequestMessage::System),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map(ChatCompletionRequestMessage::User),
            Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map(ChatCompletionRequestMessage::Assistant),
        };
        message.map_err(|e| RelayError::Backend(format!("failed to build message: {}", e)))
    }

    /// 发送一次非流式请求，返回第一个候选的文本
    pub async fn chat(&self, messages: &[ConversationTurn]) -> Result<String> {
        let messages = messages
            .iter()
            .map(Self::to_request_message)
            .collect::<Result<Vec<_>>>()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(|e| RelayError::Backend(format!("failed to build request: {}", e)))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RelayError::Backend(format!("chat completion failed: {}", e)))?;

        debug!(model = %self.model, choices = response.choices.len(), "chat completion received");

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RelayError::Backend("empty response from backend".to_string()))
    }
}

#[async_trait]
impl ChatBackend for OpenAIClient {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String> {
        self.chat(messages).await
    }
}
