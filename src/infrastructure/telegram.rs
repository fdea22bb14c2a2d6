//! Telegram Bot API 客户端
//!
//! 通过 `getUpdates` 长轮询接收消息，通过 `sendMessage` / `sendChatAction` 发送

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::messaging::{InboundMessage, Messenger};
use crate::domain::ConversationId;
use crate::errors::{RelayError, Result};
use crate::infrastructure::logger::Sanitizer;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot";
/// 普通 API 调用超时（秒）
const API_TIMEOUT_SECS: u64 = 30;
/// 轮询出错后的退避时间（秒）
const POLL_BACKOFF_SECS: u64 = 5;
/// 单条消息的长度上限，按 UTF-16 码元计算
pub const MAX_MESSAGE_UNITS: usize = 4096;

/// Telegram 客户端
#[derive(Clone)]
pub struct TelegramClient {
    token: String,
    api_base: String,
    polling_timeout: u32,
    http: Client,
    /// 最后处理的 update_id
    last_update_id: Arc<AtomicI64>,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
            polling_timeout: 30,
            http: Client::new(),
            last_update_id: Arc::new(AtomicI64::new(0)),
        }
    }

    /// 设置长轮询超时
    pub fn with_polling_timeout(mut self, timeout: u32) -> Self {
        self.polling_timeout = timeout;
        self
    }

    /// 使用自定义 API 地址（本地 Bot API 服务器）
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn last_update_id(&self) -> i64 {
        self.last_update_id.load(Ordering::SeqCst)
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}{}/{}", self.api_base, self.token, method)
    }

    /// 调用 Bot API 方法并解开 `{ok, result, description}` 外壳
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        timeout: Duration,
    ) -> Result<T> {
        let response = self
            .http
            .post(self.api_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        let body: TelegramResponse<T> = response.json().await.map_err(|e| {
            RelayError::Messaging(format!(
                "{} returned undecodable body (HTTP {}): {}",
                method,
                status,
                e.without_url()
            ))
        })?;

        body.into_result(method)
    }

    /// 拉取一批更新，并推进 offset
    pub async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let offset = self.last_update_id.load(Ordering::SeqCst);
        let params = serde_json::json!({
            "offset": if offset > 0 { offset + 1 } else { 0 },
            "timeout": self.polling_timeout,
            "allowed_updates": ["message"],
        });

        let updates: Vec<TelegramUpdate> = self
            .call(
                "getUpdates",
                &params,
                Duration::from_secs(self.polling_timeout as u64 + 10),
            )
            .await?;

        if let Some(last) = updates.last() {
            self.last_update_id.store(last.update_id, Ordering::SeqCst);
        }

        Ok(updates)
    }

    /// 验证 token，返回 bot 自身信息
    pub async fn get_me(&self) -> Result<TelegramUser> {
        self.call(
            "getMe",
            &serde_json::json!({}),
            Duration::from_secs(API_TIMEOUT_SECS),
        )
        .await
    }

    /// 启动后台轮询任务，返回入站消息通道
    ///
    /// 接收端被丢弃后轮询停止
    pub fn start_receiving(&self) -> mpsc::UnboundedReceiver<InboundMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();

        tokio::spawn(async move {
            info!("Starting Telegram polling");

            'poll: loop {
                match client.poll_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            let update_id = update.update_id;
                            let Some(message) = update.into_inbound() else {
                                debug!(update_id, "skipping update without text message");
                                continue;
                            };
                            if tx.send(message).is_err() {
                                warn!("Message receiver dropped, stopping polling");
                                break 'poll;
                            }
                        }
                    }
                    Err(e) => {
                        error!(
                            "Telegram polling error: {}",
                            Sanitizer::redact(&e.to_string(), &client.token)
                        );
                        tokio::time::sleep(Duration::from_secs(POLL_BACKOFF_SECS)).await;
                    }
                }
                if tx.is_closed() {
                    break;
                }
            }

            info!("Telegram polling stopped");
        });

        rx
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(&self, conversation: ConversationId, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_UNITS) {
            let params = serde_json::json!({
                "chat_id": conversation,
                "text": chunk,
            });
            let _: TelegramMessage = self
                .call(
                    "sendMessage",
                    &params,
                    Duration::from_secs(API_TIMEOUT_SECS),
                )
                .await?;
        }
        Ok(())
    }

    async fn send_typing(&self, conversation: ConversationId) -> Result<()> {
        let params = serde_json::json!({
            "chat_id": conversation,
            "action": "typing",
        });
        let _: bool = self
            .call(
                "sendChatAction",
                &params,
                Duration::from_secs(API_TIMEOUT_SECS),
            )
            .await?;
        debug!(conversation, "sent typing indicator");
        Ok(())
    }
}

/// 切分过长的消息，优先在换行处断开
///
/// Telegram 按 UTF-16 码元计算长度，emoji 等补充平面字符占两个码元；
/// 切分点总落在字符边界上
pub fn split_message(text: &str, max_units: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while utf16_len(rest) > max_units {
        let limit = utf16_boundary(rest, max_units);
        let cut = match rest[..limit].rfind('\n') {
            Some(pos) if pos > 0 => pos + 1,
            _ => limit,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// 不超过 `max_units` 个码元的最长前缀的字节长度，至少包含一个字符
fn utf16_boundary(text: &str, max_units: usize) -> usize {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        units += ch.len_utf16();
        if units > max_units {
            return if idx == 0 { ch.len_utf8() } else { idx };
        }
    }
    text.len()
}

// ============================================================================
// Telegram API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if !self.ok {
            return Err(RelayError::Messaging(format!(
                "Telegram API error in {}: {}",
                method,
                self.description.unwrap_or_default()
            )));
        }
        self.result.ok_or_else(|| {
            RelayError::Messaging(format!("Telegram returned ok but no result for {}", method))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// 只保留带文本且有发送者的消息
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let sender = message.from?.id;
        let text = message.text?;
        Some(InboundMessage::new(message.chat.id, sender, text))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    pub r#type: Option<String>,
}
