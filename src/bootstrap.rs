//! # 启动模块
//!
//! 根据 `AppConfig` 装配存储、后端、Telegram 客户端和路由器，然后进入运行循环

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::bot::BotRunner;
use crate::application::router::{MessageRouter, RouterOptions};
use crate::core::config::{AppConfig, StoreType};
use crate::core::store::{HistoryStore, PromptStore};
use crate::errors::Result;
use crate::infrastructure::llm::OpenAIClient;
use crate::infrastructure::logger::Sanitizer;
use crate::infrastructure::store::{JsonHistoryStore, JsonPromptStore, SqliteHistoryStore};
use crate::infrastructure::telegram::TelegramClient;

/// 启动器
pub struct BotLauncher {
    config: AppConfig,
}

impl BotLauncher {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// 加载提示词配置（失败即致命）
    pub async fn load_prompts(&self) -> Result<Arc<dyn PromptStore>> {
        let store = JsonPromptStore::load(&self.config.prompts_file).await?;
        Ok(Arc::new(store))
    }

    /// 按配置打开历史存储（格式错误即致命）
    pub async fn load_history(&self) -> Result<Arc<dyn HistoryStore>> {
        let limit = self.config.history_limit;
        let store: Arc<dyn HistoryStore> = match self.config.history_store {
            StoreType::Json => {
                Arc::new(JsonHistoryStore::load(&self.config.history_file, limit).await?)
            }
            StoreType::Sqlite => {
                Arc::new(SqliteHistoryStore::new(&self.config.history_db, limit)?)
            }
        };
        info!(store = %self.config.history_store, limit, "history store ready");
        Ok(store)
    }

    /// 装配并运行，直到 Ctrl-C 或出现致命错误
    pub async fn launch(&self) -> Result<()> {
        self.config.validate()?;

        let prompts = self.load_prompts().await?;
        let history = self.load_history().await?;

        let admins = self.config.admin_set();
        if admins.is_empty() {
            warn!("no admins configured, prompt command is disabled");
        }

        let backend = Arc::new(OpenAIClient::new_with_base_url(
            self.config.openai_api_key.clone(),
            self.config.openai_model.clone(),
            self.config.openai_base_url.clone(),
        ));
        if let Some(key) = &self.config.openai_api_key {
            info!(
                model = %self.config.openai_model,
                api_key = %Sanitizer::api_key(key),
                "backend configured"
            );
        }

        let telegram = TelegramClient::new(self.config.bot_token.clone())
            .with_polling_timeout(self.config.polling_timeout);
        match telegram.get_me().await {
            Ok(me) => info!(bot_id = me.id, username = ?me.username, "connected to Telegram"),
            Err(e) => warn!(
                "getMe failed, continuing: {}",
                Sanitizer::redact(&e.to_string(), &self.config.bot_token)
            ),
        }

        let messenger = Arc::new(telegram.clone());
        let router = MessageRouter::new(prompts, history, backend, messenger, admins)
            .with_options(RouterOptions::from_config(&self.config));

        let inbound = telegram.start_receiving();
        info!("🤖 Bot is up and running");

        BotRunner::new(Arc::new(router))
            .with_grace_period(self.config.shutdown_grace_period())
            .run(inbound, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await?;

        info!("bot stopped");
        Ok(())
    }
}
