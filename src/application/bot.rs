//! 机器人运行循环
//!
//! 从入站通道取消息，每条消息在独立任务中交给路由器处理；
//! 任一任务返回存储错误时停止运行并把错误交给调用方。
//! 停止后最多等待一个宽限期，仍未完成的任务会被取消

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::core::messaging::InboundMessage;
use crate::errors::{RelayError, Result};

use super::router::{MessageRouter, RouteOutcome};

/// 默认停机宽限期
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// 运行循环
pub struct BotRunner {
    router: Arc<MessageRouter>,
    grace_period: Duration,
}

impl BotRunner {
    pub fn new(router: Arc<MessageRouter>) -> Self {
        Self {
            router,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// 停止后等待处理中消息的最长时间
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// 处理入站消息，直到通道关闭、收到 `shutdown` 信号或出现致命错误
    pub async fn run<F>(
        &self,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
        shutdown: F,
    ) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let mut tasks: JoinSet<Result<RouteOutcome>> = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown requested");
                    break;
                }
                message = inbound.recv() => {
                    let Some(message) = message else {
                        warn!("inbound channel closed");
                        break;
                    };
                    let router = self.router.clone();
                    let span = info_span!(
                        "turn",
                        conversation = message.conversation,
                        sender = message.sender
                    );
                    tasks.spawn(async move { router.handle(message).await }.instrument(span));
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    Self::check(joined)?;
                }
            }
        }

        // 等待已接收的消息处理完毕，后端卡住时不无限等待
        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                Self::check(joined)?;
            }
            Ok::<(), RelayError>(())
        };
        match tokio::time::timeout(self.grace_period, drain).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    abandoned = tasks.len(),
                    grace_ms = self.grace_period.as_millis() as u64,
                    "grace period elapsed, cancelling in-flight messages"
                );
                tasks.abort_all();
                Ok(())
            }
        }
    }

    fn check(
        joined: std::result::Result<Result<RouteOutcome>, tokio::task::JoinError>,
    ) -> Result<()> {
        match joined {
            Ok(Ok(outcome)) => {
                debug!(?outcome, "message handled");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("fatal error while handling message: {}", e);
                Err(e)
            }
            Err(e) => Err(RelayError::Internal(format!("message task failed: {}", e))),
        }
    }
}
