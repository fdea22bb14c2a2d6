//! 日志初始化、后端耗时记录和 token 脱敏
//!
//! `pretty` 格式输出单行 `时间 级别 target: span{字段} 消息 k=v`，
//! 每条消息的处理任务都在 `turn` span 中运行，因此日志自带会话 ID

use std::fmt;
use std::time::Instant;

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::field::RecordFields;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::core::config::LogFormat;
use crate::domain::ConversationId;

/// 未设置 `RUST_LOG` 时的过滤规则
const DEFAULT_FILTER: &str = "info";

/// 日志输出选项
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// ANSI 颜色（json 格式忽略）
    pub ansi: bool,
    pub with_target: bool,
    /// 输出源文件和行号
    pub with_source: bool,
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            ansi: true,
            with_target: true,
            with_source: false,
            timestamps: true,
        }
    }
}

impl LogConfig {
    pub fn with_format(format: LogFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

/// 安装全局 subscriber，级别由 `RUST_LOG` 控制
pub fn init(config: LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .fmt_fields(KeyValueFields)
                    .event_format(LineFormatter::new(config)),
            )
            .init(),
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(config.ansi)
                    .with_target(config.with_target)
                    .with_file(config.with_source)
                    .with_line_number(config.with_source),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(config.with_target)
                    .with_file(config.with_source)
                    .with_line_number(config.with_source)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .init(),
    }
}

/// 离开作用域时在 `metrics` target 下记录耗时
pub struct Timer {
    operation: &'static str,
    started: Instant,
    conversation: Option<ConversationId>,
}

impl Timer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
            conversation: None,
        }
    }

    pub fn with_conversation(mut self, conversation: ConversationId) -> Self {
        self.conversation = Some(conversation);
        self
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        tracing::info!(
            target: "metrics",
            operation = self.operation,
            conversation = self.conversation,
            elapsed_ms,
            "timed"
        );
    }
}

/// 日志中的密钥脱敏
pub struct Sanitizer;

impl Sanitizer {
    /// API key 只保留首尾各 4 个字符，过短时整体隐藏
    pub fn api_key(key: &str) -> String {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() < 12 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}****{}", head, tail)
    }

    /// bot token 形如 `<bot id>:<secret>`，只保留 bot id
    pub fn bot_token(token: &str) -> String {
        match token.split_once(':') {
            Some((bot_id, _)) if !bot_id.is_empty() => format!("{}:***", bot_id),
            _ => "***TOKEN***".to_string(),
        }
    }

    /// 把文本中出现的 token 全部替换为脱敏形式
    pub fn redact(text: &str, secret: &str) -> String {
        if secret.is_empty() {
            return text.to_string();
        }
        text.replace(secret, &Self::bot_token(secret))
    }
}

fn level_style(level: &Level) -> (&'static str, u8) {
    match *level {
        Level::ERROR => ("ERROR", 31),
        Level::WARN => ("WARN", 33),
        Level::INFO => ("INFO", 32),
        Level::DEBUG => ("DEBUG", 34),
        Level::TRACE => ("TRACE", 35),
    }
}

/// `pretty` 格式的事件格式器
pub struct LineFormatter {
    config: LogConfig,
}

impl LineFormatter {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        if self.config.timestamps {
            write!(
                writer,
                "{} ",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
            )?;
        }

        let (label, color) = level_style(meta.level());
        if self.config.ansi {
            write!(writer, "\x1b[{}m{:<5}\x1b[0m ", color, label)?;
        } else {
            write!(writer, "{:<5} ", label)?;
        }

        if self.config.with_target {
            write!(writer, "{}: ", meta.target())?;
        }

        if self.config.with_source {
            if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
                write!(writer, "{}:{} ", file, line)?;
            }
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;
                let extensions = span.extensions();
                if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{}}}", fields)?;
                    }
                }
                write!(writer, " ")?;
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// 把字段格式化成 `消息 k=v k=v`
pub struct KeyValueFields;

impl<'w> FormatFields<'w> for KeyValueFields {
    fn format_fields<R: RecordFields>(&self, writer: Writer<'w>, fields: R) -> fmt::Result {
        let mut collector = FieldCollector::default();
        fields.record(&mut collector);
        collector.write_to(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    pairs: Vec<(&'static str, String)>,
}

impl FieldCollector {
    fn push(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = Some(value);
        } else {
            self.pairs.push((field.name(), value));
        }
    }

    fn write_to(self, mut writer: Writer<'_>) -> fmt::Result {
        let mut separator = "";
        if let Some(message) = &self.message {
            write!(writer, "{}", message)?;
            separator = " ";
        }
        for (name, value) in &self.pairs {
            write!(writer, "{}{}={}", separator, name, value)?;
            separator = " ";
        }
        Ok(())
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.push(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.push(field, format!("{:?}", value));
    }
}
