use anyhow::{Context, Result};
use chatrelay::bootstrap::BotLauncher;
use chatrelay::core::config::AppConfig;
use chatrelay::infrastructure::logger::{self, LogConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    // .env 不存在时忽略
    dotenv::dotenv().ok();

    let cfg = AppConfig::parse();
    logger::init(LogConfig::with_format(cfg.log_format));

    BotLauncher::new(cfg)
        .launch()
        .await
        .context("chatrelay terminated")?;

    Ok(())
}
