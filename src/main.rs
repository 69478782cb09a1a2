use anyhow::Result;
use reportbot::{
    config::Config,
    navigator::Navigator,
    store::HttpReportStore,
    telegram::{self, TelegramUi},
};
use reqwest::Client;
use std::sync::Arc;
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) wire collaborators ───────────────────────────────────────
    let config = Config::from_env()?;
    let client = Client::new();
    let store = HttpReportStore::new(client, &config.store_url);
    let bot = Bot::new(&config.bot_token);
    let ui = TelegramUi::new(bot.clone());
    let nav = Arc::new(Navigator::new(store, ui));

    // ─── 3) poll until shutdown ──────────────────────────────────────
    info!(store = %config.store_url, "starting dispatcher");
    telegram::run(bot, nav).await;
    Ok(())
}
