use anyhow::{Context, Result};
use std::env;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot API token.
    pub bot_token: String,
    /// Base URL of the report store REST API.
    pub store_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_API_KEY")
            .or_else(|_| env::var("TELOXIDE_TOKEN"))
            .context("BOT_API_KEY (or TELOXIDE_TOKEN) must be set")?;
        let store_url = env::var("REPORT_STORE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5001".to_string());
        Ok(Self {
            bot_token,
            store_url: store_url.trim_end_matches('/').to_string(),
        })
    }
}
