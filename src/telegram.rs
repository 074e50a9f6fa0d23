use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use teloxide::{prelude::*, types::ParseMode};
use thiserror::Error;

use crate::scheduling::Notifier;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TelegramNotifierError {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error("Recipient is not a valid Telegram chat id: {0:?}")]
    InvalidRecipient(String),
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    /// Creates the bot client and checks the token against the Bot API.
    pub async fn connect(token: &str) -> anyhow::Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Could not build Telegram HTTP client")?;
        let bot = Bot::with_client(token, client);

        let me = bot
            .get_me()
            .await
            .context("Telegram rejected the bot token")?;
        log::info!("Connected to Telegram as {}", me.user.full_name());

        Ok(Self { bot })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, recipient: &str, message: &str) -> anyhow::Result<()> {
        let chat_id = parse_chat_id(recipient)?;

        self.bot
            .send_message(chat_id, message)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(TelegramNotifierError::from)?;

        Ok(())
    }
}

fn parse_chat_id(recipient: &str) -> Result<ChatId, TelegramNotifierError> {
    recipient
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| TelegramNotifierError::InvalidRecipient(recipient.to_owned()))
}
