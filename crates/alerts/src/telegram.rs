//! Telegram delivery.

use crate::notifier::{DispatchError, NotificationDispatcher};
use async_trait::async_trait;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, warn};

/// Configuration for the Telegram dispatcher.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Chat that receives every alert.
    pub chat_id: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("chat_id", &self.chat_id)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Parse a numeric Telegram chat id (negative for groups).
pub fn parse_chat_id(raw: &str) -> Result<ChatId, DispatchError> {
    raw.trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| DispatchError::InvalidChat(raw.to_string()))
}

/// Sends alerts to a single Telegram chat using HTML parse mode.
pub struct TelegramDispatcher {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramDispatcher {
    pub fn new(config: &TelegramConfig) -> Result<Self, DispatchError> {
        let chat_id = parse_chat_id(&config.chat_id)?;
        let client = teloxide::net::default_reqwest_settings()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DispatchError::Client(e.to_string()))?;
        let bot = Bot::with_client(&config.bot_token, client);
        Ok(Self { bot, chat_id })
    }
}

#[async_trait]
impl NotificationDispatcher for TelegramDispatcher {
    async fn send(&self, text: &str) -> Result<(), DispatchError> {
        match self
            .bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => {
                debug!(chat_id = %self.chat_id, "Telegram message sent");
                Ok(())
            }
            Err(e) => {
                warn!(chat_id = %self.chat_id, error = %e, "Telegram send failed");
                Err(e.into())
            }
        }
    }
}
