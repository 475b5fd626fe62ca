use anyhow::Result;
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::requests::Requester;
use teloxide::types::{ChatId, ParseMode};
use teloxide::Bot;

/// Notification sink. Delivery failures are surfaced as errors but callers
/// treat them as non-fatal: state advancement never waits on chat delivery.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: i64, html: &str, disable_preview: bool) -> Result<()>;
}

/// Telegram-backed sink. Messages are sent as HTML; the bot's throttle layer
/// handles chat-API rate limiting.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: i64, html: &str, disable_preview: bool) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), html)
            .parse_mode(ParseMode::Html)
            .disable_web_page_preview(disable_preview)
            .await?;
        Ok(())
    }
}
