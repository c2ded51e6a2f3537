//! Telegram bot wiring.

use crate::dispatcher::{CommandRegistry, Inbound};
use crate::notifier::ChatSender;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, Chat};
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Telegram API error: {0}")]
    Api(#[from] RequestError),
    #[error("Chat {0} unavailable: {1}")]
    ChatUnavailable(i64, String),
}

impl TelegramError {
    fn from_send(chat_id: i64, err: RequestError) -> Self {
        match err {
            RequestError::Api(
                api @ (ApiError::BotBlocked | ApiError::ChatNotFound | ApiError::UserDeactivated),
            ) => TelegramError::ChatUnavailable(chat_id, api.to_string()),
            other => TelegramError::Api(other),
        }
    }
}

/// Telegram bot wrapper.
pub struct TelegramBot {
    bot: Bot,
}

impl TelegramBot {
    /// Create a new bot with the given token.
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Bot username as registered with BotFather.
    pub async fn username(&self) -> Result<String, TelegramError> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_string())
    }

    /// Publish the registry's commands to the Telegram command menu.
    pub async fn publish_commands(&self, registry: &CommandRegistry) -> Result<(), TelegramError> {
        let commands: Vec<BotCommand> = registry
            .commands()
            .map(|(name, description)| BotCommand::new(name, description))
            .collect();
        self.bot.set_my_commands(commands).await?;
        Ok(())
    }

    /// Run the long-polling dispatcher until Ctrl+C.
    pub async fn run(self: Arc<Self>, registry: Arc<CommandRegistry>) {
        let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
            let registry = Arc::clone(&registry);
            async move { handle_message(bot, msg, &registry).await }
        });

        info!("Telegram dispatcher started");

        Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|upd| async move {
                debug!(update_id = ?upd.id, "Ignoring non-message update");
            })
            .error_handler(Arc::new(log_update_error))
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram dispatcher stopped");
    }
}

#[async_trait]
impl ChatSender for TelegramBot {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| TelegramError::from_send(chat_id, e))?;
        Ok(())
    }
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    registry: &CommandRegistry,
) -> Result<(), TelegramError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let inbound = Inbound {
        chat_id: msg.chat.id.0,
        from: describe_chat(&msg.chat),
        text: text.to_string(),
    };

    if let Some(reply) = registry.dispatch(&inbound).await {
        bot.send_message(msg.chat.id, reply.text)
            .await
            .map_err(|e| TelegramError::from_send(inbound.chat_id, e))?;
    }

    Ok(())
}

/// Failed updates are logged and dropped; the dispatcher keeps polling.
async fn log_update_error(err: TelegramError) {
    warn!("Error while handling a Telegram update: {}", err);
}

/// Human-readable sender label for access logs.
fn describe_chat(chat: &Chat) -> String {
    match (chat.username(), chat.first_name()) {
        (Some(username), _) => format!("@{} ({})", username, chat.id),
        (None, Some(first_name)) => format!("{} ({})", first_name, chat.id),
        (None, None) => chat.id.to_string(),
    }
}
