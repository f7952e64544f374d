//! Telegram comms channel: receives messages via the Bot API, hands them to
//! the gateway and sends the reply back to the chat.
//!
//! `/menu` shows a reply keyboard with the memory commands.  Text replies go
//! out as Markdown, falling back to plain text when Telegram rejects the
//! markup.  Binary replies are sent as a CSV document.

use std::env;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, KeyboardButton, KeyboardMarkup, ParseMode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::attachment_file_name;
use super::state::CommsState;
use crate::error::AppError;
use crate::message::Response as Reply;
use crate::subsystems::runtime::{Component, ComponentFuture};

/// Telegram caps a message at 4096 characters; chunk below that.
const MAX_MESSAGE_LENGTH: usize = 4000;

const MENU_COMMAND: &str = "/menu";
const MENU_PROMPT: &str = "What would you like to do?";
const MENU_BUTTONS: [&str; 2] = ["Clear memory", "Memory dump"];

pub struct TelegramChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.state, shutdown))
    }
}

/// Stable user key: username when set, else the numeric user id, else the
/// chat id (channel posts carry no sender).
fn user_key(msg: &Message) -> String {
    match msg.from.as_ref() {
        Some(u) => u.username.clone().unwrap_or_else(|| u.id.0.to_string()),
        None => msg.chat.id.0.to_string(),
    }
}

fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![MENU_BUTTONS.iter().map(|b| KeyboardButton::new(*b)).collect::<Vec<_>>()])
}

/// Split `text` into pieces of at most `max` characters.
fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max).map(|c| c.iter().collect()).collect()
}

async fn run_telegram(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") else {
        warn!(%channel_id, "TELEGRAM_BOT_TOKEN not set, telegram channel exiting");
        return Ok(());
    };

    info!(%channel_id, "telegram channel starting");
    let bot = Bot::new(token);

    let handler_state = state.clone();
    let handler_channel = channel_id.clone();

    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let state = handler_state.clone();
        let channel_id = handler_channel.clone();
        async move {
            handle_message(&bot, &msg, &state, &channel_id).await;
            respond(())
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, handler).build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received, closing telegram channel");
        }
        _ = dispatcher.dispatch() => {
            warn!(%channel_id, "telegram dispatcher exited unexpectedly");
        }
    }

    Ok(())
}

async fn handle_message(bot: &Bot, msg: &Message, state: &CommsState, channel_id: &str) {
    let Some(text) = msg.text() else {
        return;
    };
    let chat = msg.chat.id;

    if text.trim() == MENU_COMMAND {
        if let Err(e) = bot.send_message(chat, MENU_PROMPT).reply_markup(menu_keyboard()).await {
            warn!("failed to send telegram menu: {e}");
        }
        return;
    }

    if let Err(e) = bot.send_chat_action(chat, ChatAction::Typing).await {
        debug!("typing indicator failed: {e}");
    }

    let user = user_key(msg);
    debug!(%channel_id, %user, "telegram received message");
    let reply = state.send_message(channel_id, &user, chat.0, text.to_string()).await;
    deliver(bot, reply).await;
}

async fn deliver(bot: &Bot, reply: Reply) {
    let chat = ChatId(reply.chat_id);

    if let Some(bytes) = reply.payload {
        let name = attachment_file_name(chrono::Utc::now().timestamp_millis());
        if let Err(e) = bot.send_document(chat, InputFile::memory(bytes).file_name(name)).await {
            warn!("failed to send telegram document: {e}");
        }
        return;
    }

    let text = if reply.text.is_empty() { "(empty response)".to_string() } else { reply.text };

    for chunk in chunk_text(&text, MAX_MESSAGE_LENGTH) {
        #[allow(deprecated)]
        let markdown = bot.send_message(chat, chunk.clone()).parse_mode(ParseMode::Markdown).await;
        if let Err(e) = markdown {
            debug!("markdown send rejected, retrying as plain text: {e}");
            if let Err(e) = bot.send_message(chat, chunk).await {
                warn!("failed to send telegram reply: {e}");
            }
        }
    }
}
