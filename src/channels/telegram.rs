use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage, MessageEntityKind, User,
};
use teloxide::{ApiError, RequestError};
use tracing::{debug, error, info, warn};

use crate::config::TZ;
use crate::gate::{GateStatus, SharedGate};
use crate::register::{self, Mention};
use crate::store::SharedStore;
use crate::{magic, reminder};

/// Classified delivery failure. The bot never retries; classification is
/// for logs and for choosing a fallback channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The bot lacks rights for the operation (e.g. cannot delete).
    PermissionDenied,
    /// The recipient cannot be reached (blocked, kicked, no DM opened).
    Unreachable,
    Unknown,
}

fn classify(err: &RequestError) -> DeliveryError {
    match err {
        RequestError::Api(api) => match api {
            ApiError::MessageCantBeDeleted | ApiError::NotEnoughRightsToPostMessages => {
                DeliveryError::PermissionDenied
            }
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots
            | ApiError::UserDeactivated
            | ApiError::ChatNotFound => DeliveryError::Unreachable,
            _ => DeliveryError::Unknown,
        },
        _ => DeliveryError::Unknown,
    }
}

/// Telegram transport: command routing, drunk-mode interception and the
/// confirm/cancel callback protocol. All business state lives in the
/// injected store and gate.
pub struct TelegramChannel {
    bot: Bot,
    store: SharedStore,
    gate: SharedGate,
}

const HELP_TEXT: &str = "Hello 👋\n\n\
I handle:\n\
🥴 Drunk Mode\n\
🎉 Birthdays & events\n\n\
Commands:\n\
- /drunk_on [minutes]\n\
- /drunk_off\n\
- /drunk_status\n\
- /add_bday @handle 25-03\n\
- /list_bday\n\
- /add_event 14-02-2026 Event title\n\
- /list_events\n\
- /magic [question]\n";

impl TelegramChannel {
    pub fn new(bot: Bot, store: SharedStore, gate: SharedGate) -> Self {
        Self { bot, store, gate }
    }

    /// Start the dispatcher with automatic retry on crash. Exponential
    /// backoff 5s doubling to a 60s cap, reset after a stable run.
    pub async fn start_with_retry(self: Arc<Self>) {
        let initial_backoff = Duration::from_secs(5);
        let max_backoff = Duration::from_secs(60);
        let stable_threshold = Duration::from_secs(60);
        let mut backoff = initial_backoff;

        loop {
            info!("Starting Telegram dispatcher");
            let started = tokio::time::Instant::now();
            self.clone().start().await;
            let ran_for = started.elapsed();

            if ran_for >= stable_threshold {
                backoff = initial_backoff;
            }

            warn!(
                backoff_secs = backoff.as_secs(),
                ran_for_secs = ran_for.as_secs(),
                "Telegram dispatcher stopped, restarting"
            );
            tokio::time::sleep(backoff).await;
            backoff = std::cmp::min(backoff * 2, max_backoff);
        }
    }

    pub async fn start(self: Arc<Self>) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let channel = Arc::clone(&self);
                move |msg: Message, bot: Bot| {
                    let channel = Arc::clone(&channel);
                    async move {
                        channel.handle_message(msg, bot).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let channel = Arc::clone(&self);
                move |q: CallbackQuery, bot: Bot| {
                    let channel = Arc::clone(&channel);
                    async move {
                        channel.handle_callback(q, bot).await;
                        respond(())
                    }
                }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    async fn handle_message(&self, msg: Message, bot: Bot) {
        let Some(text) = msg.text().map(|t| t.to_string()) else {
            return;
        };
        let Some(user) = msg.from.clone() else {
            return;
        };
        if user.is_bot {
            return;
        }

        if text.starts_with('/') {
            self.handle_command(&text, &msg, &user, &bot).await;
        } else if is_group(&msg) {
            self.handle_group_message(&text, &msg, &user, &bot).await;
        }
    }

    async fn handle_command(&self, text: &str, msg: &Message, user: &User, bot: &Bot) {
        let parts: Vec<&str> = text.splitn(2, ' ').collect();
        // Commands in groups may arrive as "/cmd@botname".
        let cmd = parts[0].split('@').next().unwrap_or(parts[0]);
        let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");
        let chat_id = msg.chat.id.0;

        let reply = match cmd {
            "/drunk_on" => self.cmd_drunk_on(msg, user, arg).await,
            "/drunk_off" => self.cmd_drunk_off(msg, user).await,
            "/drunk_status" => self.cmd_drunk_status(msg, user).await,
            "/add_bday" => {
                let mut store = self.store.lock().await;
                self.unwrap_store_reply(
                    register::add_birthday(&mut store, chat_id, arg, extract_mention(msg)),
                    chat_id,
                )
            }
            "/list_bday" => {
                let store = self.store.lock().await;
                register::list_birthdays(&store, chat_id)
            }
            "/add_event" => {
                let mut store = self.store.lock().await;
                self.unwrap_store_reply(
                    register::add_event(&mut store, chat_id, arg, extract_mention(msg)),
                    chat_id,
                )
            }
            "/list_events" => {
                let today = Utc::now().with_timezone(&TZ).date_naive();
                let store = self.store.lock().await;
                register::list_events(&store, chat_id, today)
            }
            "/magic" => {
                let question = if arg.is_empty() { None } else { Some(arg) };
                magic::magic_answer(question)
            }
            "/start" | "/help" => HELP_TEXT.to_string(),
            _ => format!(
                "Unknown command: {}\nType /help for available commands.",
                cmd
            ),
        };

        if let Err(e) = bot.send_message(msg.chat.id, reply).await {
            warn!(chat_id, kind = ?classify(&e), "Could not deliver reply: {}", e);
        }
    }

    fn unwrap_store_reply(&self, result: anyhow::Result<String>, chat_id: i64) -> String {
        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(chat_id, "Store write failed: {}", e);
                "Storage failure, the record was not saved.".to_string()
            }
        }
    }

    async fn cmd_drunk_on(&self, msg: &Message, user: &User, arg: &str) -> String {
        if !is_group(msg) {
            return "This command is meant for a group chat 😉".to_string();
        }

        // A non-numeric argument falls back to an unlimited gate.
        let minutes = arg.split_whitespace().next().and_then(|a| a.parse::<i64>().ok());
        self.gate
            .lock()
            .await
            .enable(msg.chat.id.0, user.id.0, minutes, Utc::now());

        let extra = minutes
            .map(|m| format!(" for {} minutes", m))
            .unwrap_or_default();
        info!(chat_id = msg.chat.id.0, user_id = user.id.0, "Drunk Mode enabled");
        format!(
            "🥴 Drunk Mode enabled for {}{}.\nYour messages will need confirmation before they appear.",
            user.first_name, extra
        )
    }

    async fn cmd_drunk_off(&self, msg: &Message, user: &User) -> String {
        let was_gated = self.gate.lock().await.disable(msg.chat.id.0, user.id.0);
        if was_gated {
            info!(chat_id = msg.chat.id.0, user_id = user.id.0, "Drunk Mode disabled");
            "✅ Drunk Mode disabled.".to_string()
        } else {
            "You are not in Drunk Mode in this chat.".to_string()
        }
    }

    async fn cmd_drunk_status(&self, msg: &Message, user: &User) -> String {
        let status = self
            .gate
            .lock()
            .await
            .status(msg.chat.id.0, user.id.0, Utc::now());
        match status {
            GateStatus::Unlimited => "🥴 You are in Drunk Mode (no time limit).".to_string(),
            GateStatus::ExpiresIn { minutes } => {
                format!("🥴 You are in Drunk Mode for ~{} more minute(s).", minutes)
            }
            GateStatus::NotGated => "You are not in Drunk Mode in this chat.".to_string(),
        }
    }

    /// Drunk-mode interception for non-command group text. Pending state
    /// is set before the delete attempt; if the platform refuses the
    /// delete, the original message stands and we abort silently.
    async fn handle_group_message(&self, text: &str, msg: &Message, user: &User, bot: &Bot) {
        let chat_id = msg.chat.id.0;
        let user_id = user.id.0;

        let held = self
            .gate
            .lock()
            .await
            .intercept(chat_id, user_id, text, Utc::now());
        if !held {
            return;
        }

        if let Err(e) = bot.delete_message(msg.chat.id, msg.id).await {
            debug!(
                chat_id,
                user_id,
                kind = ?classify(&e),
                "Could not delete intercepted message, letting it stand: {}",
                e
            );
            return;
        }

        let markup = InlineKeyboardMarkup::new([[
            InlineKeyboardButton::callback("✅ Send it", format!("confirm:{}:{}", chat_id, user_id)),
            InlineKeyboardButton::callback("❌ Cancel", format!("cancel:{}:{}", chat_id, user_id)),
        ]]);
        let held_preview = preview(text);

        // DM first, group fallback if the private channel is refused.
        let dm_text = format!(
            "🥴 You are in Drunk Mode.\nI'm holding this message:\n\n« {} »\n\nPost it to the group?",
            held_preview
        );
        let dm = bot
            .send_message(ChatId(user_id as i64), dm_text)
            .reply_markup(markup.clone())
            .await;

        if let Err(e) = dm {
            debug!(
                chat_id,
                user_id,
                kind = ?classify(&e),
                "DM refused, falling back to the group: {}",
                e
            );
            let group_text = format!(
                "🥴 {}, you are in Drunk Mode.\nI'm holding your message. Post it?\n\n« {} »",
                handle_or_name(user),
                held_preview
            );
            if let Err(e) = bot
                .send_message(msg.chat.id, group_text)
                .reply_markup(markup)
                .await
            {
                warn!(
                    chat_id,
                    user_id,
                    kind = ?classify(&e),
                    "Could not deliver confirmation prompt: {}",
                    e
                );
            }
        }
    }

    /// Confirm/cancel buttons. Data format: `confirm:{chat_id}:{user_id}`
    /// or `cancel:{chat_id}:{user_id}`. Only the target user may act.
    async fn handle_callback(&self, q: CallbackQuery, bot: Bot) {
        let Some(data) = q.data.clone() else {
            return;
        };
        let Some((action, chat_id, target_user_id)) = parse_callback(&data) else {
            return;
        };

        let outcome = {
            let mut gate = self.gate.lock().await;
            resolve_callback(&mut gate, action, chat_id, target_user_id, q.from.id.0)
        };

        match outcome {
            CallbackOutcome::Unauthorized => {
                warn!(
                    chat_id,
                    caller = q.from.id.0,
                    target = target_user_id,
                    "Callback from a non-target user rejected"
                );
                let _ = bot
                    .answer_callback_query(q.id)
                    .text("You cannot act on this message.")
                    .await;
            }
            CallbackOutcome::Cancelled => {
                let _ = bot.answer_callback_query(q.id.clone()).await;
                edit_prompt(&bot, &q, "❌ Message cancelled.").await;
            }
            CallbackOutcome::NothingPending => {
                let _ = bot.answer_callback_query(q.id.clone()).await;
                edit_prompt(&bot, &q, "This message expired or was already handled.").await;
            }
            CallbackOutcome::Confirmed(text) => {
                let _ = bot.answer_callback_query(q.id.clone()).await;
                let posted = format!(
                    "💬 Message confirmed by {}:\n{}",
                    handle_or_name(&q.from),
                    text
                );
                if let Err(e) = bot.send_message(ChatId(chat_id), posted).await {
                    warn!(
                        chat_id,
                        user_id = target_user_id,
                        kind = ?classify(&e),
                        "Could not post confirmed message: {}",
                        e
                    );
                    edit_prompt(&bot, &q, "Could not post the message to the group.").await;
                    return;
                }
                edit_prompt(&bot, &q, "✅ Message posted to the group.").await;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallbackAction {
    Confirm,
    Cancel,
}

/// Parse button data: `confirm:{chat_id}:{user_id}` or
/// `cancel:{chat_id}:{user_id}`. Anything else is ignored.
fn parse_callback(data: &str) -> Option<(CallbackAction, i64, u64)> {
    let parts: Vec<&str> = data.splitn(3, ':').collect();
    if parts.len() != 3 {
        return None;
    }
    let action = match parts[0] {
        "confirm" => CallbackAction::Confirm,
        "cancel" => CallbackAction::Cancel,
        _ => return None,
    };
    let chat_id = parts[1].parse::<i64>().ok()?;
    let user_id = parts[2].parse::<u64>().ok()?;
    Some((action, chat_id, user_id))
}

#[derive(Debug, PartialEq, Eq)]
enum CallbackOutcome {
    /// Caller is not the target user: reject, touch nothing.
    Unauthorized,
    Cancelled,
    /// Confirm with no pending text (expired or already handled).
    NothingPending,
    /// Confirm succeeded: the held text to post.
    Confirmed(String),
}

/// Resolve a confirm/cancel callback against the gate. Only the target
/// user may act on their own pending message.
fn resolve_callback(
    gate: &mut crate::gate::GateState,
    action: CallbackAction,
    chat_id: i64,
    target_user_id: u64,
    caller_id: u64,
) -> CallbackOutcome {
    if caller_id != target_user_id {
        return CallbackOutcome::Unauthorized;
    }
    match action {
        CallbackAction::Cancel => {
            gate.cancel(chat_id, target_user_id);
            CallbackOutcome::Cancelled
        }
        CallbackAction::Confirm => match gate.take_pending(chat_id, target_user_id) {
            None => CallbackOutcome::NothingPending,
            Some(text) => CallbackOutcome::Confirmed(text),
        },
    }
}

/// Spawn the reminder job for this bot when enabled by config.
pub fn spawn_reminder_job(bot: Bot, store: SharedStore) {
    Arc::new(reminder::ReminderJob::new(store, bot)).spawn();
}

fn is_group(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

fn handle_or_name(user: &User) -> String {
    match &user.username {
        Some(u) => format!("@{}", u),
        None => user.first_name.clone(),
    }
}

/// Structured mention carried by the message entities, if any. A clickable
/// user reference wins over a plain @handle.
fn extract_mention(msg: &Message) -> Option<Mention> {
    let entities = msg.parse_entities()?;
    let mut handle_only: Option<Mention> = None;
    for entity in &entities {
        match entity.kind() {
            MessageEntityKind::TextMention { user } => {
                let display_name = match &user.last_name {
                    Some(last) => format!("{} {}", user.first_name, last),
                    None => user.first_name.clone(),
                };
                return Some(Mention {
                    user_id: Some(user.id.0),
                    username: user.username.clone(),
                    display_name,
                });
            }
            MessageEntityKind::Mention if handle_only.is_none() => {
                let handle = entity.text().trim_start_matches('@').to_string();
                handle_only = Some(Mention {
                    user_id: None,
                    username: Some(handle),
                    display_name: String::new(),
                });
            }
            _ => {}
        }
    }
    handle_only
}

async fn edit_prompt(bot: &Bot, q: &CallbackQuery, text: &str) {
    if let Some(MaybeInaccessibleMessage::Regular(m)) = &q.message {
        let _ = bot.edit_message_text(m.chat.id, m.id, text).await;
    }
}

/// UTF-8 safe prompt preview, at most 120 characters.
fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        return text.to_string();
    }
    let head: String = text.chars().take(MAX - 3).collect();
    format!("{}...", head)
}
