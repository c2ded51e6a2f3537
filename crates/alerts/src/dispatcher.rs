//! Chat command dispatch.
//!
//! Handlers are registered by name in a [`CommandRegistry`]. Every inbound
//! command is gated on the authorized-user set before its handler runs;
//! unauthorized attempts get no reply and a single access log line.

use crate::format::{status_report, unreachable_notice, workers_report, HELP_TEXT, PONG};
use crate::notifier::run_check;
use async_trait::async_trait;
use ethermine_core::{AlertThresholds, AuthorizedUsers};
use ethermine_feeds::StatsSource;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// An inbound chat message.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Chat the message came from, checked against the authorized set
    pub chat_id: i64,
    /// Sender label for logs
    pub from: String,
    pub text: String,
}

/// Text reply to send back to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A single chat command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Command name without the leading slash.
    fn name(&self) -> &'static str;

    /// One-line description for the command menu.
    fn description(&self) -> &'static str;

    /// Produce the reply for an authorized sender.
    async fn handle(&self, sender: i64, args: &str) -> Reply;
}

/// Name-keyed handler table plus the authorization gate.
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Arc<dyn CommandHandler>>,
    order: Vec<&'static str>,
    users: AuthorizedUsers,
    bot_username: Option<String>,
}

impl CommandRegistry {
    pub fn new(users: AuthorizedUsers) -> Self {
        Self {
            handlers: HashMap::new(),
            order: Vec::new(),
            users,
            bot_username: None,
        }
    }

    /// Registry with every built-in command.
    pub fn standard(
        source: Arc<dyn StatsSource>,
        thresholds: AlertThresholds,
        users: AuthorizedUsers,
    ) -> Self {
        let mut registry = Self::new(users);
        registry.register(Arc::new(StatusCommand::new(source.clone())));
        registry.register(Arc::new(WorkersCommand::new(source.clone())));
        registry.register(Arc::new(CheckCommand::new(source, thresholds)));
        registry.register(Arc::new(PingCommand));
        registry.register(Arc::new(HelpCommand));
        registry
    }

    /// Only accept `/cmd@name` mentions addressed to this bot.
    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    /// Add a handler. A handler with the same name replaces the old one.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) {
        let name = handler.name();
        if self.handlers.insert(name, handler).is_none() {
            self.order.push(name);
        }
    }

    /// Registered `(name, description)` pairs in registration order.
    pub fn commands(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.handlers.get(name))
            .map(|h| (h.name(), h.description()))
    }

    /// Route a message to its handler.
    ///
    /// Returns `None` for non-commands, unknown commands and unauthorized senders.
    pub async fn dispatch(&self, msg: &Inbound) -> Option<Reply> {
        let (name, mention, args) = parse_command(&msg.text)?;

        if let (Some(mention), Some(ours)) = (mention, self.bot_username.as_deref()) {
            if !mention.eq_ignore_ascii_case(ours) {
                debug!(command = %name, mention = mention, "Command addressed to another bot");
                return None;
            }
        }

        let Some(handler) = self.handlers.get(name.as_str()) else {
            debug!(command = %name, chat_id = msg.chat_id, "Unknown command");
            return None;
        };

        if !self.users.contains(msg.chat_id) {
            info!("{} tried to contact me (comm: {})", msg.from, msg.text);
            return None;
        }

        debug!(command = %name, chat_id = msg.chat_id, "Dispatching command");
        Some(handler.handle(msg.chat_id, args).await)
    }
}

/// Split `/name[@bot] args` into lowercase name, optional mention and args.
fn parse_command(text: &str) -> Option<(String, Option<&str>, &str)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let (name, mention) = match head.split_once('@') {
        Some((name, bot)) => (name, Some(bot)),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), mention, args))
}

/// `/status`: aggregate snapshot.
pub struct StatusCommand {
    source: Arc<dyn StatsSource>,
}

impl StatusCommand {
    pub fn new(source: Arc<dyn StatsSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CommandHandler for StatusCommand {
    fn name(&self) -> &'static str {
        "status"
    }

    fn description(&self) -> &'static str {
        "general info"
    }

    async fn handle(&self, _sender: i64, _args: &str) -> Reply {
        match self.source.fetch().await {
            Ok(stats) => Reply::new(status_report(&stats)),
            Err(e) => Reply::new(unreachable_notice(&e)),
        }
    }
}

/// `/workers`: one block per worker.
pub struct WorkersCommand {
    source: Arc<dyn StatsSource>,
}

impl WorkersCommand {
    pub fn new(source: Arc<dyn StatsSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl CommandHandler for WorkersCommand {
    fn name(&self) -> &'static str {
        "workers"
    }

    fn description(&self) -> &'static str {
        "list workers"
    }

    async fn handle(&self, _sender: i64, _args: &str) -> Reply {
        match self.source.fetch().await {
            Ok(stats) => Reply::new(workers_report(&stats)),
            Err(e) => Reply::new(unreachable_notice(&e)),
        }
    }
}

/// `/check`: run the scheduled evaluation now, reply to the requester only.
pub struct CheckCommand {
    source: Arc<dyn StatsSource>,
    thresholds: AlertThresholds,
}

impl CheckCommand {
    pub fn new(source: Arc<dyn StatsSource>, thresholds: AlertThresholds) -> Self {
        Self { source, thresholds }
    }
}

#[async_trait]
impl CommandHandler for CheckCommand {
    fn name(&self) -> &'static str {
        "check"
    }

    fn description(&self) -> &'static str {
        "run the worker check now"
    }

    async fn handle(&self, _sender: i64, _args: &str) -> Reply {
        let outcome = run_check(self.source.as_ref(), &self.thresholds).await;
        Reply::new(outcome.reply_text())
    }
}

pub struct PingCommand;

#[async_trait]
impl CommandHandler for PingCommand {
    fn name(&self) -> &'static str {
        "ping"
    }

    fn description(&self) -> &'static str {
        "are you alive?"
    }

    async fn handle(&self, _sender: i64, _args: &str) -> Reply {
        Reply::new(PONG)
    }
}

pub struct HelpCommand;

#[async_trait]
impl CommandHandler for HelpCommand {
    fn name(&self) -> &'static str {
        "help"
    }

    fn description(&self) -> &'static str {
        "print the command list"
    }

    async fn handle(&self, _sender: i64, _args: &str) -> Reply {
        Reply::new(HELP_TEXT)
    }
}
