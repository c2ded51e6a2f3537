//! Telegram alerting for Ethermine miner statistics.
//!
//! This crate provides:
//! - Chat command dispatch with an authorized-user gate
//! - The periodic worker check and its broadcast
//! - Telegram bot integration
//! - Message formatting

pub mod dispatcher;
pub mod format;
pub mod notifier;
pub mod telegram;

pub use dispatcher::{CommandHandler, CommandRegistry, Inbound, Reply};
pub use notifier::{run_check, ChatSender, CheckOutcome, Notifier};
pub use telegram::{TelegramBot, TelegramError};
