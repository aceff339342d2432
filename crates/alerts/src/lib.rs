//! Telegram alert delivery for flight deals.
//!
//! This crate provides:
//! - The `NotificationDispatcher` trait used by the scheduler
//! - HTML message formatting for drop alerts and daily digests
//! - Telegram bot integration

pub mod format;
pub mod notifier;
pub mod telegram;

pub use format::{format_digest, format_drop_alert, format_no_deals, format_startup};
pub use notifier::{DispatchError, NotificationDispatcher, RecordingDispatcher};
pub use telegram::{TelegramConfig, TelegramDispatcher};
