//! Notification dispatch abstraction.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Invalid chat id: {0}")]
    InvalidChat(String),
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Message rejected: {0}")]
    Rejected(String),
}

/// Trait for messaging channels that deliver formatted alert text.
///
/// Text uses the HTML subset understood by Telegram (`<b>`, `<a href>`).
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver one message. An error means the message was not delivered.
    async fn send(&self, text: &str) -> Result<(), DispatchError>;
}

/// Dispatcher that keeps every message in memory, for testing.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    messages: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail (the message is not recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Delivered messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.messages.lock() {
            m.clear();
        }
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, text: &str) -> Result<(), DispatchError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(DispatchError::Rejected("recording dispatcher set to fail".to_string()));
        }
        if let Ok(mut m) = self.messages.lock() {
            m.push(text.to_string());
        }
        Ok(())
    }
}
