//! User-visible notifications.
//!
//! The client raises a `Message` when something happens the user should see
//! (session ended, CSRF token could not be renewed). Front ends decide how to
//! show them by installing a `Notifier`.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Danger,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Info => "info",
            MessageKind::Success => "success",
            MessageKind::Warning => "warning",
            MessageKind::Danger => "danger",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(from: impl Into<String>, content: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            from: from.into(),
            content: content.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn warning(from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(from, content, MessageKind::Warning)
    }
}

/// Receives notifications raised by the client.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: Message);
}

/// Notifier that keeps messages until a front end drains them.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Mutex<Vec<Message>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the queued messages, oldest first.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Take every queued message, leaving the queue empty.
    pub fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Notifier for MessageQueue {
    fn notify(&self, message: Message) {
        tracing::info!(from = %message.from, kind = %message.kind, "{}", message.content);
        self.lock().push(message);
    }
}
