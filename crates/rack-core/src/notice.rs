//! User-visible notices and sync state.
//!
//! The engine never talks to a UI directly. It publishes [`Notice`]s on a
//! broadcast channel and clients decide how to render them: informational
//! notices are transient, error notices persist until dismissed.

use std::fmt;

use tokio::sync::broadcast;

const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// Severity of a notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    /// Whether the notice should stay visible until dismissed.
    pub const fn is_persistent(self) -> bool {
        matches!(self, Self::Error)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Coarse sync state shown next to the inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    /// Reachable, but conflicts are waiting for a decision.
    Conflicts,
    Error,
}

/// Fan-out publisher for notices. Cloning shares the channel.
#[derive(Clone, Debug)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Info, message.into());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, message.into());
    }

    fn publish(&self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Error => tracing::error!("{message}"),
            NoticeLevel::Warning => tracing::warn!("{message}"),
            NoticeLevel::Success | NoticeLevel::Info => tracing::info!("{message}"),
        }
        // No subscribers is not an error: notices are best-effort.
        let _ = self.sender.send(Notice { level, message });
    }
}
