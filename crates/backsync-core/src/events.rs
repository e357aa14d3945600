//! Progress events emitted by a backup run.
//!
//! Events are fanned out to every subscriber over unbounded channels and
//! mirrored to the `log` facade. Emitting never blocks and never depends on
//! anyone listening.

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::Level;
use parking_lot::Mutex;
use std::fmt;

/// One `(message, detail)` notification.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: Level,
    pub message: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.message, self.detail)
        }
    }
}

/// Fan-out hub for [`LogEvent`]s.
#[derive(Debug, Default)]
pub struct EventLog {
    subscribers: Mutex<Vec<Sender<LogEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer. Events emitted before this call are not replayed.
    pub fn subscribe(&self) -> Receiver<LogEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn info(&self, message: &str, detail: impl fmt::Display) {
        self.emit(Level::Info, message, detail);
    }

    pub fn warn(&self, message: &str, detail: impl fmt::Display) {
        self.emit(Level::Warn, message, detail);
    }

    pub fn debug(&self, message: &str, detail: impl fmt::Display) {
        self.emit(Level::Debug, message, detail);
    }

    pub fn emit(&self, level: Level, message: &str, detail: impl fmt::Display) {
        let event = LogEvent {
            level,
            message: message.to_string(),
            detail: detail.to_string(),
            timestamp: Utc::now(),
        };

        log::log!(target: "backsync", level, "{event}");

        // Receivers that went away are dropped from the list
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
