use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Sink for user-facing notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: ToastLevel, message: &str);

    fn error(&self, message: &str) {
        self.notify(ToastLevel::Error, message);
    }

    fn success(&self, message: &str) {
        self.notify(ToastLevel::Success, message);
    }
}

#[derive(Debug)]
struct QueueState {
    next_id: u64,
    toasts: VecDeque<Toast>,
}

/// Bounded toast stack. When full, the oldest toast is dropped.
#[derive(Debug)]
pub struct ToastQueue {
    capacity: usize,
    state: Mutex<QueueState>,
}

impl ToastQueue {
    pub const DEFAULT_CAPACITY: usize = 5;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(QueueState {
                next_id: 1,
                toasts: VecDeque::new(),
            }),
        }
    }

    /// Currently visible toasts, oldest first.
    pub fn visible(&self) -> Vec<Toast> {
        self.state
            .lock()
            .map(|s| s.toasts.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn dismiss(&self, id: u64) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let before = state.toasts.len();
        state.toasts.retain(|t| t.id != id);
        state.toasts.len() != before
    }

    /// Remove and return everything, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        self.state
            .lock()
            .map(|mut s| s.toasts.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn count(&self, level: ToastLevel) -> usize {
        self.state
            .lock()
            .map(|s| s.toasts.iter().filter(|t| t.level == level).count())
            .unwrap_or_default()
    }
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl Notifier for ToastQueue {
    fn notify(&self, level: ToastLevel, message: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        let id = state.next_id;
        state.next_id += 1;
        if state.toasts.len() == self.capacity {
            state.toasts.pop_front();
        }
        state.toasts.push_back(Toast {
            id,
            level,
            message: message.to_string(),
            created_at: Utc::now(),
        });
    }
}
