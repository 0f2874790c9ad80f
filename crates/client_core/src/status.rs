//! Observable control status consumed by an external HUD.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

const STATUS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlStatus {
    pub connected: bool,
    pub hand_detected: bool,
    pub active_gesture: String,
    pub fps: Option<f64>,
    pub camera_disconnected: bool,
    pub hand_timeout: bool,
}

impl Default for ControlStatus {
    fn default() -> Self {
        Self {
            connected: false,
            hand_detected: false,
            active_gesture: "idle".to_string(),
            fps: None,
            camera_disconnected: false,
            hand_timeout: false,
        }
    }
}

/// Last-known status plus change fan-out.
///
/// Observers call [`StatusBoard::subscribe`] and unsubscribe by dropping the
/// receiver. A snapshot is published only when an update actually changes
/// it.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    current: Arc<Mutex<ControlStatus>>,
    changes: broadcast::Sender<ControlStatus>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            current: Arc::new(Mutex::new(ControlStatus::default())),
            changes,
        }
    }

    pub fn snapshot(&self) -> ControlStatus {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlStatus> {
        self.changes.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.changes.receiver_count()
    }

    /// Applies `change` and publishes the result if anything differs.
    /// Returns whether a change was published.
    pub fn update(&self, change: impl FnOnce(&mut ControlStatus)) -> bool {
        let published = {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = current.clone();
            change(&mut next);
            if next == *current {
                return false;
            }
            *current = next.clone();
            next
        };
        // No observers is not an error.
        let _ = self.changes.send(published);
        true
    }

    pub fn set_connected(&self, connected: bool) -> bool {
        self.update(|status| status.connected = connected)
    }
}
