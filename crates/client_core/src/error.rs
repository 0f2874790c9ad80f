use thiserror::Error;

/// Failure reported by a camera surface while applying a change.
///
/// These indicate an integration defect rather than a transient condition,
/// so the engine never retries them.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CameraError {
    #[error("camera rejected {operation}: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },
    #[error("camera lock poisoned")]
    Poisoned,
}

impl CameraError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid event source url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to connect websocket {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[error("websocket receive failed: {0}")]
    Receive(#[source] tokio_tungstenite::tungstenite::Error),
    #[error("event source unavailable: {0}")]
    Unavailable(String),
}

/// The runtime task has ended, so commands can no longer be delivered.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("gesture runtime has stopped")]
pub struct RuntimeStopped;
