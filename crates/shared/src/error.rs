use thiserror::Error;

/// Gesture name outside the closed [`GestureKind`] set.
///
/// [`GestureKind`]: crate::domain::GestureKind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown gesture `{0}`")]
pub struct UnknownGesture(pub String);

/// Reasons an inbound message could not be turned into an [`InboundEvent`].
///
/// [`InboundEvent`]: crate::protocol::InboundEvent
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("payload has no string `type` field")]
    MissingType,
    #[error("unsupported message type `{0}`")]
    UnsupportedType(String),
    #[error("invalid `{kind}` body: {source}")]
    InvalidBody {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ProtocolError {
    /// Messages with an absent or foreign `type` are ignored rather than
    /// treated as corrupt.
    pub fn is_unroutable(&self) -> bool {
        matches!(
            self,
            ProtocolError::MissingType | ProtocolError::UnsupportedType(_)
        )
    }
}
