use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{GestureKind, UnknownGesture},
    error::ProtocolError,
};

/// One message from the gesture producer, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Gesture(GestureEvent),
    Heartbeat(HeartbeatEvent),
    Status(StatusEvent),
}

impl InboundEvent {
    /// Decodes a single text frame.
    ///
    /// The `type` discriminator is read before the body so that foreign
    /// message types surface as [`ProtocolError::UnsupportedType`] instead of
    /// a generic decode failure.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw).map_err(ProtocolError::Json)?;
        let kind = match &value {
            Value::Object(fields) => fields
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(ProtocolError::MissingType)?,
            _ => return Err(ProtocolError::NotAnObject),
        };

        match kind.as_str() {
            "gesture" => serde_json::from_value(value)
                .map(InboundEvent::Gesture)
                .map_err(|source| ProtocolError::InvalidBody {
                    kind: "gesture",
                    source,
                }),
            "heartbeat" => serde_json::from_value(value)
                .map(InboundEvent::Heartbeat)
                .map_err(|source| ProtocolError::InvalidBody {
                    kind: "heartbeat",
                    source,
                }),
            "status" => serde_json::from_value(value)
                .map(InboundEvent::Status)
                .map_err(|source| ProtocolError::InvalidBody {
                    kind: "status",
                    source,
                }),
            _ => Err(ProtocolError::UnsupportedType(kind)),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub gesture: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl GestureEvent {
    pub fn new(kind: GestureKind) -> Self {
        Self {
            gesture: kind.as_str().to_string(),
            intensity: None,
            velocity: None,
            timestamp: None,
        }
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.intensity = Some(intensity);
        self
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn kind(&self) -> Result<GestureKind, UnknownGesture> {
        self.gesture.parse()
    }

    /// Intensity scalar; absent, negative and non-finite values read as 0.
    pub fn intensity(&self) -> f64 {
        non_negative(self.intensity)
    }

    /// Velocity scalar; absent, negative and non-finite values read as 0.
    pub fn velocity(&self) -> f64 {
        non_negative(self.velocity)
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.timestamp)
    }
}

/// Frame rate as reported by the producer, either a number or a numeric
/// string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fps {
    Number(f64),
    Text(String),
}

impl Fps {
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            Fps::Number(value) => *value,
            Fps::Text(text) => text.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_detected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<Fps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_gesture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl HeartbeatEvent {
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.timestamp)
    }
}

pub const CAMERA_DISCONNECTED: &str = "disconnected";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_timeout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl StatusEvent {
    /// `Some(true)` when the producer lost its camera, `Some(false)` when it
    /// reports any other camera state, `None` when the flag is absent.
    pub fn camera_disconnected(&self) -> Option<bool> {
        self.camera
            .as_deref()
            .map(|camera| camera == CAMERA_DISCONNECTED)
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    match value {
        Some(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

fn millis_to_utc(timestamp: Option<f64>) -> Option<DateTime<Utc>> {
    let millis = timestamp.filter(|value| value.is_finite())?;
    DateTime::from_timestamp_millis(millis as i64)
}
