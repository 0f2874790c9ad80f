use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use crate::error::UnknownGesture;

/// Closed set of gestures the producer may classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    PitchUp,
    PitchDown,
    BearingCw,
    BearingCcw,
    Idle,
}

impl GestureKind {
    pub const ALL: [GestureKind; 9] = [
        GestureKind::ZoomIn,
        GestureKind::ZoomOut,
        GestureKind::PanLeft,
        GestureKind::PanRight,
        GestureKind::PitchUp,
        GestureKind::PitchDown,
        GestureKind::BearingCw,
        GestureKind::BearingCcw,
        GestureKind::Idle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GestureKind::ZoomIn => "zoom_in",
            GestureKind::ZoomOut => "zoom_out",
            GestureKind::PanLeft => "pan_left",
            GestureKind::PanRight => "pan_right",
            GestureKind::PitchUp => "pitch_up",
            GestureKind::PitchDown => "pitch_down",
            GestureKind::BearingCw => "bearing_cw",
            GestureKind::BearingCcw => "bearing_ccw",
            GestureKind::Idle => "idle",
        }
    }

    /// Direction for the continuous gestures, `None` for everything else.
    pub fn pan_direction(self) -> Option<PanDirection> {
        match self {
            GestureKind::PanLeft => Some(PanDirection::Left),
            GestureKind::PanRight => Some(PanDirection::Right),
            _ => None,
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureKind {
    type Err = UnknownGesture;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        GestureKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownGesture(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanDirection {
    Left,
    Right,
}

impl PanDirection {
    pub fn sign(self) -> f64 {
        match self {
            PanDirection::Left => -1.0,
            PanDirection::Right => 1.0,
        }
    }
}
