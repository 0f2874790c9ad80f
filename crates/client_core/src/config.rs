use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

use crate::error::TransportError;

pub const DEFAULT_SETTINGS_FILE: &str = "gesture_control.toml";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8765";

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 20.0;
pub const MIN_PITCH: f64 = 0.0;
pub const MAX_PITCH: f64 = 85.0;

pub const MIN_PAN_IDLE_TIMEOUT: Duration = Duration::from_millis(600);
pub const MAX_PAN_IDLE_TIMEOUT: Duration = Duration::from_millis(1500);

// pan_speed 80 gives a 6px floor plus 120px per unit of velocity.
const PAN_BASE_FACTOR: f64 = 0.075;
const PAN_VELOCITY_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct MotionSettings {
    pub zoom_speed: f64,
    pub pan_speed: f64,
    /// Easing duration for zoom transitions.
    pub smoothing: Duration,
    pub pitch_speed: f64,
    pub bearing_speed: f64,
    /// Easing duration for pitch and bearing transitions.
    pub tilt_duration: Duration,
    pub pan_idle_timeout: Duration,
    /// Emit one pan step immediately when a pan starts instead of waiting
    /// for the first frame.
    pub pan_burst: bool,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            zoom_speed: 0.3,
            pan_speed: 80.0,
            smoothing: Duration::from_millis(150),
            pitch_speed: 8.0,
            bearing_speed: 6.0,
            tilt_duration: Duration::from_millis(30),
            pan_idle_timeout: MAX_PAN_IDLE_TIMEOUT,
            pan_burst: false,
        }
    }
}

impl MotionSettings {
    /// Pixels moved per frame for a pan event with the given velocity.
    pub fn pan_frame_pixels(&self, velocity: f64) -> f64 {
        self.pan_speed * PAN_BASE_FACTOR + velocity * self.pan_speed * PAN_VELOCITY_FACTOR
    }

    /// Clamps values into the ranges the controller supports.
    pub fn normalized(mut self) -> Self {
        self.zoom_speed = finite_or(self.zoom_speed, 0.0).max(0.0);
        self.pan_speed = finite_or(self.pan_speed, 0.0).max(0.0);
        self.pitch_speed = finite_or(self.pitch_speed, 0.0).max(0.0);
        self.bearing_speed = finite_or(self.bearing_speed, 0.0).max(0.0);
        self.pan_idle_timeout = self
            .pan_idle_timeout
            .clamp(MIN_PAN_IDLE_TIMEOUT, MAX_PAN_IDLE_TIMEOUT);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlSettings {
    pub ws_url: String,
    pub reconnect_delay: Duration,
    pub frame_interval: Duration,
    pub motion: MotionSettings,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.into(),
            reconnect_delay: Duration::from_millis(2000),
            frame_interval: Duration::from_millis(16),
            motion: MotionSettings::default(),
        }
    }
}

/// On-disk representation; durations are milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    ws_url: Option<String>,
    reconnect_delay_ms: Option<u64>,
    frame_interval_ms: Option<u64>,
    zoom_speed: Option<f64>,
    pan_speed: Option<f64>,
    smoothing_ms: Option<u64>,
    pitch_speed: Option<f64>,
    bearing_speed: Option<f64>,
    tilt_duration_ms: Option<u64>,
    pan_idle_timeout_ms: Option<u64>,
    pan_burst: Option<bool>,
}

/// Defaults, then the settings file, then environment overrides.
///
/// An explicit `path` must exist; otherwise [`DEFAULT_SETTINGS_FILE`] in the
/// working directory is used when present.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ControlSettings> {
    let mut settings = ControlSettings::default();

    let file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(PathBuf::from(DEFAULT_SETTINGS_FILE)).filter(|path| path.exists()),
    };
    if let Some(file) = file {
        let raw = fs::read_to_string(&file)
            .with_context(|| format!("failed to read settings file '{}'", file.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid settings file '{}'", file.display()))?;
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings.motion = settings.motion.normalized();
    validate_ws_url(&settings.ws_url)?;
    Ok(settings)
}

fn apply_file(settings: &mut ControlSettings, raw: &str) -> anyhow::Result<()> {
    let file: SettingsFile = toml::from_str(raw)?;

    if let Some(v) = file.ws_url {
        settings.ws_url = v;
    }
    if let Some(v) = file.reconnect_delay_ms {
        settings.reconnect_delay = Duration::from_millis(v);
    }
    if let Some(v) = file.frame_interval_ms {
        settings.frame_interval = Duration::from_millis(v.max(1));
    }
    let motion = &mut settings.motion;
    if let Some(v) = file.zoom_speed {
        motion.zoom_speed = v;
    }
    if let Some(v) = file.pan_speed {
        motion.pan_speed = v;
    }
    if let Some(v) = file.smoothing_ms {
        motion.smoothing = Duration::from_millis(v);
    }
    if let Some(v) = file.pitch_speed {
        motion.pitch_speed = v;
    }
    if let Some(v) = file.bearing_speed {
        motion.bearing_speed = v;
    }
    if let Some(v) = file.tilt_duration_ms {
        motion.tilt_duration = Duration::from_millis(v);
    }
    if let Some(v) = file.pan_idle_timeout_ms {
        motion.pan_idle_timeout = Duration::from_millis(v);
    }
    if let Some(v) = file.pan_burst {
        motion.pan_burst = v;
    }

    Ok(())
}

/// Unparseable values are ignored, matching how the file layer treats
/// absent keys.
pub fn apply_env_overrides(
    settings: &mut ControlSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let parsed_f64 = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());
    let parsed_ms = |key: &str| {
        lookup(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
    };

    if let Some(v) = lookup("GESTURE_WS_URL") {
        settings.ws_url = v;
    }
    if let Some(v) = lookup("APP__WS_URL") {
        settings.ws_url = v;
    }
    if let Some(v) = parsed_ms("APP__RECONNECT_DELAY_MS") {
        settings.reconnect_delay = v;
    }
    if let Some(v) = parsed_f64("APP__ZOOM_SPEED") {
        settings.motion.zoom_speed = v;
    }
    if let Some(v) = parsed_f64("APP__PAN_SPEED") {
        settings.motion.pan_speed = v;
    }
    if let Some(v) = parsed_ms("APP__SMOOTHING_MS") {
        settings.motion.smoothing = v;
    }
    if let Some(v) = parsed_f64("APP__PITCH_SPEED") {
        settings.motion.pitch_speed = v;
    }
    if let Some(v) = parsed_f64("APP__BEARING_SPEED") {
        settings.motion.bearing_speed = v;
    }
    if let Some(v) = parsed_ms("APP__PAN_IDLE_TIMEOUT_MS") {
        settings.motion.pan_idle_timeout = v;
    }
}

pub fn validate_ws_url(raw: &str) -> Result<Url, TransportError> {
    let url = Url::parse(raw.trim()).map_err(|err| TransportError::InvalidUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(TransportError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("scheme must be ws or wss, got {other}"),
        }),
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
