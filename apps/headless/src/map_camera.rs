//! A map view held in memory, for running the engine without a renderer.

use std::time::Duration;

use client_core::{CameraChange, CameraError, CameraSurface};
use tracing::debug;

const TILE_SIZE: f64 = 256.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    /// `[longitude, latitude]` in degrees.
    pub center: [f64; 2],
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
}

impl Default for MapView {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            zoom: 2.0,
            pitch: 0.0,
            bearing: 0.0,
        }
    }
}

/// Applies eased changes immediately; there is no animation to wait for.
#[derive(Debug, Default)]
pub struct InMemoryMapCamera {
    view: MapView,
}

impl InMemoryMapCamera {
    pub fn new(view: MapView) -> Self {
        Self { view }
    }

    pub fn view(&self) -> MapView {
        self.view
    }
}

impl CameraSurface for InMemoryMapCamera {
    fn zoom(&self) -> f64 {
        self.view.zoom
    }

    fn pitch(&self) -> Option<f64> {
        Some(self.view.pitch)
    }

    fn bearing(&self) -> Option<f64> {
        Some(self.view.bearing)
    }

    fn ease_to(&mut self, change: CameraChange, duration: Duration) -> Result<(), CameraError> {
        let target = change.value();
        if !target.is_finite() {
            return Err(CameraError::rejected(
                change.operation(),
                format!("non-finite target {target}"),
            ));
        }
        match change {
            CameraChange::Zoom(zoom) => self.view.zoom = zoom,
            CameraChange::Pitch(pitch) => self.view.pitch = pitch,
            CameraChange::Bearing(bearing) => self.view.bearing = bearing.rem_euclid(360.0),
        }
        debug!(
            operation = change.operation(),
            target,
            duration_ms = duration.as_millis() as u64,
            "camera eased"
        );
        Ok(())
    }

    fn pan_by(&mut self, offset: [f64; 2], _duration: Duration) -> Result<(), CameraError> {
        if !offset.iter().all(|v| v.is_finite()) {
            return Err(CameraError::rejected("pan", "non-finite offset"));
        }
        let degrees_per_pixel = 360.0 / (TILE_SIZE * self.view.zoom.exp2());
        let [lng, lat] = self.view.center;
        self.view.center = [
            wrap_lng(lng + offset[0] * degrees_per_pixel),
            (lat - offset[1] * degrees_per_pixel).clamp(-85.0, 85.0),
        ];
        Ok(())
    }
}

fn wrap_lng(lng: f64) -> f64 {
    (lng + 180.0).rem_euclid(360.0) - 180.0
}
