//! Gesture-to-camera motion.
//!
//! Instantaneous gestures (zoom, pitch, bearing) become one eased camera
//! transition each. Pan is "hold to move": the producer repeats
//! `pan_left`/`pan_right` while the hand keeps swiping, so pan events only
//! refresh a [`PanAnimation`] and the frame loop emits the motion. Signal
//! freshness comes from events, motion from frames, and the idle timeout
//! stops the loop when the event stream goes quiet without an `idle`.

use std::time::{Duration, Instant};

use shared::{
    domain::{GestureKind, PanDirection},
    protocol::GestureEvent,
};
use tracing::debug;

use crate::{
    camera::{with_camera, CameraChange, CameraSlot, CameraSurface, SharedCamera},
    config::{MotionSettings, MAX_PITCH, MAX_ZOOM, MIN_PITCH, MIN_ZOOM},
    error::CameraError,
    scheduler::{FrameHandle, FrameScheduler},
};

/// State of an active continuous pan. Its absence means direction 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanAnimation {
    pub direction: PanDirection,
    pub frame_pixels: f64,
    pub last_event: Instant,
    /// The one frame currently scheduled for this pan.
    pub pending_frame: FrameHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    /// Gesture name outside the known set.
    Unrecognized,
    /// No camera was attached; the gesture was dropped.
    NoCamera,
    Eased {
        change: CameraChange,
        duration: Duration,
    },
    PanStarted(PanDirection),
    PanRefreshed(PanDirection),
    Idle,
    /// The computed target overflowed; nothing was sent to the camera.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame does not belong to the running pan.
    Stale,
    Stepped,
    TimedOut,
    CameraGone,
}

pub struct MotionController<S: FrameScheduler> {
    settings: MotionSettings,
    camera: CameraSlot,
    scheduler: S,
    pan: Option<PanAnimation>,
}

impl<S: FrameScheduler> MotionController<S> {
    pub fn new(settings: MotionSettings, camera: CameraSlot, scheduler: S) -> Self {
        Self {
            settings: settings.normalized(),
            camera,
            scheduler,
            pan: None,
        }
    }

    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// A running pan keeps its step until the next pan event.
    pub fn update_settings(&mut self, settings: MotionSettings) {
        self.settings = settings.normalized();
    }

    pub fn camera(&self) -> &CameraSlot {
        &self.camera
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn pan(&self) -> Option<&PanAnimation> {
        self.pan.as_ref()
    }

    pub fn is_panning(&self) -> bool {
        self.pan.is_some()
    }

    pub fn apply_gesture(
        &mut self,
        event: &GestureEvent,
        now: Instant,
    ) -> Result<GestureOutcome, CameraError> {
        let kind = match event.kind() {
            Ok(kind) => kind,
            Err(err) => {
                debug!(%err, "ignoring gesture");
                return Ok(GestureOutcome::Unrecognized);
            }
        };
        // Any non-pan gesture ends the pan, camera or not.
        let pan_direction = kind.pan_direction();
        if pan_direction.is_none() {
            self.stop_pan();
        }

        let Some(camera) = self.camera.resolve() else {
            debug!(gesture = %kind, "no camera attached; dropping gesture");
            return Ok(GestureOutcome::NoCamera);
        };

        if let Some(direction) = pan_direction {
            return self.start_pan(&camera, direction, event.velocity(), now);
        }
        if kind == GestureKind::Idle {
            return Ok(GestureOutcome::Idle);
        }

        let settings = &self.settings;
        let intensity = event.intensity();
        with_camera(&camera, |surface| {
            let Some((change, duration)) = eased_target(kind, &*surface, settings, intensity)
            else {
                debug!(gesture = %kind, intensity, "target is not finite; camera left as is");
                return Ok(GestureOutcome::Unchanged);
            };
            debug!(gesture = %kind, ?change, "easing camera");
            surface.ease_to(change, duration)?;
            Ok(GestureOutcome::Eased { change, duration })
        })
    }

    /// Cancels the pending frame and resets direction. Returns whether a
    /// pan was running.
    pub fn stop_pan(&mut self) -> bool {
        match self.pan.take() {
            Some(pan) => {
                self.scheduler.cancel_frame(pan.pending_frame);
                debug!(direction = ?pan.direction, "pan stopped");
                true
            }
            None => false,
        }
    }

    /// One tick of the pan loop.
    ///
    /// The next frame is requested before the step is emitted so a failing
    /// camera call does not end the loop.
    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        now: Instant,
    ) -> Result<FrameOutcome, CameraError> {
        let Some(pan) = self.pan.as_mut() else {
            return Ok(FrameOutcome::Stale);
        };
        if pan.pending_frame != handle {
            return Ok(FrameOutcome::Stale);
        }

        let Some(camera) = self.camera.resolve() else {
            self.pan = None;
            debug!("camera detached; pan loop ended");
            return Ok(FrameOutcome::CameraGone);
        };

        let idle_for = now.saturating_duration_since(pan.last_event);
        if idle_for > self.settings.pan_idle_timeout {
            self.pan = None;
            debug!(
                idle_ms = idle_for.as_millis() as u64,
                "no pan event within timeout; pan loop ended"
            );
            return Ok(FrameOutcome::TimedOut);
        }

        pan.pending_frame = self.scheduler.request_frame();
        let offset = pan_offset(pan.direction, pan.frame_pixels);
        with_camera(&camera, |surface| surface.pan_by(offset, Duration::ZERO))?;
        Ok(FrameOutcome::Stepped)
    }

    fn start_pan(
        &mut self,
        camera: &SharedCamera,
        direction: PanDirection,
        velocity: f64,
        now: Instant,
    ) -> Result<GestureOutcome, CameraError> {
        let frame_pixels = self.settings.pan_frame_pixels(velocity);

        if let Some(pan) = self.pan.as_mut() {
            pan.direction = direction;
            pan.frame_pixels = frame_pixels;
            pan.last_event = now;
            return Ok(GestureOutcome::PanRefreshed(direction));
        }

        let pending_frame = self.scheduler.request_frame();
        self.pan = Some(PanAnimation {
            direction,
            frame_pixels,
            last_event: now,
            pending_frame,
        });
        debug!(?direction, frame_pixels, "pan started");

        if self.settings.pan_burst {
            let offset = pan_offset(direction, frame_pixels);
            with_camera(camera, |surface| surface.pan_by(offset, Duration::ZERO))?;
        }
        Ok(GestureOutcome::PanStarted(direction))
    }
}

fn pan_offset(direction: PanDirection, frame_pixels: f64) -> [f64; 2] {
    [direction.sign() * frame_pixels, 0.0]
}

/// Target and easing duration for an instantaneous gesture, `None` for pan
/// and idle or when the target is not a finite number.
fn eased_target(
    kind: GestureKind,
    surface: &dyn CameraSurface,
    settings: &MotionSettings,
    intensity: f64,
) -> Option<(CameraChange, Duration)> {
    let scale = 1.0 + intensity;
    let zoom_step = settings.zoom_speed * scale;
    let pitch_step = settings.pitch_speed * scale;
    let bearing_step = settings.bearing_speed * scale;
    let pitch = surface.pitch().unwrap_or(0.0);
    let bearing = surface.bearing().unwrap_or(0.0);

    let target = match kind {
        GestureKind::ZoomIn => (
            CameraChange::Zoom((surface.zoom() + zoom_step).clamp(MIN_ZOOM, MAX_ZOOM)),
            settings.smoothing,
        ),
        GestureKind::ZoomOut => (
            CameraChange::Zoom((surface.zoom() - zoom_step).clamp(MIN_ZOOM, MAX_ZOOM)),
            settings.smoothing,
        ),
        GestureKind::PitchUp => (
            CameraChange::Pitch((pitch + pitch_step).clamp(MIN_PITCH, MAX_PITCH)),
            settings.tilt_duration,
        ),
        GestureKind::PitchDown => (
            CameraChange::Pitch((pitch - pitch_step).clamp(MIN_PITCH, MAX_PITCH)),
            settings.tilt_duration,
        ),
        GestureKind::BearingCw => (
            CameraChange::Bearing(bearing + bearing_step),
            settings.tilt_duration,
        ),
        GestureKind::BearingCcw => (
            CameraChange::Bearing(bearing - bearing_step),
            settings.tilt_duration,
        ),
        GestureKind::PanLeft | GestureKind::PanRight | GestureKind::Idle => return None,
    };
    target.0.value().is_finite().then_some(target)
}

#[cfg(test)]
#[path = "tests/motion_tests.rs"]
mod tests;
