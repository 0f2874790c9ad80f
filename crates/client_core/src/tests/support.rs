//! Fakes shared by the unit tests.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{
    camera::{CameraChange, CameraSlot, CameraSurface, SharedCamera},
    config::MotionSettings,
    error::CameraError,
    motion::{FrameOutcome, MotionController},
    scheduler::FrameQueue,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CameraCall {
    Ease(CameraChange, Duration),
    Pan([f64; 2], Duration),
}

/// Camera that applies eased targets instantly and records every call along
/// with how many frames were pending when it happened.
pub(crate) struct RecordingCamera {
    pub zoom: f64,
    pub pitch: Option<f64>,
    pub bearing: Option<f64>,
    pub calls: Vec<CameraCall>,
    pub pending_frames_at_call: Vec<usize>,
    pub frames: Option<FrameQueue>,
    pub fail_pans: bool,
}

impl RecordingCamera {
    pub fn at_zoom(zoom: f64) -> Self {
        Self {
            zoom,
            pitch: Some(0.0),
            bearing: Some(0.0),
            calls: Vec::new(),
            pending_frames_at_call: Vec::new(),
            frames: None,
            fail_pans: false,
        }
    }

    fn record(&mut self, call: CameraCall) {
        let pending = self.frames.as_ref().map_or(0, FrameQueue::pending_len);
        self.pending_frames_at_call.push(pending);
        self.calls.push(call);
    }
}

impl CameraSurface for RecordingCamera {
    fn zoom(&self) -> f64 {
        self.zoom
    }

    fn pitch(&self) -> Option<f64> {
        self.pitch
    }

    fn bearing(&self) -> Option<f64> {
        self.bearing
    }

    fn ease_to(&mut self, change: CameraChange, duration: Duration) -> Result<(), CameraError> {
        self.record(CameraCall::Ease(change, duration));
        match change {
            CameraChange::Zoom(zoom) => self.zoom = zoom,
            CameraChange::Pitch(pitch) => self.pitch = Some(pitch),
            CameraChange::Bearing(bearing) => self.bearing = Some(bearing),
        }
        Ok(())
    }

    fn pan_by(&mut self, offset: [f64; 2], duration: Duration) -> Result<(), CameraError> {
        self.record(CameraCall::Pan(offset, duration));
        if self.fail_pans {
            return Err(CameraError::rejected("pan", "style not loaded"));
        }
        Ok(())
    }
}

/// Controller wired to a recording camera and a manually drained frame
/// queue.
pub(crate) struct MotionRig {
    pub camera: Arc<Mutex<RecordingCamera>>,
    pub slot: CameraSlot,
    pub frames: FrameQueue,
    pub controller: MotionController<FrameQueue>,
}

impl MotionRig {
    pub fn new(zoom: f64) -> Self {
        Self::with_settings(zoom, MotionSettings::default())
    }

    pub fn with_settings(zoom: f64, settings: MotionSettings) -> Self {
        let frames = FrameQueue::new();
        let mut recording = RecordingCamera::at_zoom(zoom);
        recording.frames = Some(frames.clone());
        let camera = Arc::new(Mutex::new(recording));
        let shared: SharedCamera = camera.clone();
        let slot = CameraSlot::new();
        slot.attach(&shared);
        let controller = MotionController::new(settings, slot.clone(), frames.clone());
        Self {
            camera,
            slot,
            frames,
            controller,
        }
    }

    pub fn calls(&self) -> Vec<CameraCall> {
        self.camera.lock().expect("camera").calls.clone()
    }

    pub fn pans(&self) -> Vec<[f64; 2]> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CameraCall::Pan(offset, _) => Some(offset),
                CameraCall::Ease(..) => None,
            })
            .collect()
    }

    pub fn zoom(&self) -> f64 {
        self.camera.lock().expect("camera").zoom
    }

    pub fn pitch(&self) -> f64 {
        self.camera.lock().expect("camera").pitch.unwrap_or(0.0)
    }

    /// Fires every due frame at `now`, as the host's frame clock would.
    pub fn tick(&mut self, now: Instant) -> Vec<FrameOutcome> {
        self.frames
            .take_due()
            .into_iter()
            .map(|handle| self.controller.on_frame(handle, now).expect("frame"))
            .collect()
    }
}

pub(crate) fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
