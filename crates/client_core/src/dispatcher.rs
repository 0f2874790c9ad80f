//! Routes decoded producer messages to the motion controller and the
//! status board.

use std::time::Instant;

use shared::{
    domain::GestureKind,
    error::ProtocolError,
    protocol::{GestureEvent, HeartbeatEvent, InboundEvent, StatusEvent},
};
use tracing::{debug, trace, warn};

use crate::{
    error::CameraError,
    motion::{FrameOutcome, MotionController},
    scheduler::{FrameHandle, FrameScheduler},
    status::StatusBoard,
};

/// What a single dispatched message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Gesture(GestureKind),
    UnknownGesture,
    Heartbeat,
    Status,
    /// Missing or foreign `type`.
    Ignored,
    /// Not JSON, or a known type with an invalid body.
    Malformed,
}

pub struct EventDispatcher<S: FrameScheduler> {
    motion: MotionController<S>,
    status: StatusBoard,
}

impl<S: FrameScheduler> EventDispatcher<S> {
    pub fn new(motion: MotionController<S>, status: StatusBoard) -> Self {
        Self { motion, status }
    }

    pub fn motion(&self) -> &MotionController<S> {
        &self.motion
    }

    pub fn motion_mut(&mut self) -> &mut MotionController<S> {
        &mut self.motion
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }

    /// Handles one raw text frame. Decode failures are logged and dropped;
    /// only camera failures are returned.
    pub fn dispatch(&mut self, raw: &str, now: Instant) -> Result<Dispatched, CameraError> {
        let event = match InboundEvent::decode(raw) {
            Ok(event) => event,
            Err(err) => return Ok(dropped(&err)),
        };

        match event {
            InboundEvent::Gesture(gesture) => self.on_gesture(&gesture, now),
            InboundEvent::Heartbeat(heartbeat) => {
                self.on_heartbeat(&heartbeat);
                Ok(Dispatched::Heartbeat)
            }
            InboundEvent::Status(status) => {
                self.on_status(&status);
                Ok(Dispatched::Status)
            }
        }
    }

    pub fn on_frame(
        &mut self,
        handle: FrameHandle,
        now: Instant,
    ) -> Result<FrameOutcome, CameraError> {
        self.motion.on_frame(handle, now)
    }

    /// Halts any running pan; used when the transport goes away.
    pub fn stop_motion(&mut self) -> bool {
        self.motion.stop_pan()
    }

    fn on_gesture(
        &mut self,
        gesture: &GestureEvent,
        now: Instant,
    ) -> Result<Dispatched, CameraError> {
        let kind = match gesture.kind() {
            Ok(kind) => kind,
            Err(err) => {
                debug!(%err, "ignoring gesture");
                return Ok(Dispatched::UnknownGesture);
            }
        };
        trace!(
            gesture = %kind,
            intensity = gesture.intensity(),
            velocity = gesture.velocity(),
            sent_at = ?gesture.sent_at(),
            "gesture received"
        );

        self.status.update(|status| {
            status.active_gesture = kind.as_str().to_string();
            status.camera_disconnected = false;
        });
        self.motion.apply_gesture(gesture, now)?;
        Ok(Dispatched::Gesture(kind))
    }

    fn on_heartbeat(&mut self, heartbeat: &HeartbeatEvent) {
        trace!(sent_at = ?heartbeat.sent_at(), "heartbeat");
        let fps = heartbeat.fps.as_ref().and_then(|fps| fps.value());
        self.status.update(|status| {
            if let Some(hand_detected) = heartbeat.hand_detected {
                status.hand_detected = hand_detected;
                if hand_detected {
                    status.hand_timeout = false;
                }
            }
            if fps.is_some() {
                status.fps = fps;
            }
        });
    }

    fn on_status(&mut self, event: &StatusEvent) {
        let camera_lost = event.camera_disconnected();
        self.status.update(|status| {
            if let Some(lost) = camera_lost {
                status.camera_disconnected = lost;
            }
            if let Some(timed_out) = event.hand_timeout {
                status.hand_timeout = timed_out;
            }
        });

        let signal_lost = camera_lost == Some(true) || event.hand_timeout == Some(true);
        if signal_lost && self.motion.stop_pan() {
            debug!(
                camera = ?event.camera,
                hand_timeout = ?event.hand_timeout,
                "producer reported signal loss; pan stopped"
            );
        }
    }
}

fn dropped(err: &ProtocolError) -> Dispatched {
    if err.is_unroutable() {
        debug!(%err, "ignoring message");
        Dispatched::Ignored
    } else {
        warn!(%err, "dropping malformed message");
        Dispatched::Malformed
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
