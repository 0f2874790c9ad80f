//! Frame scheduling capability for the continuous pan loop.

use std::sync::{Arc, Mutex, PoisonError};

/// Identifies one requested animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameHandle(pub u64);

/// Host primitive for "call me on the next frame".
pub trait FrameScheduler: Send {
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancelling a handle that already fired or was never issued is a no-op.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Debug, Default)]
struct PendingFrames {
    next_id: u64,
    pending: Vec<FrameHandle>,
}

/// Shared queue of requested frames.
///
/// The motion controller requests and cancels frames through one clone
/// while the runtime (or a test) drains due frames through another and
/// feeds them back as ticks.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    inner: Arc<Mutex<PendingFrames>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every frame requested so far, oldest first.
    pub fn take_due(&self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.lock().pending)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.lock().pending.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PendingFrames> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FrameScheduler for FrameQueue {
    fn request_frame(&mut self) -> FrameHandle {
        let mut frames = self.lock();
        frames.next_id += 1;
        let handle = FrameHandle(frames.next_id);
        frames.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.lock().pending.retain(|pending| *pending != handle);
    }
}
