//! Camera surface capability and the weak slot the engine resolves it from.

use std::{
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
    time::Duration,
};

use crate::error::CameraError;

/// Absolute target for an eased camera transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraChange {
    Zoom(f64),
    Pitch(f64),
    Bearing(f64),
}

impl CameraChange {
    pub fn operation(&self) -> &'static str {
        match self {
            CameraChange::Zoom(_) => "zoom",
            CameraChange::Pitch(_) => "pitch",
            CameraChange::Bearing(_) => "bearing",
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            CameraChange::Zoom(v) | CameraChange::Pitch(v) | CameraChange::Bearing(v) => v,
        }
    }
}

/// The map-rendering surface driven by the motion controller.
///
/// Surfaces without pitch or bearing support keep the default getters, which
/// the controller reads as 0.
pub trait CameraSurface: Send {
    fn zoom(&self) -> f64;

    fn pitch(&self) -> Option<f64> {
        None
    }

    fn bearing(&self) -> Option<f64> {
        None
    }

    fn ease_to(&mut self, change: CameraChange, duration: Duration) -> Result<(), CameraError>;

    /// Offsets the view by `offset` pixels. Called with a zero duration for
    /// frame-by-frame stepping.
    fn pan_by(&mut self, offset: [f64; 2], duration: Duration) -> Result<(), CameraError>;
}

/// Strong handle owned by the host.
pub type SharedCamera = Arc<Mutex<dyn CameraSurface>>;

/// Weak back-reference to whichever camera the host currently exposes.
///
/// The host may attach, swap or drop its camera at any time; callers resolve
/// the slot at the point of use and must not hold the result past one call.
#[derive(Clone, Default)]
pub struct CameraSlot {
    inner: Arc<RwLock<Option<Weak<Mutex<dyn CameraSurface>>>>>,
}

impl CameraSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, camera: &SharedCamera) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::downgrade(camera));
    }

    pub fn detach(&self) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    pub fn resolve(&self) -> Option<SharedCamera> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_available(&self) -> bool {
        self.resolve().is_some()
    }
}

impl std::fmt::Debug for CameraSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSlot")
            .field("available", &self.is_available())
            .finish()
    }
}

/// Runs `op` against a locked camera, surfacing lock poisoning as a
/// [`CameraError`].
pub(crate) fn with_camera<R>(
    camera: &SharedCamera,
    op: impl FnOnce(&mut dyn CameraSurface) -> Result<R, CameraError>,
) -> Result<R, CameraError> {
    let mut guard = camera.lock().map_err(|_| CameraError::Poisoned)?;
    op(&mut *guard)
}
