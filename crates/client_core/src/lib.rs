//! Turns a stream of classified hand gestures into camera motion on a map
//! surface.
//!
//! [`GestureRuntime`] owns the engine: it keeps a receive-only connection to
//! the gesture producer alive, routes each message through the
//! [`EventDispatcher`] and drives the continuous pan loop from its frame
//! clock. Hosts talk to it through a [`RuntimeHandle`].

pub mod camera;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod motion;
pub mod runtime;
pub mod scheduler;
pub mod status;
pub mod transport;

pub use camera::{CameraChange, CameraSlot, CameraSurface, SharedCamera};
pub use config::{load_settings, ControlSettings, MotionSettings};
pub use connection::{ConnectionAction, ConnectionManager, ConnectionState};
pub use dispatcher::{Dispatched, EventDispatcher};
pub use error::{CameraError, RuntimeStopped, TransportError};
pub use motion::{FrameOutcome, GestureOutcome, MotionController, PanAnimation};
pub use runtime::{GestureRuntime, RuntimeCommand, RuntimeHandle};
pub use scheduler::{FrameHandle, FrameQueue, FrameScheduler};
pub use status::{ControlStatus, StatusBoard};
pub use transport::{EventSource, InboundStream, WebSocketSource};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
