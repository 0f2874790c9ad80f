//! The task that owns the engine and drives it from transport events,
//! host commands, the reconnect timer and the frame clock.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    camera::{CameraSlot, SharedCamera},
    config::{validate_ws_url, ControlSettings, MotionSettings},
    connection::{ConnectionAction, ConnectionManager, ConnectionState},
    dispatcher::EventDispatcher,
    error::RuntimeStopped,
    motion::MotionController,
    scheduler::FrameQueue,
    status::{ControlStatus, StatusBoard},
    transport::{spawn_transport, EventSource, TransportEvent, TransportEventKind},
};

const TRANSPORT_CHANNEL_CAPACITY: usize = 256;
/// `tokio::time::interval` rejects a zero period.
const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCommand {
    Connect,
    Disconnect,
    Destroy,
    /// Used by the next connection attempt.
    SetWsUrl(String),
    UpdateMotion(MotionSettings),
}

/// Cloneable control surface for a running [`GestureRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    commands: mpsc::UnboundedSender<RuntimeCommand>,
    camera: CameraSlot,
    status: StatusBoard,
}

impl RuntimeHandle {
    pub fn connect(&self) -> Result<(), RuntimeStopped> {
        self.send(RuntimeCommand::Connect)
    }

    pub fn disconnect(&self) -> Result<(), RuntimeStopped> {
        self.send(RuntimeCommand::Disconnect)
    }

    /// Permanent shutdown; the runtime task ends after processing it.
    pub fn destroy(&self) -> Result<(), RuntimeStopped> {
        self.send(RuntimeCommand::Destroy)
    }

    pub fn set_ws_url(&self, url: impl Into<String>) -> Result<(), RuntimeStopped> {
        self.send(RuntimeCommand::SetWsUrl(url.into()))
    }

    pub fn update_motion(&self, settings: MotionSettings) -> Result<(), RuntimeStopped> {
        self.send(RuntimeCommand::UpdateMotion(settings))
    }

    /// The runtime only keeps a weak reference; the host must keep `camera`
    /// alive for gestures to have an effect.
    pub fn attach_camera(&self, camera: &SharedCamera) {
        self.camera.attach(camera);
    }

    pub fn detach_camera(&self) {
        self.camera.detach();
    }

    pub fn status(&self) -> ControlStatus {
        self.status.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, command: RuntimeCommand) -> Result<(), RuntimeStopped> {
        self.commands.send(command).map_err(|_| RuntimeStopped)
    }
}

struct ActiveTransport {
    generation: u64,
    task: JoinHandle<()>,
}

pub struct GestureRuntime<E: EventSource> {
    source: Arc<E>,
    ws_url: String,
    frame_interval: Duration,
    connection: ConnectionManager,
    dispatcher: EventDispatcher<FrameQueue>,
    frames: FrameQueue,
    commands: mpsc::UnboundedReceiver<RuntimeCommand>,
    transport_tx: mpsc::Sender<TransportEvent>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport: Option<ActiveTransport>,
    reconnect_at: Option<Instant>,
}

impl<E: EventSource> GestureRuntime<E> {
    pub fn new(settings: ControlSettings, source: E) -> (Self, RuntimeHandle) {
        let camera = CameraSlot::new();
        let status = StatusBoard::new();
        let frames = FrameQueue::new();
        let motion = MotionController::new(settings.motion, camera.clone(), frames.clone());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::channel(TRANSPORT_CHANNEL_CAPACITY);

        let runtime = Self {
            source: Arc::new(source),
            ws_url: settings.ws_url,
            frame_interval: settings.frame_interval.max(MIN_FRAME_INTERVAL),
            connection: ConnectionManager::new(settings.reconnect_delay),
            dispatcher: EventDispatcher::new(motion, status.clone()),
            frames,
            commands,
            transport_tx,
            transport_rx,
            transport: None,
            reconnect_at: None,
        };
        let handle = RuntimeHandle {
            commands: commands_tx,
            camera,
            status,
        };
        (runtime, handle)
    }

    /// Runs until destroyed or until every [`RuntimeHandle`] is dropped.
    pub async fn run(mut self) {
        let mut frame_clock = time::interval(self.frame_interval);
        frame_clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut clock_running = false;

        loop {
            let frames_pending = self.frames.has_pending();
            if frames_pending && !clock_running {
                // First frame lands one interval after the pan starts.
                frame_clock.reset();
            }
            clock_running = frames_pending;
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(RuntimeCommand::Destroy) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(event) = self.transport_rx.recv() => self.on_transport_event(event),
                _ = time::sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    let actions = self.connection.on_reconnect_timer();
                    self.execute(actions);
                }
                _ = frame_clock.tick(), if frames_pending => self.on_frame_tick(),
            }
        }

        self.shutdown();
    }

    fn on_command(&mut self, command: RuntimeCommand) {
        match command {
            RuntimeCommand::Connect => {
                let actions = self.connection.connect();
                self.execute(actions);
            }
            RuntimeCommand::Disconnect => {
                let actions = self.connection.disconnect();
                self.execute(actions);
            }
            RuntimeCommand::SetWsUrl(url) => match validate_ws_url(&url) {
                Ok(_) => {
                    info!(%url, "event source url updated");
                    self.ws_url = url;
                }
                Err(err) => warn!(%err, "keeping previous event source url"),
            },
            RuntimeCommand::UpdateMotion(settings) => {
                debug!(?settings, "motion settings updated");
                self.dispatcher.motion_mut().update_settings(settings);
            }
            RuntimeCommand::Destroy => {}
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        let TransportEvent { generation, kind } = event;
        match kind {
            TransportEventKind::Opened => {
                let actions = self.connection.on_opened(generation);
                self.execute(actions);
            }
            TransportEventKind::Message(raw) => {
                if !self.connection.accepts(generation) {
                    trace!(generation, "dropping message from stale transport");
                    return;
                }
                let now = Instant::now().into_std();
                match self.dispatcher.dispatch(&raw, now) {
                    Ok(dispatched) => trace!(?dispatched, "message dispatched"),
                    Err(err) => error!(%err, "camera rejected gesture"),
                }
            }
            TransportEventKind::Closed => {
                self.release_transport(generation);
                let actions = self.connection.on_closed(generation);
                self.execute(actions);
            }
            TransportEventKind::Error(err) => {
                self.release_transport(generation);
                let actions = self.connection.on_error(generation, &err);
                self.execute(actions);
            }
        }
    }

    fn on_frame_tick(&mut self) {
        let now = Instant::now().into_std();
        for handle in self.frames.take_due() {
            match self.dispatcher.on_frame(handle, now) {
                Ok(outcome) => trace!(?outcome, "pan frame"),
                Err(err) => error!(%err, "camera rejected pan step"),
            }
        }
    }

    fn execute(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::Open { generation } => {
                    self.abort_transport();
                    info!(generation, url = %self.ws_url, "connecting to gesture producer");
                    let task = spawn_transport(
                        Arc::clone(&self.source),
                        self.ws_url.clone(),
                        generation,
                        self.transport_tx.clone(),
                    );
                    self.transport = Some(ActiveTransport { generation, task });
                }
                ConnectionAction::Close { generation } => {
                    if self
                        .transport
                        .as_ref()
                        .is_some_and(|active| active.generation == generation)
                    {
                        self.abort_transport();
                    }
                }
                ConnectionAction::ScheduleReconnect { delay } => {
                    self.reconnect_at = Some(Instant::now() + delay);
                }
                ConnectionAction::CancelReconnect => {
                    self.reconnect_at = None;
                }
                ConnectionAction::StateChanged(state) => {
                    self.dispatcher
                        .status()
                        .set_connected(state == ConnectionState::Connected);
                    if state == ConnectionState::Disconnected {
                        self.dispatcher.stop_motion();
                    }
                }
            }
        }
    }

    /// Forgets a transport whose task is finishing on its own.
    fn release_transport(&mut self, generation: u64) {
        if self
            .transport
            .as_ref()
            .is_some_and(|active| active.generation == generation)
        {
            self.transport = None;
        }
    }

    fn abort_transport(&mut self) {
        if let Some(active) = self.transport.take() {
            debug!(generation = active.generation, "aborting transport task");
            active.task.abort();
        }
    }

    fn shutdown(&mut self) {
        let actions = self.connection.destroy();
        self.execute(actions);
        self.abort_transport();
        self.reconnect_at = None;
        self.dispatcher.stop_motion();
        self.dispatcher.status().set_connected(false);
        info!("gesture runtime stopped");
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
