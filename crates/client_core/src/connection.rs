//! Connection lifecycle for the gesture event source.
//!
//! The manager performs no I/O. Each method returns the
//! [`ConnectionAction`]s the runtime must execute (open or close a
//! transport, arm or disarm the reconnect timer, publish state).
//!
//! ```text
//! Disconnected --connect--> Connecting --opened--> Connected
//!      ^                        |                      |
//!      +------ closed/error ----+----------------------+
//!      |  (ScheduleReconnect unless disconnected or destroyed)
//!      +------ reconnect timer --> Connecting
//! ```
//!
//! Every transport attempt carries a generation number. Events tagged with
//! an older generation are stale: they never change state, which is what
//! keeps a late close from an aborted transport from re-arming reconnection.

use std::time::Duration;

use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Start a transport attempt tagged with `generation`.
    Open { generation: u64 },
    /// Tear down the transport of `generation` without reporting back.
    Close { generation: u64 },
    ScheduleReconnect { delay: Duration },
    CancelReconnect,
    StateChanged(ConnectionState),
}

#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    generation: u64,
    reconnect_delay: Duration,
    reconnect_pending: bool,
    wants_connection: bool,
    destroyed: bool,
}

impl ConnectionManager {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            generation: 0,
            reconnect_delay,
            reconnect_pending: false,
            wants_connection: false,
            destroyed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Applies to retries scheduled after the call.
    pub fn set_reconnect_delay(&mut self, delay: Duration) {
        self.reconnect_delay = delay;
    }

    /// No-op while a transport is open or opening, and after `destroy`.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.destroyed {
            debug!("connect ignored after destroy");
            return Vec::new();
        }
        self.wants_connection = true;
        if self.state != ConnectionState::Disconnected {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(ConnectionAction::CancelReconnect);
        }
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        debug!(generation = self.generation, "opening event source");
        actions.push(ConnectionAction::Open {
            generation: self.generation,
        });
        actions.push(ConnectionAction::StateChanged(ConnectionState::Connecting));
        actions
    }

    pub fn on_opened(&mut self, generation: u64) -> Vec<ConnectionAction> {
        if self.is_stale(generation) {
            debug!(generation, "closing stale transport");
            return vec![ConnectionAction::Close { generation }];
        }
        if self.state != ConnectionState::Connecting {
            return Vec::new();
        }
        self.state = ConnectionState::Connected;
        info!(generation, "event source connected");
        vec![ConnectionAction::StateChanged(ConnectionState::Connected)]
    }

    pub fn on_closed(&mut self, generation: u64) -> Vec<ConnectionAction> {
        self.transport_lost(generation, "closed")
    }

    pub fn on_error(&mut self, generation: u64, error: &str) -> Vec<ConnectionAction> {
        if !self.is_stale(generation) {
            warn!(generation, %error, "event source error");
        }
        self.transport_lost(generation, "error")
    }

    /// Whether a message received on `generation` may be dispatched.
    pub fn accepts(&self, generation: u64) -> bool {
        !self.is_stale(generation) && self.state == ConnectionState::Connected
    }

    /// A timer that fires after its retry was cancelled does nothing.
    pub fn on_reconnect_timer(&mut self) -> Vec<ConnectionAction> {
        if !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        if self.destroyed || !self.wants_connection {
            return Vec::new();
        }
        info!(generation = self.generation + 1, "reconnecting to event source");
        self.connect()
    }

    /// Reversible teardown; a later [`connect`](Self::connect) resumes.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.wants_connection = false;
        self.teardown()
    }

    /// Permanent teardown. No transport is opened and no retry is scheduled
    /// afterwards, whatever events still arrive.
    pub fn destroy(&mut self) -> Vec<ConnectionAction> {
        if self.destroyed {
            return Vec::new();
        }
        self.destroyed = true;
        self.wants_connection = false;
        info!("event source connection destroyed");
        self.teardown()
    }

    fn teardown(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        if self.reconnect_pending {
            self.reconnect_pending = false;
            actions.push(ConnectionAction::CancelReconnect);
        }
        if self.state != ConnectionState::Disconnected {
            actions.push(ConnectionAction::Close {
                generation: self.generation,
            });
            self.state = ConnectionState::Disconnected;
            actions.push(ConnectionAction::StateChanged(ConnectionState::Disconnected));
        }
        // Invalidate anything still in flight from the closed transport.
        self.generation += 1;
        actions
    }

    fn transport_lost(&mut self, generation: u64, cause: &'static str) -> Vec<ConnectionAction> {
        if self.is_stale(generation) {
            debug!(generation, cause, "ignoring stale transport event");
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            info!(generation, cause, "event source disconnected");
            actions.push(ConnectionAction::StateChanged(ConnectionState::Disconnected));
        }
        if self.wants_connection && !self.destroyed && !self.reconnect_pending {
            self.reconnect_pending = true;
            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "scheduling reconnect"
            );
            actions.push(ConnectionAction::ScheduleReconnect {
                delay: self.reconnect_delay,
            });
        }
        actions
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.destroyed || generation != self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(2000);

    fn connected() -> ConnectionManager {
        let mut manager = ConnectionManager::new(DELAY);
        manager.connect();
        let generation = manager.generation();
        manager.on_opened(generation);
        assert!(manager.is_connected());
        manager
    }

    fn scheduled_reconnects(actions: &[ConnectionAction]) -> usize {
        actions
            .iter()
            .filter(|action| matches!(action, ConnectionAction::ScheduleReconnect { .. }))
            .count()
    }

    #[test]
    fn connect_lifecycle() {
        let mut manager = ConnectionManager::new(DELAY);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        let actions = manager.connect();
        assert_eq!(
            actions,
            vec![
                ConnectionAction::Open { generation: 1 },
                ConnectionAction::StateChanged(ConnectionState::Connecting),
            ]
        );
        assert_eq!(manager.state(), ConnectionState::Connecting);

        let actions = manager.on_opened(1);
        assert_eq!(
            actions,
            vec![ConnectionAction::StateChanged(ConnectionState::Connected)]
        );
        assert!(manager.accepts(1));
    }

    #[test]
    fn connect_is_idempotent_while_open_or_opening() {
        let mut manager = ConnectionManager::new(DELAY);
        assert!(!manager.connect().is_empty());
        assert!(manager.connect().is_empty());

        manager.on_opened(manager.generation());
        assert!(manager.connect().is_empty());
        assert_eq!(manager.generation(), 1);
    }

    #[test]
    fn close_schedules_exactly_one_reconnect() {
        let mut manager = connected();
        let generation = manager.generation();

        let actions = manager.on_error(generation, "connection reset");
        assert_eq!(
            actions,
            vec![
                ConnectionAction::StateChanged(ConnectionState::Disconnected),
                ConnectionAction::ScheduleReconnect { delay: DELAY },
            ]
        );

        // The close that follows an error for the same attempt adds nothing.
        assert!(manager.on_closed(generation).is_empty());
        assert!(manager.reconnect_pending());
    }

    #[test]
    fn failed_attempt_while_connecting_also_retries() {
        let mut manager = ConnectionManager::new(DELAY);
        manager.connect();
        let actions = manager.on_error(1, "connection refused");
        assert_eq!(scheduled_reconnects(&actions), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn reconnect_timer_opens_next_generation() {
        let mut manager = connected();
        manager.on_closed(1);

        let actions = manager.on_reconnect_timer();
        assert!(actions.contains(&ConnectionAction::Open { generation: 2 }));
        assert!(!manager.reconnect_pending());

        // A duplicate timer firing is ignored.
        assert!(manager.on_reconnect_timer().is_empty());
    }

    #[test]
    fn manual_connect_cancels_pending_retry() {
        let mut manager = connected();
        manager.on_closed(1);

        let actions = manager.connect();
        assert_eq!(actions[0], ConnectionAction::CancelReconnect);
        assert!(actions.contains(&ConnectionAction::Open { generation: 2 }));
    }

    #[test]
    fn stale_generations_are_ignored() {
        let mut manager = connected();
        manager.on_closed(1);
        manager.on_reconnect_timer();

        // Late events from the first transport.
        assert!(manager.on_closed(1).is_empty());
        assert!(!manager.accepts(1));
        assert_eq!(
            manager.on_opened(1),
            vec![ConnectionAction::Close { generation: 1 }]
        );
        assert_eq!(manager.state(), ConnectionState::Connecting);
    }

    #[test]
    fn destroy_never_schedules_reconnect() {
        let mut manager = connected();
        let generation = manager.generation();
        assert!(!manager.is_destroyed());

        let actions = manager.destroy();
        assert_eq!(
            actions,
            vec![
                ConnectionAction::Close { generation },
                ConnectionAction::StateChanged(ConnectionState::Disconnected),
            ]
        );
        assert!(manager.is_destroyed());

        assert!(manager.on_closed(generation).is_empty());
        assert!(manager.on_error(generation, "late error").is_empty());
        assert!(manager.on_reconnect_timer().is_empty());
        assert!(manager.connect().is_empty());
        assert!(manager.destroy().is_empty());
        assert!(!manager.accepts(manager.generation()));
    }

    #[test]
    fn destroy_cancels_pending_retry() {
        let mut manager = connected();
        manager.on_closed(1);
        assert!(manager.reconnect_pending());

        let actions = manager.destroy();
        assert_eq!(actions, vec![ConnectionAction::CancelReconnect]);
        assert!(manager.on_reconnect_timer().is_empty());
    }

    #[test]
    fn disconnect_is_reversible() {
        let mut manager = connected();
        let actions = manager.disconnect();
        assert!(actions.contains(&ConnectionAction::Close { generation: 1 }));
        assert_eq!(scheduled_reconnects(&manager.on_closed(1)), 0);

        let actions = manager.connect();
        assert!(actions
            .iter()
            .any(|action| matches!(action, ConnectionAction::Open { .. })));
    }

    #[test]
    fn reconnect_delay_updates_apply_to_next_retry() {
        let mut manager = connected();
        manager.set_reconnect_delay(Duration::from_millis(250));
        let actions = manager.on_closed(1);
        assert!(actions.contains(&ConnectionAction::ScheduleReconnect {
            delay: Duration::from_millis(250)
        }));
    }
}
