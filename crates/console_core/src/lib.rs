use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, trace, warn};

use shared::protocol::{OperatorCommand, VehicleEvent};

pub mod activity_log;
pub mod connection;
pub mod error;
pub mod projection;
pub mod transport;

pub use activity_log::{ActivityLog, LogDirection, LogEntry, LOG_CAPACITY};
pub use connection::ConnectionState;
pub use error::CommandError;
pub use projection::SystemStatus;

use connection::ConnectionManager;
use projection::StatusProjector;

const EVENT_CHANNEL_CAPACITY: usize = 1024;
/// Depth of the per-connection outbound queue installed by the transport.
pub const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Notifications published to UI sinks. The session never touches
/// presentation itself; sinks subscribe and render however they like.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ConnectionChanged(ConnectionState),
    /// Full immutable snapshot after a `system_status` report.
    StatusChanged(SystemStatus),
    /// Fast-path fork readout from `fork_status`; does not imply a new snapshot.
    ForkHeightChanged(f64),
    LogAppended(LogEntry),
    LogCleared,
    /// A stop was issued; operator input widgets must return to zero.
    TeleopInputsReset,
}

#[derive(Default)]
struct SessionState {
    connection: ConnectionManager,
    projector: StatusProjector,
    log: ActivityLog,
}

/// Operator console session: owns the connection state machine, the status
/// projector and the activity log behind a single dispatch lock, and fans
/// session events out to any number of subscribed sinks.
pub struct ConsoleSession {
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl ConsoleSession {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            inner: Mutex::new(SessionState::default()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.inner.lock().await.connection.state()
    }

    /// Current status snapshot, cloned out of the session.
    pub async fn status(&self) -> SystemStatus {
        self.inner.lock().await.projector.current().clone()
    }

    /// Activity log entries, oldest first.
    pub async fn activity_log(&self) -> Vec<LogEntry> {
        self.inner.lock().await.log.to_vec()
    }

    /// Called by the transport once a socket is up. Installs the outbound
    /// queue and, on an actual `Disconnected -> Connected` edge, notifies
    /// sinks and logs the session start.
    pub async fn on_transport_connected(&self, outbound: mpsc::Sender<OperatorCommand>) {
        let mut state = self.inner.lock().await;
        if state.connection.attach(outbound) {
            info!("session with vehicle backend established");
            self.emit(SessionEvent::ConnectionChanged(ConnectionState::Connected));
            let entry = state.log.append(LogDirection::Received, "session established");
            self.emit(SessionEvent::LogAppended(entry));
        }
    }

    /// Called by the transport when the socket goes away. Idempotent: a
    /// second disconnect for the same session changes nothing and logs
    /// nothing.
    pub async fn on_transport_disconnected(&self) {
        let mut state = self.inner.lock().await;
        if state.connection.detach() {
            info!("session with vehicle backend lost");
            self.emit(SessionEvent::ConnectionChanged(
                ConnectionState::Disconnected,
            ));
            let entry = state.log.append(LogDirection::Received, "session lost");
            self.emit(SessionEvent::LogAppended(entry));
        }
    }

    /// Liveness probe. Logs the dispatched timestamp on success.
    pub async fn send_ping(&self, client: &str) -> Result<(), CommandError> {
        let mut state = self.inner.lock().await;
        let timestamp = Utc::now();
        state.connection.send(OperatorCommand::Ping {
            message: "ping".to_string(),
            timestamp,
            client: client.to_string(),
        })?;
        debug!("ping dispatched for client {client}");
        let entry = state.log.append(
            LogDirection::Sent,
            format!("ping sent at {}", timestamp.to_rfc3339()),
        );
        self.emit(SessionEvent::LogAppended(entry));
        Ok(())
    }

    /// Drive command. Runs at input-device rate, so it deliberately never
    /// reaches the activity log.
    pub async fn send_teleop(&self, linear: f64, angular: f64) -> Result<(), CommandError> {
        let state = self.inner.lock().await;
        state.connection.send(OperatorCommand::TeleopCommand {
            linear,
            angular,
            timestamp: Utc::now(),
        })?;
        trace!("teleop frame dispatched: linear={linear} angular={angular}");
        Ok(())
    }

    /// Emergency stop: a zero-velocity teleop frame, plus a reset notification
    /// so input widgets return to zero, plus a log entry.
    pub async fn send_stop(&self) -> Result<(), CommandError> {
        let mut state = self.inner.lock().await;
        state.connection.send(OperatorCommand::TeleopCommand {
            linear: 0.0,
            angular: 0.0,
            timestamp: Utc::now(),
        })?;
        info!("stop command issued");
        self.emit(SessionEvent::TeleopInputsReset);
        let entry = state.log.append(LogDirection::Sent, "stop command issued");
        self.emit(SessionEvent::LogAppended(entry));
        Ok(())
    }

    /// Commands the fork mast to an absolute height. Rejects non-finite
    /// values before taking the dispatch lock, so a failed validation has no
    /// side effects at all.
    pub async fn send_fork_height(&self, height_cm: f64) -> Result<(), CommandError> {
        if !height_cm.is_finite() {
            return Err(CommandError::InvalidForkHeight(height_cm));
        }
        let mut state = self.inner.lock().await;
        state.connection.send(OperatorCommand::SetForkHeight {
            height_cm,
            timestamp: Utc::now(),
        })?;
        info!("fork height command dispatched: {height_cm} cm");
        let entry = state.log.append(
            LogDirection::Sent,
            format!("fork height set to {height_cm} cm"),
        );
        self.emit(SessionEvent::LogAppended(entry));
        Ok(())
    }

    /// Asks the backend to start the video feed. The reply arrives on
    /// `video_status` and is diagnostic only.
    pub async fn request_video_stream(&self) -> Result<(), CommandError> {
        let state = self.inner.lock().await;
        state.connection.send(OperatorCommand::RequestVideoStream {})?;
        debug!("video stream requested");
        Ok(())
    }

    pub async fn clear_log(&self) {
        let mut state = self.inner.lock().await;
        state.log.clear();
        self.emit(SessionEvent::LogCleared);
    }

    /// Routes one inbound backend message. Every handler is a function of the
    /// current session state and the message, so the whole inbound path can
    /// be driven deterministically in tests without a socket.
    pub async fn handle_event(&self, event: VehicleEvent) {
        match event {
            VehicleEvent::Pong { timestamp, .. } => {
                let mut state = self.inner.lock().await;
                let entry = state.log.append(
                    LogDirection::Received,
                    format!("pong received at {}", timestamp.to_rfc3339()),
                );
                self.emit(SessionEvent::LogAppended(entry));
            }
            VehicleEvent::SystemStatus(status) => {
                let mut state = self.inner.lock().await;
                let snapshot = state.projector.apply_status(status);
                self.emit(SessionEvent::StatusChanged(snapshot));
            }
            VehicleEvent::ForkStatus { height } => {
                // Display fast path only; the snapshot stays owned by
                // system_status and the last message received wins on screen.
                self.emit(SessionEvent::ForkHeightChanged(height));
            }
            VehicleEvent::CommandAck { status, data } => {
                debug!("command acknowledged by backend: {status} {data:?}");
            }
            VehicleEvent::VideoStatus { status } => {
                debug!("video stream status from backend: {status}");
            }
        }
    }

    /// Decodes and routes one raw text frame from the transport. Undecodable
    /// frames are dropped with a warning; they never tear the session down.
    pub async fn handle_raw_frame(&self, text: &str) {
        match serde_json::from_str::<VehicleEvent>(text) {
            Ok(event) => self.handle_event(event).await,
            Err(err) => warn!("dropping undecodable frame from backend: {err}"),
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
