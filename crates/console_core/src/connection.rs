//! Connection lifecycle state machine and the outbound send guard.

use tokio::sync::mpsc;

use shared::protocol::OperatorCommand;

use crate::error::CommandError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Owns the transport handle and the current [`ConnectionState`].
///
/// The handle is an outbound queue installed by the transport task on each
/// successful connect and dropped again on disconnect, so frames can never be
/// buffered across a connection gap.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    state: ConnectionState,
    outbound: Option<mpsc::Sender<OperatorCommand>>,
}

impl ConnectionManager {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Installs a fresh outbound handle. Returns true when this call performed
    /// the `Disconnected -> Connected` transition; a repeated attach only
    /// swaps the handle.
    pub fn attach(&mut self, outbound: mpsc::Sender<OperatorCommand>) -> bool {
        let transitioned = self.state == ConnectionState::Disconnected;
        self.state = ConnectionState::Connected;
        self.outbound = Some(outbound);
        transitioned
    }

    /// Drops the transport handle. Idempotent: returns true only for the call
    /// that actually performed the transition.
    pub fn detach(&mut self) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Disconnected;
        self.outbound = None;
        true
    }

    /// Fire-and-forget send: hands the frame to the transport queue without
    /// waiting for delivery. Fails fast while disconnected.
    pub fn send(&self, command: OperatorCommand) -> Result<(), CommandError> {
        let outbound = match (&self.state, &self.outbound) {
            (ConnectionState::Connected, Some(outbound)) => outbound,
            _ => return Err(CommandError::NotConnected),
        };
        match outbound.try_send(command) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(CommandError::TransportBusy),
            // The writer half died before the state machine saw the edge.
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CommandError::NotConnected),
        }
    }
}
