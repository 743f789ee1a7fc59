use thiserror::Error;

/// Reasons a dispatched operator command is rejected before reaching the wire.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CommandError {
    #[error("not connected to the vehicle backend")]
    NotConnected,
    #[error("fork height must be a finite number, got {0}")]
    InvalidForkHeight(f64),
    #[error("outbound queue is full, command dropped")]
    TransportBusy,
}
