use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RobotPose, SystemMode};

/// Messages the operator console sends to the vehicle backend.
///
/// The serde tag doubles as the channel name, so the wire form is
/// `{"channel": "...", "payload": {...}}` with the exact channel names the
/// backend listens on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum OperatorCommand {
    Ping {
        message: String,
        timestamp: DateTime<Utc>,
        client: String,
    },
    TeleopCommand {
        linear: f64,
        angular: f64,
        timestamp: DateTime<Utc>,
    },
    SetForkHeight {
        height_cm: f64,
        timestamp: DateTime<Utc>,
    },
    RequestVideoStream {},
}

/// Full vehicle status report, published on `system_status`.
///
/// `last_update` is optional on the wire; consumers decide how to treat its
/// absence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStatusPayload {
    pub mode: SystemMode,
    pub robot_pose: RobotPose,
    pub fork_height: f64,
    pub connected_clients: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

/// Messages the vehicle backend sends to the operator console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "channel", content = "payload", rename_all = "snake_case")]
pub enum VehicleEvent {
    Pong {
        timestamp: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        received_data: Option<serde_json::Value>,
    },
    SystemStatus(SystemStatusPayload),
    CommandAck {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    ForkStatus {
        height: f64,
    },
    VideoStatus {
        status: String,
    },
}
