use serde::{Deserialize, Serialize};

/// Operating mode reported by the vehicle's mission-control backend.
/// Unrecognized wire values decode to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    #[default]
    Idle,
    Teleop,
    Autonomous,
    #[serde(other)]
    Unknown,
}

impl SystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemMode::Idle => "IDLE",
            SystemMode::Teleop => "TELEOP",
            SystemMode::Autonomous => "AUTONOMOUS",
            SystemMode::Unknown => "UNKNOWN",
        }
    }
}

/// Planar vehicle pose. Positions in centimeters, heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RobotPose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}
