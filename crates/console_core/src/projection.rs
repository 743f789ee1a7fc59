//! Projects inbound status reports into immutable snapshots for UI sinks.

use chrono::{DateTime, Utc};

use shared::domain::{RobotPose, SystemMode};
use shared::protocol::SystemStatusPayload;

/// Last known vehicle status as consumed by display layers. Snapshots are
/// replaced wholesale, never merged field by field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemStatus {
    pub mode: SystemMode,
    pub robot_pose: RobotPose,
    pub fork_height_cm: f64,
    pub connected_clients: u32,
    pub last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct StatusProjector {
    current: SystemStatus,
}

impl StatusProjector {
    pub fn current(&self) -> &SystemStatus {
        &self.current
    }

    /// Replaces the snapshot with the incoming report. A report without
    /// `last_update` still replaces every other field; the previously known
    /// update time is carried into the new snapshot so the displayed time
    /// never regresses to empty.
    pub fn apply_status(&mut self, status: SystemStatusPayload) -> SystemStatus {
        let last_update = status.last_update.or(self.current.last_update);
        self.current = SystemStatus {
            mode: status.mode,
            robot_pose: status.robot_pose,
            fork_height_cm: status.fork_height,
            connected_clients: status.connected_clients,
            last_update,
        };
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(mode: SystemMode, x: f64, last_update: Option<DateTime<Utc>>) -> SystemStatusPayload {
        SystemStatusPayload {
            mode,
            robot_pose: RobotPose {
                x,
                y: 2.0 * x,
                theta: 45.0,
            },
            fork_height: 80.0,
            connected_clients: 1,
            last_update,
        }
    }

    #[test]
    fn reports_replace_the_snapshot_wholesale() {
        let mut projector = StatusProjector::default();
        let first = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        projector.apply_status(report(SystemMode::Teleop, 10.0, Some(first)));

        let second = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 1).unwrap();
        let snapshot = projector.apply_status(report(SystemMode::Autonomous, -4.0, Some(second)));
        assert_eq!(snapshot.mode, SystemMode::Autonomous);
        assert_eq!(snapshot.robot_pose.x, -4.0);
        assert_eq!(snapshot.last_update, Some(second));
        assert_eq!(projector.current(), &snapshot);
    }

    #[test]
    fn missing_last_update_carries_previous_time_forward() {
        let mut projector = StatusProjector::default();
        let known = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        projector.apply_status(report(SystemMode::Idle, 0.0, Some(known)));

        let snapshot = projector.apply_status(report(SystemMode::Teleop, 99.0, None));
        assert_eq!(snapshot.mode, SystemMode::Teleop);
        assert_eq!(snapshot.robot_pose.x, 99.0);
        assert_eq!(snapshot.last_update, Some(known));
    }

    #[test]
    fn status_starts_at_defaults_before_any_report() {
        let projector = StatusProjector::default();
        assert_eq!(projector.current().mode, SystemMode::Idle);
        assert!(projector.current().last_update.is_none());
        assert_eq!(projector.current().connected_clients, 0);
    }
}
