//! Operator commands, independent of whatever surface issues them.

use serde::{Deserialize, Serialize};

use crate::store::paths;

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanKind {
    Dry,
    Wet,
}

impl FanKind {
    /// Tree path holding this fan's duty.
    pub fn path(self) -> &'static str {
        match self {
            Self::Dry => paths::DRY_FAN,
            Self::Wet => paths::WET_FAN,
        }
    }
}

/// A control action against the device.
///
/// On the wire: `{"command": "set_fan_speed", "fan": "dry", "speed": 40}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SetFanSpeed { fan: FanKind, speed: f64 },
    TogglePump,
    SetOptimalMode { enabled: bool },
    /// Push the optimal setpoints from settings, then enable optimal mode.
    ApplyOptimal,
    /// Everything off. Not gated on connectivity.
    EmergencyStop,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        // ---
        let cmd: Command =
            serde_json::from_value(json!({ "command": "set_fan_speed", "fan": "wet", "speed": 75 }))
                .unwrap();
        assert_eq!(
            cmd,
            Command::SetFanSpeed {
                fan: FanKind::Wet,
                speed: 75.0
            }
        );

        let stop: Command = serde_json::from_value(json!({ "command": "emergency_stop" })).unwrap();
        assert_eq!(stop, Command::EmergencyStop);

        assert!(serde_json::from_value::<Command>(json!({ "command": "self_destruct" })).is_err());
    }

    #[test]
    fn test_fan_paths() {
        // ---
        assert_eq!(FanKind::Dry.path(), "dry-fan");
        assert_eq!(FanKind::Wet.path(), "wet-fan");
    }
}
