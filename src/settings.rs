//! Operator settings stored alongside telemetry under `settings`.
//!
//! These are read-only inputs here: the optimal-mode setpoints, the daily
//! operating window and the inlet temperature alert threshold.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

// ---

const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // ---
    /// Start of the operating window, `HH:MM`.
    pub start_time: String,
    /// End of the operating window, `HH:MM`.
    pub end_time: String,
    pub optimal_dry_fan: f64,
    pub optimal_wet_fan: f64,
    pub optimal_pump: bool,
    /// Inlet temperature (°C) above which an alert is raised.
    pub max_temp: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            start_time: "08:00".to_string(),
            end_time: "18:00".to_string(),
            optimal_dry_fan: 50.0,
            optimal_wet_fan: 50.0,
            optimal_pump: false,
            max_temp: 30.0,
        }
    }
}

impl Settings {
    /// Whether `time` falls in `[start_time, end_time)`.
    ///
    /// A window whose end precedes its start wraps midnight. Unparsable
    /// bounds, or equal bounds, mean the window is never open.
    pub fn is_within_schedule(&self, time: NaiveTime) -> bool {
        // ---
        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(&self.start_time, TIME_FORMAT),
            NaiveTime::parse_from_str(&self.end_time, TIME_FORMAT),
        ) else {
            tracing::debug!(
                start = %self.start_time,
                end = %self.end_time,
                "unparsable schedule window"
            );
            return false;
        };

        if start <= end {
            start <= time && time < end
        } else {
            time >= start || time < end
        }
    }

    pub fn exceeds_max_temp(&self, inlet_temp: f64) -> bool {
        inlet_temp > self.max_temp
    }
}
