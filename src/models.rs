//! Data models for the cooling-unit telemetry pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// Raw snapshot of the remote key/value tree.
///
/// Every field is optional: an absent key means "no update this tick", never
/// "value is zero". Keys the tree carries that we do not recognise (e.g.
/// `settings`) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    // ---
    /// Dry outlet temperature (°C).
    #[serde(rename = "sensor1", default, skip_serializing_if = "Option::is_none")]
    pub outlet_temp: Option<f64>,

    /// Inlet temperature (°C).
    #[serde(rename = "sensor2", default, skip_serializing_if = "Option::is_none")]
    pub inlet_temp: Option<f64>,

    #[serde(rename = "intake-humidity", default, skip_serializing_if = "Option::is_none")]
    pub intake_humidity: Option<f64>,

    #[serde(rename = "outtake-humidity", default, skip_serializing_if = "Option::is_none")]
    pub outtake_humidity: Option<f64>,

    #[serde(rename = "dry-fan", default, skip_serializing_if = "Option::is_none")]
    pub dry_fan: Option<f64>,

    #[serde(rename = "wet-fan", default, skip_serializing_if = "Option::is_none")]
    pub wet_fan: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal: Option<bool>,

    /// Heartbeat flag written by the device.
    #[serde(rename = "isAlive", default, skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
}

impl RawSnapshot {
    /// True when the snapshot carries no recognised key at all.
    pub fn is_empty(&self) -> bool {
        // ---
        *self == Self::default()
    }

    /// Reference snapshot used to seed a fresh store for COP testing.
    ///
    /// Dry fan at 50% yields the 0.259 kg/s baseline mass flow.
    pub fn test_data() -> Self {
        // ---
        Self {
            outlet_temp: Some(20.0),
            inlet_temp: Some(32.0),
            intake_humidity: Some(32.0),
            outtake_humidity: Some(65.0),
            dry_fan: Some(50.0),
            wet_fan: Some(100.0),
            pump: Some(true),
            optimal: Some(false),
            is_alive: Some(true),
        }
    }
}

/// One point-in-time reading of the physical process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    pub inlet_temp: f64,
    pub outlet_temp: f64,
    pub intake_humidity: Option<f64>,
    pub outtake_humidity: Option<f64>,
    pub dry_fan_speed: f64,
    pub wet_fan_speed: f64,
    pub pump_active: bool,
}

impl Reading {
    /// Compare everything but the timestamp.
    pub fn same_values(&self, other: &Reading) -> bool {
        // ---
        self.inlet_temp == other.inlet_temp
            && self.outlet_temp == other.outlet_temp
            && self.intake_humidity == other.intake_humidity
            && self.outtake_humidity == other.outtake_humidity
            && self.dry_fan_speed == other.dry_fan_speed
            && self.wet_fan_speed == other.wet_fan_speed
            && self.pump_active == other.pump_active
    }
}

/// Electrical power drawn by each actuator (W).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerConsumption {
    pub total: f64,
    pub dry_fan: f64,
    pub wet_fan: f64,
    pub pump: f64,
}

/// Realised fraction of the ideal temperature drop. Not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Effectiveness {
    pub wet_bulb: f64,
    pub dew_point: f64,
}

/// Output of the psychrometric pipeline for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    // ---
    pub inlet_dew_point: f64,
    pub outlet_dew_point: f64,
    pub inlet_wet_bulb: f64,
    pub outlet_wet_bulb: f64,
    pub inlet_enthalpy: f64,
    pub outlet_enthalpy: f64,
    /// kg/s
    pub mass_flow_rate: f64,
    /// W; negative when the outlet is warmer than the inlet.
    pub cooling_effect: f64,
    pub cop: f64,
    pub power_consumption: PowerConsumption,
    pub effectiveness: Effectiveness,
}

/// A reading plus whatever could be derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    // ---
    pub reading: Reading,
    /// `None` when humidity was missing or out of domain.
    pub metrics: Option<DerivedMetrics>,
}

impl LogEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.reading.timestamp
    }
}

/// Current best-known device state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SystemState {
    // ---
    pub dry_outlet_temp: Option<f64>,
    pub inlet_temp: Option<f64>,
    pub intake_humidity: Option<f64>,
    pub outtake_humidity: Option<f64>,
    pub dry_fan_speed: f64,
    pub wet_fan_speed: f64,
    pub is_pump_active: bool,
    pub is_optimal_mode: bool,
    pub is_system_connected: bool,
    pub has_initial_data: bool,
    /// Inlet above the configured `max_temp`.
    pub temperature_alert: bool,
    pub derived: Option<DerivedMetrics>,
    pub last_update: Option<DateTime<Utc>>,
}

impl SystemState {
    /// Merge the defined fields of `raw`; absent fields keep their value.
    pub fn merge(&mut self, raw: &RawSnapshot) {
        // ---
        if let Some(v) = raw.outlet_temp {
            self.dry_outlet_temp = Some(v);
        }
        if let Some(v) = raw.inlet_temp {
            self.inlet_temp = Some(v);
        }
        if let Some(v) = raw.intake_humidity {
            self.intake_humidity = Some(v);
        }
        if let Some(v) = raw.outtake_humidity {
            self.outtake_humidity = Some(v);
        }
        if let Some(v) = raw.dry_fan {
            self.dry_fan_speed = v;
        }
        if let Some(v) = raw.wet_fan {
            self.wet_fan_speed = v;
        }
        if let Some(v) = raw.pump {
            self.is_pump_active = v;
        }
        if let Some(v) = raw.optimal {
            self.is_optimal_mode = v;
        }
    }

    /// Snapshot the measured values as a `Reading`, if both temperatures are known.
    pub fn reading_at(&self, timestamp: DateTime<Utc>) -> Option<Reading> {
        // ---
        Some(Reading {
            timestamp,
            inlet_temp: self.inlet_temp?,
            outlet_temp: self.dry_outlet_temp?,
            intake_humidity: self.intake_humidity,
            outtake_humidity: self.outtake_humidity,
            dry_fan_speed: self.dry_fan_speed,
            wet_fan_speed: self.wet_fan_speed,
            pump_active: self.is_pump_active,
        })
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_wire_keys() {
        // ---
        let json = r#"{
            "sensor1": 20.0, "sensor2": 32.0,
            "intake-humidity": 32, "outtake-humidity": 65,
            "dry-fan": 50, "wet-fan": 100,
            "pump": true, "optimal": false, "isAlive": true,
            "settings": { "maxTemp": 30 }
        }"#;
        let raw: RawSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(raw, RawSnapshot::test_data());
    }

    #[test]
    fn test_absent_keys_stay_absent() {
        // ---
        let raw: RawSnapshot = serde_json::from_str(r#"{ "dry-fan": 0 }"#).unwrap();

        assert_eq!(raw.dry_fan, Some(0.0));
        assert_eq!(raw.wet_fan, None);
        assert_eq!(raw.is_alive, None);

        let out = serde_json::to_value(&raw).unwrap();
        assert_eq!(out, serde_json::json!({ "dry-fan": 0.0 }));
    }

    #[test]
    fn test_merge_keeps_prior_values() {
        // ---
        let mut state = SystemState::default();
        state.merge(&RawSnapshot::test_data());

        let partial = RawSnapshot {
            inlet_temp: Some(35.0),
            ..Default::default()
        };
        state.merge(&partial);

        assert_eq!(state.inlet_temp, Some(35.0));
        assert_eq!(state.dry_outlet_temp, Some(20.0));
        assert_eq!(state.dry_fan_speed, 50.0);
        assert!(state.is_pump_active);
    }

    #[test]
    fn test_reading_requires_both_temperatures() {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut state = SystemState::default();
        state.merge(&RawSnapshot {
            inlet_temp: Some(30.0),
            ..Default::default()
        });
        assert!(state.reading_at(at).is_none());

        state.merge(&RawSnapshot {
            outlet_temp: Some(22.0),
            ..Default::default()
        });
        let reading = state.reading_at(at).unwrap();
        assert_eq!(reading.inlet_temp, 30.0);
        assert_eq!(reading.outlet_temp, 22.0);
        assert_eq!(reading.intake_humidity, None);
    }

    #[test]
    fn test_same_values_ignores_timestamp() {
        // ---
        let mut state = SystemState::default();
        state.merge(&RawSnapshot::test_data());
        let a = state
            .reading_at(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
            .unwrap();
        let b = state
            .reading_at(Utc.with_ymd_and_hms(2025, 6, 1, 12, 5, 0).unwrap())
            .unwrap();
        assert!(a.same_values(&b));

        let mut c = b.clone();
        c.outlet_temp = 21.0;
        assert!(!a.same_values(&c));
    }
}
