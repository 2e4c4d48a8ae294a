//! CSV export of the telemetry log.
//!
//! Column order and precision are a stable contract for downstream tools.

use chrono::{DateTime, Utc};

use crate::models::LogEntry;

// ---

pub const CSV_HEADERS: [&str; 17] = [
    "Date",
    "Time",
    "Hot Air (Inlet) °C",
    "Cold Air (Outlet) °C",
    "Inlet Humidity %",
    "Outlet Humidity %",
    "Inlet Dew Point °C",
    "Outlet Dew Point °C",
    "Wet Bulb Effectiveness",
    "Dew Point Effectiveness",
    "Mass Flow Rate kg/s",
    "Dry Fan Speed %",
    "Wet Fan Speed %",
    "Pump Status",
    "Total Power W",
    "Cooling Effect W",
    "COP",
];

fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

fn opt_fixed(value: Option<f64>, decimals: usize) -> String {
    value.map(|v| fixed(v, decimals)).unwrap_or_default()
}

fn row(entry: &LogEntry) -> String {
    // ---
    let r = &entry.reading;
    let m = entry.metrics.as_ref();

    let cells = [
        r.timestamp.format("%Y-%m-%d").to_string(),
        r.timestamp.format("%H:%M:%S").to_string(),
        fixed(r.inlet_temp, 2),
        fixed(r.outlet_temp, 2),
        opt_fixed(r.intake_humidity, 1),
        opt_fixed(r.outtake_humidity, 1),
        opt_fixed(m.map(|m| m.inlet_dew_point), 2),
        opt_fixed(m.map(|m| m.outlet_dew_point), 2),
        opt_fixed(m.map(|m| m.effectiveness.wet_bulb), 3),
        opt_fixed(m.map(|m| m.effectiveness.dew_point), 3),
        opt_fixed(m.map(|m| m.mass_flow_rate), 3),
        fixed(r.dry_fan_speed, 1),
        fixed(r.wet_fan_speed, 1),
        if r.pump_active { "ON" } else { "OFF" }.to_string(),
        opt_fixed(m.map(|m| m.power_consumption.total), 1),
        opt_fixed(m.map(|m| m.cooling_effect), 1),
        opt_fixed(m.map(|m| m.cop), 2),
    ];
    cells.join(",")
}

/// Render entries as CSV, header first. Empty input gives an empty string.
pub fn to_csv(entries: &[LogEntry]) -> String {
    // ---
    if entries.is_empty() {
        return String::new();
    }

    std::iter::once(CSV_HEADERS.join(","))
        .chain(entries.iter().map(row))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `temperature_log_<date>_<time>.csv`
pub fn timestamped_filename(now: DateTime<Utc>) -> String {
    format!("temperature_log_{}.csv", now.format("%Y-%m-%d_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::{RawSnapshot, SystemState};
    use crate::psychrometrics::{evaluate_performance, PerformanceInputs};
    use chrono::TimeZone;

    fn reference_entry() -> LogEntry {
        // ---
        let mut state = SystemState::default();
        state.merge(&RawSnapshot::test_data());
        let reading = state
            .reading_at(Utc.with_ymd_and_hms(2025, 8, 2, 14, 30, 5).unwrap())
            .unwrap();
        let metrics = evaluate_performance(&PerformanceInputs {
            inlet_temp: 32.0,
            outlet_temp: 20.0,
            inlet_rh: 32.0,
            outlet_rh: 65.0,
            dry_fan_speed: 50.0,
            wet_fan_speed: 100.0,
            pump_active: true,
        })
        .unwrap();
        LogEntry {
            reading,
            metrics: Some(metrics),
        }
    }

    #[test]
    fn test_empty_export() {
        assert_eq!(to_csv(&[]), "");
    }

    #[test]
    fn test_header_order() {
        // ---
        let csv = to_csv(&[reference_entry()]);
        let header = csv.lines().next().unwrap();
        assert_eq!(
            header,
            "Date,Time,Hot Air (Inlet) °C,Cold Air (Outlet) °C,Inlet Humidity %,\
             Outlet Humidity %,Inlet Dew Point °C,Outlet Dew Point °C,\
             Wet Bulb Effectiveness,Dew Point Effectiveness,Mass Flow Rate kg/s,\
             Dry Fan Speed %,Wet Fan Speed %,Pump Status,Total Power W,\
             Cooling Effect W,COP"
        );
    }

    #[test]
    fn test_row_precision() {
        // ---
        let csv = to_csv(&[reference_entry()]);
        let cells: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();

        assert_eq!(cells.len(), CSV_HEADERS.len());
        assert_eq!(cells[0], "2025-08-02");
        assert_eq!(cells[1], "14:30:05");
        assert_eq!(cells[2], "32.00");
        assert_eq!(cells[3], "20.00");
        assert_eq!(cells[4], "32.0");
        assert_eq!(cells[5], "65.0");
        assert_eq!(cells[10], "0.259");
        assert_eq!(cells[11], "50.0");
        assert_eq!(cells[12], "100.0");
        assert_eq!(cells[13], "ON");
        assert_eq!(cells[14], "300.0");
        assert_eq!(cells[16], "10.41");
    }

    #[test]
    fn test_missing_metrics_leave_blank_cells() {
        // ---
        let mut entry = reference_entry();
        entry.metrics = None;
        entry.reading.intake_humidity = None;

        let csv = to_csv(&[entry]);
        let cells: Vec<&str> = csv.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(cells.len(), CSV_HEADERS.len());
        assert_eq!(cells[4], "");
        assert_eq!(cells[16], "");
        assert_eq!(cells[13], "ON");
    }

    #[test]
    fn test_filename() {
        // ---
        let at = Utc.with_ymd_and_hms(2025, 8, 2, 9, 5, 0).unwrap();
        assert_eq!(timestamped_filename(at), "temperature_log_2025-08-02_09-05-00.csv");
    }
}
