//! Time-windowed log of readings and their derived metrics.

use std::collections::VecDeque;

use chrono::Duration;
use serde::Serialize;

use crate::models::LogEntry;

// ---

/// Default retention window.
pub const DEFAULT_RETENTION_MINS: i64 = 60;

/// Mean inlet and outlet temperature over the retained entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Averages {
    pub inlet: f64,
    pub dry_outlet: f64,
}

/// Arrival-ordered entries, bounded in time span rather than count.
#[derive(Debug, Clone)]
pub struct TelemetryLog {
    entries: VecDeque<LogEntry>,
    retention: Duration,
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_RETENTION_MINS))
    }
}

impl TelemetryLog {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            retention,
        }
    }

    /// Append at the end, then drop everything older than the retention
    /// window measured from the newest entry.
    ///
    /// Timestamps never go backwards: an entry stamped before the current
    /// tail is re-stamped to the tail's time.
    pub fn append(&mut self, mut entry: LogEntry) {
        // ---
        if let Some(last) = self.entries.back() {
            if entry.timestamp() < last.timestamp() {
                tracing::debug!(
                    entry = %entry.timestamp(),
                    tail = %last.timestamp(),
                    "log entry older than tail, re-stamping"
                );
                entry.reading.timestamp = last.timestamp();
            }
        }

        let newest = entry.timestamp();
        self.entries.push_back(entry);

        while let Some(front) = self.entries.front() {
            if newest - front.timestamp() > self.retention {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    /// Arithmetic means; zero for an empty log.
    pub fn averages(&self) -> Averages {
        // ---
        if self.entries.is_empty() {
            return Averages::default();
        }

        let n = self.entries.len() as f64;
        let (inlet, outlet) = self.entries.iter().fold((0.0, 0.0), |(i, o), e| {
            (i + e.reading.inlet_temp, o + e.reading.outlet_temp)
        });

        Averages {
            inlet: inlet / n,
            dry_outlet: outlet / n,
        }
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Owned copy of the retained entries, oldest first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::models::Reading;
    use chrono::{DateTime, TimeZone, Utc};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 9, 0, 0).unwrap()
    }

    fn entry_at(minutes: i64, inlet: f64, outlet: f64) -> LogEntry {
        LogEntry {
            reading: Reading {
                timestamp: base_time() + Duration::minutes(minutes),
                inlet_temp: inlet,
                outlet_temp: outlet,
                intake_humidity: Some(30.0),
                outtake_humidity: Some(60.0),
                dry_fan_speed: 50.0,
                wet_fan_speed: 50.0,
                pump_active: true,
            },
            metrics: None,
        }
    }

    #[test]
    fn test_empty_log_averages_to_zero() {
        // ---
        let log = TelemetryLog::default();
        assert_eq!(log.averages(), Averages { inlet: 0.0, dry_outlet: 0.0 });
    }

    #[test]
    fn test_prunes_relative_to_newest() {
        // ---
        let mut log = TelemetryLog::default();
        log.append(entry_at(0, 30.0, 20.0));
        log.append(entry_at(30, 31.0, 21.0));
        assert_eq!(log.len(), 2);

        log.append(entry_at(61, 32.0, 22.0));
        assert_eq!(log.len(), 2);
        assert_eq!(log.iter().next().unwrap().reading.inlet_temp, 31.0);
    }

    #[test]
    fn test_entry_exactly_at_window_edge_is_kept() {
        // ---
        let mut log = TelemetryLog::default();
        log.append(entry_at(0, 30.0, 20.0));
        log.append(entry_at(60, 30.0, 20.0));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_averages() {
        // ---
        let mut log = TelemetryLog::default();
        log.append(entry_at(0, 30.0, 20.0));
        log.append(entry_at(1, 34.0, 22.0));

        let avg = log.averages();
        assert_eq!(avg.inlet, 32.0);
        assert_eq!(avg.dry_outlet, 21.0);
    }

    #[test]
    fn test_out_of_order_entry_keeps_ordering() {
        // ---
        let mut log = TelemetryLog::default();
        log.append(entry_at(10, 30.0, 20.0));
        log.append(entry_at(5, 31.0, 21.0));

        let stamps: Vec<_> = log.iter().map(LogEntry::timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(log.last().unwrap().reading.inlet_temp, 31.0);
    }

    #[test]
    fn test_no_deduplication() {
        // ---
        let mut log = TelemetryLog::default();
        log.append(entry_at(0, 30.0, 20.0));
        log.append(entry_at(0, 30.0, 20.0));
        assert_eq!(log.len(), 2);
    }
}
