//! Device liveness state machine.
//!
//! The watchdog is pure: callers feed it heartbeats and periodic checks with
//! an explicit `now`, and it answers with what should happen next. Timer
//! ownership lives in the orchestrator's run loop.
//!
//! ```text
//!   DISCONNECTED ──heartbeat──▶ CONNECTED
//!   CONNECTED ──check: silent > timeout──▶ DISCONNECTED (+ reconnect, budget permitting)
//! ```

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

// ---

/// Watchdog timing and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Silence longer than this means the device is gone.
    pub heartbeat_timeout: Duration,
    /// Period of the liveness check.
    pub check_interval: Duration,
    /// Delay between detecting a loss and re-subscribing.
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: Duration::from_secs(20),
            check_interval: Duration::from_secs(20),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
        }
    }
}

/// Result of a periodic liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Heartbeat is recent enough.
    Alive,
    /// The device just went silent.
    Lost { reconnect_in: Option<Duration> },
    /// Still silent since an earlier check.
    StillDown { reconnect_in: Option<Duration> },
}

impl CheckOutcome {
    pub fn reconnect_in(&self) -> Option<Duration> {
        match self {
            Self::Alive => None,
            Self::Lost { reconnect_in } | Self::StillDown { reconnect_in } => *reconnect_in,
        }
    }
}

/// Read-only view of the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub reconnect_attempts: u32,
    pub has_initial_data: bool,
    pub reconnect_pending: bool,
    /// Seconds since the last heartbeat, if one was ever seen.
    pub seconds_since_heartbeat: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ConnectionWatchdog {
    config: WatchdogConfig,
    last_alive: Option<Instant>,
    is_connected: bool,
    reconnect_attempts: u32,
    has_initial_data: bool,
    reconnect_pending: bool,
}

impl ConnectionWatchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            last_alive: None,
            is_connected: false,
            reconnect_attempts: 0,
            has_initial_data: false,
            reconnect_pending: false,
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn has_initial_data(&self) -> bool {
        self.has_initial_data
    }

    pub fn mark_data_received(&mut self) {
        self.has_initial_data = true;
    }

    /// Fresh heartbeat. Returns `true` when this reconnected the device.
    pub fn heartbeat(&mut self, now: Instant) -> bool {
        // ---
        let was_connected = self.is_connected;
        self.last_alive = Some(now);
        self.is_connected = true;
        self.reconnect_attempts = 0;
        self.reconnect_pending = false;

        if !was_connected {
            tracing::info!("device heartbeat received, connected");
        }
        !was_connected
    }

    /// Periodic check: recompute connectivity from the heartbeat age.
    ///
    /// While disconnected and under budget, each check asks for one
    /// reconnect; no new request is made while one is already pending.
    pub fn check(&mut self, now: Instant) -> CheckOutcome {
        // ---
        let alive = self
            .last_alive
            .is_some_and(|t| now.saturating_duration_since(t) <= self.config.heartbeat_timeout);

        if alive {
            self.is_connected = true;
            return CheckOutcome::Alive;
        }

        let was_connected = self.is_connected;
        self.is_connected = false;

        let reconnect_in = if !self.reconnect_pending
            && self.reconnect_attempts < self.config.max_reconnect_attempts
        {
            self.reconnect_pending = true;
            Some(self.config.reconnect_delay)
        } else {
            None
        };

        if was_connected {
            tracing::warn!(
                timeout_secs = self.config.heartbeat_timeout.as_secs(),
                reconnect = reconnect_in.is_some(),
                "device heartbeat lost, disconnected"
            );
            CheckOutcome::Lost { reconnect_in }
        } else {
            CheckOutcome::StillDown { reconnect_in }
        }
    }

    /// The reconnect delay elapsed. Returns `true` if the attempt may go ahead;
    /// the attempt counter never passes the budget.
    pub fn begin_reconnect(&mut self) -> bool {
        // ---
        self.reconnect_pending = false;

        if self.is_connected || self.reconnect_attempts >= self.config.max_reconnect_attempts {
            return false;
        }

        self.reconnect_attempts += 1;
        tracing::info!(
            attempt = self.reconnect_attempts,
            max = self.config.max_reconnect_attempts,
            "reconnecting to telemetry source"
        );
        true
    }

    /// Clear the reconnect budget after it has been exhausted.
    pub fn reset(&mut self) {
        self.reconnect_attempts = 0;
        self.reconnect_pending = false;
    }

    pub fn status(&self, now: Instant) -> ConnectionStatus {
        ConnectionStatus {
            is_connected: self.is_connected,
            reconnect_attempts: self.reconnect_attempts,
            has_initial_data: self.has_initial_data,
            reconnect_pending: self.reconnect_pending,
            seconds_since_heartbeat: self
                .last_alive
                .map(|t| now.saturating_duration_since(t).as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_starts_disconnected() {
        // ---
        let wd = ConnectionWatchdog::new(WatchdogConfig::default());
        assert!(!wd.is_connected());
        assert_eq!(wd.reconnect_attempts(), 0);
        assert!(!wd.has_initial_data());
    }

    #[test]
    fn test_stays_connected_within_timeout() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig::default());
        assert!(wd.heartbeat(t0));

        assert_eq!(wd.check(t0 + secs(19)), CheckOutcome::Alive);
        assert!(wd.is_connected());
    }

    #[test]
    fn test_disconnects_after_timeout_and_schedules_reconnect() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig::default());
        wd.heartbeat(t0);

        let outcome = wd.check(t0 + secs(21));
        assert_eq!(
            outcome,
            CheckOutcome::Lost {
                reconnect_in: Some(secs(5))
            }
        );
        assert!(!wd.is_connected());
    }

    #[test]
    fn test_reconnect_budget_is_capped() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig::default());
        wd.heartbeat(t0);

        let mut now = t0;
        for attempt in 1..=5 {
            now += secs(21);
            assert!(wd.check(now).reconnect_in().is_some());
            assert!(wd.begin_reconnect());
            assert_eq!(wd.reconnect_attempts(), attempt);
        }

        now += secs(21);
        assert_eq!(wd.check(now), CheckOutcome::StillDown { reconnect_in: None });
        assert!(!wd.begin_reconnect());
        assert_eq!(wd.reconnect_attempts(), 5);
    }

    #[test]
    fn test_no_duplicate_schedule_while_pending() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig::default());
        wd.heartbeat(t0);

        assert!(wd.check(t0 + secs(21)).reconnect_in().is_some());
        assert!(wd.check(t0 + secs(22)).reconnect_in().is_none());
    }

    #[test]
    fn test_heartbeat_resets_attempts() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig::default());
        wd.heartbeat(t0);
        wd.check(t0 + secs(21));
        wd.begin_reconnect();
        assert_eq!(wd.reconnect_attempts(), 1);

        assert!(wd.heartbeat(t0 + secs(30)));
        assert!(wd.is_connected());
        assert_eq!(wd.reconnect_attempts(), 0);
    }

    #[test]
    fn test_never_heard_from_device() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig::default());

        assert_eq!(
            wd.check(t0),
            CheckOutcome::StillDown {
                reconnect_in: Some(secs(5))
            }
        );
        assert_eq!(wd.status(t0).seconds_since_heartbeat, None);
    }

    #[test]
    fn test_reset_restores_budget() {
        // ---
        let t0 = Instant::now();
        let mut wd = ConnectionWatchdog::new(WatchdogConfig {
            max_reconnect_attempts: 1,
            ..Default::default()
        });
        wd.check(t0);
        assert!(wd.begin_reconnect());
        assert_eq!(wd.check(t0 + secs(20)).reconnect_in(), None);

        wd.reset();
        assert!(wd.check(t0 + secs(40)).reconnect_in().is_some());
    }
}
