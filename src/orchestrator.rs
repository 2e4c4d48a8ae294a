//! System state orchestrator.
//!
//! Owns the `SystemState`, the connection watchdog and the telemetry log.
//! A single run-loop task reacts to snapshots, liveness checks and reconnect
//! timers; commands write back through the [`TelemetryStore`] and only touch
//! state once the store acknowledges.
//!
//! Locking: `Inner` sits behind a `std::sync::Mutex` that is never held
//! across an `.await`, so every handler finishes its mutation before yielding.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::commands::{Command, FanKind};
use crate::error::CommandError;
use crate::models::{LogEntry, RawSnapshot, SystemState};
use crate::psychrometrics::{evaluate_performance, PerformanceInputs};
use crate::settings::Settings;
use crate::store::{paths, TelemetryStore};
use crate::telemetry_log::{Averages, TelemetryLog, DEFAULT_RETENTION_MINS};
use crate::watchdog::{CheckOutcome, ConnectionStatus, ConnectionWatchdog, WatchdogConfig};

// ---

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub watchdog: WatchdogConfig,
    pub log_retention: chrono::Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            watchdog: WatchdogConfig::default(),
            log_retention: chrono::Duration::minutes(DEFAULT_RETENTION_MINS),
        }
    }
}

struct Inner {
    watchdog: ConnectionWatchdog,
    log: TelemetryLog,
    settings: Settings,
}

/// State shared between the run loop and command callers.
struct Shared {
    inner: Mutex<Inner>,
    state: watch::Sender<SystemState>,
}

struct RunHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct Orchestrator {
    store: Arc<dyn TelemetryStore>,
    shared: Arc<Shared>,
    run: tokio::sync::Mutex<Option<RunHandle>>,
}

fn performance_inputs(state: &SystemState) -> Option<PerformanceInputs> {
    Some(PerformanceInputs {
        inlet_temp: state.inlet_temp?,
        outlet_temp: state.dry_outlet_temp?,
        inlet_rh: state.intake_humidity?,
        outlet_rh: state.outtake_humidity?,
        dry_fan_speed: state.dry_fan_speed,
        wet_fan_speed: state.wet_fan_speed,
        pump_active: state.is_pump_active,
    })
}

fn check_speed(field: &'static str, value: f64) -> Result<(), CommandError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(CommandError::OutOfRange { field, value })
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn apply_snapshot(&self, raw: &RawSnapshot, now: Instant, at: DateTime<Utc>) {
        // ---
        if raw.is_empty() {
            debug!("empty snapshot, nothing to merge");
            return;
        }

        let mut inner = self.lock();
        inner.watchdog.mark_data_received();
        if raw.is_alive == Some(true) {
            inner.watchdog.heartbeat(now);
        }
        let connected = inner.watchdog.is_connected();

        let mut next = self.state.borrow().clone();
        next.merge(raw);
        next.is_system_connected = connected;
        next.has_initial_data = true;
        next.last_update = Some(at);

        let metrics = performance_inputs(&next).and_then(|inputs| {
            evaluate_performance(&inputs)
                .map_err(|e| warn!("skipping derived metrics for this snapshot: {}", e))
                .ok()
        });
        if metrics.is_some() {
            next.derived = metrics;
        }

        if let Some(inlet) = next.inlet_temp {
            let alert = inner.settings.exceeds_max_temp(inlet);
            if alert && !next.temperature_alert {
                warn!(
                    inlet,
                    max = inner.settings.max_temp,
                    "inlet temperature above configured maximum"
                );
            }
            next.temperature_alert = alert;
        }

        if connected {
            if let Some(reading) = next.reading_at(at) {
                let changed = inner
                    .log
                    .last()
                    .map_or(true, |last| !last.reading.same_values(&reading));
                if changed {
                    inner.log.append(LogEntry { reading, metrics });
                }
            }
        }

        self.state.send_replace(next);
    }

    fn set_connected(&self, connected: bool) {
        self.state.send_if_modified(|s| {
            let changed = s.is_system_connected != connected;
            s.is_system_connected = connected;
            changed
        });
    }

    fn check_liveness(&self, now: Instant) -> CheckOutcome {
        // ---
        let mut inner = self.lock();
        let outcome = inner.watchdog.check(now);
        self.set_connected(matches!(outcome, CheckOutcome::Alive));
        outcome
    }

    fn begin_reconnect(&self) -> bool {
        self.lock().watchdog.begin_reconnect()
    }

    fn watchdog_config(&self) -> WatchdogConfig {
        *self.lock().watchdog.config()
    }
}

async fn next_snapshot(feed: &mut Option<mpsc::Receiver<RawSnapshot>>) -> Option<RawSnapshot> {
    match feed {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_loop(
    store: Arc<dyn TelemetryStore>,
    shared: Arc<Shared>,
    mut feed: Option<mpsc::Receiver<RawSnapshot>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    // ---
    let config = shared.watchdog_config();

    let mut check = tokio::time::interval_at(Instant::now() + config.check_interval, config.check_interval);
    check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reconnect = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(reconnect);
    let mut reconnect_armed = false;

    info!("orchestrator run loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            snapshot = next_snapshot(&mut feed) => match snapshot {
                Some(raw) => shared.apply_snapshot(&raw, Instant::now(), Utc::now()),
                None => {
                    warn!("telemetry feed ended");
                    feed = None;
                }
            },

            _ = check.tick() => {
                if let Some(delay) = shared.check_liveness(Instant::now()).reconnect_in() {
                    debug!(delay_secs = delay.as_secs(), "reconnect scheduled");
                    reconnect.as_mut().reset(Instant::now() + delay);
                    reconnect_armed = true;
                }
            }

            _ = &mut reconnect, if reconnect_armed => {
                reconnect_armed = false;
                if shared.begin_reconnect() {
                    feed = None;
                    match store.subscribe().await {
                        Ok(rx) => feed = Some(rx),
                        Err(e) => warn!("re-subscribe failed: {}", e),
                    }
                }
            }
        }
    }

    info!("orchestrator run loop stopped");
}

impl Orchestrator {
    pub fn new(store: Arc<dyn TelemetryStore>, config: OrchestratorConfig) -> Self {
        // ---
        let inner = Inner {
            watchdog: ConnectionWatchdog::new(config.watchdog),
            log: TelemetryLog::new(config.log_retention),
            settings: Settings::default(),
        };
        let (state, _) = watch::channel(SystemState::default());

        Self {
            store,
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                state,
            }),
            run: tokio::sync::Mutex::new(None),
        }
    }

    // --- lifecycle

    /// Load settings, subscribe, and spawn the run loop. No-op if running.
    ///
    /// A failed initial subscription is not fatal: the watchdog's reconnect
    /// schedule retries it.
    pub async fn start(&self) {
        // ---
        let mut run = self.run.lock().await;
        if run.is_some() {
            debug!("orchestrator already running");
            return;
        }

        match self.store.read_settings().await {
            Ok(settings) => self.update_settings(settings),
            Err(e) => warn!("could not load settings, using defaults: {}", e),
        }

        let feed = match self.store.subscribe().await {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!("initial subscribe failed: {}", e);
                None
            }
        };

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_loop(
            Arc::clone(&self.store),
            Arc::clone(&self.shared),
            feed,
            shutdown_rx,
        ));
        *run = Some(RunHandle { shutdown, task });
    }

    /// Stop the run loop and release its timers. No-op if not running.
    pub async fn stop(&self) {
        // ---
        let Some(handle) = self.run.lock().await.take() else {
            return;
        };
        let _ = handle.shutdown.send(());
        if let Err(e) = handle.task.await {
            error!("run loop ended abnormally: {}", e);
        }
    }

    pub async fn is_running(&self) -> bool {
        self.run.lock().await.is_some()
    }

    // --- ingress

    /// Merge a snapshot as if it had arrived on the feed.
    pub fn on_snapshot(&self, raw: &RawSnapshot) {
        self.shared.apply_snapshot(raw, Instant::now(), Utc::now());
    }

    /// Run a liveness check now.
    pub fn check_liveness(&self) -> CheckOutcome {
        self.shared.check_liveness(Instant::now())
    }

    // --- read side

    /// Observe state changes. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.shared.state.subscribe()
    }

    /// Consistent copy of the current state.
    pub fn current(&self) -> SystemState {
        self.shared.state.borrow().clone()
    }

    pub fn averages(&self) -> Averages {
        self.shared.lock().log.averages()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.shared.lock().log.to_vec()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.shared.lock().watchdog.status(Instant::now())
    }

    pub fn settings(&self) -> Settings {
        self.shared.lock().settings.clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        // ---
        let mut inner = self.shared.lock();
        let max_temp = settings.max_temp;
        inner.settings = settings;
        self.shared.state.send_if_modified(|s| {
            let alert = s.inlet_temp.is_some_and(|t| t > max_temp);
            let changed = s.temperature_alert != alert;
            s.temperature_alert = alert;
            changed
        });
    }

    /// Clear an exhausted reconnect budget.
    pub fn reset_reconnect_budget(&self) {
        self.shared.lock().watchdog.reset();
    }

    // --- commands

    pub async fn execute(&self, command: Command) -> Result<(), CommandError> {
        // ---
        debug!(?command, "execute");
        match command {
            Command::SetFanSpeed { fan, speed } => self.set_fan_speed(fan, speed).await,
            Command::TogglePump => self.toggle_pump().await,
            Command::SetOptimalMode { enabled } => self.set_optimal_mode(enabled).await,
            Command::ApplyOptimal => self.apply_optimal().await,
            Command::EmergencyStop => self.emergency_stop().await,
        }
    }

    fn ensure_connected(&self) -> Result<(), CommandError> {
        if self.shared.state.borrow().is_system_connected {
            Ok(())
        } else {
            Err(CommandError::NotConnected)
        }
    }

    async fn write(&self, path: &'static str, value: Value) -> Result<(), CommandError> {
        // ---
        self.store.write(path, value.clone()).await.map_err(|source| {
            error!(path, %value, "write failed: {}", source);
            CommandError::WriteFailed {
                path: path.to_string(),
                source,
            }
        })
    }

    /// Reflect an acknowledged write. Holds `inner` so a snapshot being
    /// merged concurrently cannot replace the state with a stale copy.
    fn confirm(&self, apply: impl FnOnce(&mut SystemState)) {
        let _inner = self.shared.lock();
        self.shared.state.send_modify(apply);
    }

    pub async fn set_fan_speed(&self, fan: FanKind, speed: f64) -> Result<(), CommandError> {
        // ---
        self.ensure_connected()?;
        check_speed(fan.path(), speed)?;

        self.write(fan.path(), json!(speed)).await?;
        self.confirm(|s| match fan {
            FanKind::Dry => s.dry_fan_speed = speed,
            FanKind::Wet => s.wet_fan_speed = speed,
        });
        info!(?fan, speed, "fan speed set");
        Ok(())
    }

    pub async fn toggle_pump(&self) -> Result<(), CommandError> {
        // ---
        self.ensure_connected()?;
        let target = !self.shared.state.borrow().is_pump_active;

        self.write(paths::PUMP, json!(target)).await?;
        self.confirm(|s| s.is_pump_active = target);
        info!(pump = target, "pump toggled");
        Ok(())
    }

    pub async fn set_optimal_mode(&self, enabled: bool) -> Result<(), CommandError> {
        // ---
        self.ensure_connected()?;

        self.write(paths::OPTIMAL, json!(enabled)).await?;
        self.confirm(|s| s.is_optimal_mode = enabled);
        info!(enabled, "optimal mode set");
        Ok(())
    }

    /// Write the optimal setpoints one by one, then flip optimal mode on.
    /// Stops at the first failed write; earlier acknowledged writes stay.
    pub async fn apply_optimal(&self) -> Result<(), CommandError> {
        // ---
        self.ensure_connected()?;
        let settings = self.settings();
        check_speed(paths::DRY_FAN, settings.optimal_dry_fan)?;
        check_speed(paths::WET_FAN, settings.optimal_wet_fan)?;

        self.write(paths::DRY_FAN, json!(settings.optimal_dry_fan)).await?;
        self.confirm(|s| s.dry_fan_speed = settings.optimal_dry_fan);

        self.write(paths::WET_FAN, json!(settings.optimal_wet_fan)).await?;
        self.confirm(|s| s.wet_fan_speed = settings.optimal_wet_fan);

        self.write(paths::PUMP, json!(settings.optimal_pump)).await?;
        self.confirm(|s| s.is_pump_active = settings.optimal_pump);

        self.write(paths::OPTIMAL, json!(true)).await?;
        self.confirm(|s| s.is_optimal_mode = true);

        info!(
            dry = settings.optimal_dry_fan,
            wet = settings.optimal_wet_fan,
            pump = settings.optimal_pump,
            "optimal setpoints applied"
        );
        Ok(())
    }

    /// Fans to zero, pump and optimal mode off, regardless of connectivity.
    ///
    /// The four writes run concurrently; the call settles once all have,
    /// reflecting each acknowledged write. On failure the error returned is
    /// the first in field order (dry fan, wet fan, pump, optimal), not the
    /// first to settle.
    pub async fn emergency_stop(&self) -> Result<(), CommandError> {
        // ---
        warn!("emergency stop requested");

        let (dry, wet, pump, optimal) = tokio::join!(
            self.write(paths::DRY_FAN, json!(0)),
            self.write(paths::WET_FAN, json!(0)),
            self.write(paths::PUMP, json!(false)),
            self.write(paths::OPTIMAL, json!(false)),
        );

        self.confirm(|s| {
            if dry.is_ok() {
                s.dry_fan_speed = 0.0;
            }
            if wet.is_ok() {
                s.wet_fan_speed = 0.0;
            }
            if pump.is_ok() {
                s.is_pump_active = false;
            }
            if optimal.is_ok() {
                s.is_optimal_mode = false;
            }
        });

        dry.and(wet).and(pump).and(optimal)?;
        info!("emergency stop complete");
        Ok(())
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.run.get_mut().take() {
            handle.task.abort();
        }
    }
}
