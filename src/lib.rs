//! Telemetry synchronization and psychrometric evaluation for an
//! evaporative-cooling unit.
//!
//! - `psychrometrics`: pure dew point / wet bulb / enthalpy / COP routines
//! - `telemetry_log`: time-windowed log with rolling averages
//! - `watchdog`: device liveness state machine
//! - `orchestrator`: integration point owning state, log and watchdog
//! - `store`: port to the remote key/value tree plus REST and in-memory adapters
//! - `routes`: HTTP gateway over the orchestrator

pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod psychrometrics;
pub mod routes;
pub mod settings;
pub mod store;
pub mod telemetry_log;
pub mod watchdog;

pub use commands::{Command, FanKind};
pub use config::Config;
pub use error::{CommandError, PsychroError, StoreError};
pub use models::{DerivedMetrics, LogEntry, RawSnapshot, Reading, SystemState};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use settings::Settings;
pub use store::{MemoryStore, RestStore, TelemetryStore};
