//! `GET /state`: current device state, log averages, connection status and
//! whether the operating window is open (local wall-clock time).

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::models::SystemState;
use crate::orchestrator::Orchestrator;
use crate::telemetry_log::Averages;
use crate::watchdog::ConnectionStatus;

// ---

#[derive(Serialize)]
struct StateResponse {
    state: SystemState,
    averages: Averages,
    connection: ConnectionStatus,
    within_schedule: bool,
}

pub fn router() -> Router<Arc<Orchestrator>> {
    // ---
    Router::new().route("/state", get(handler))
}

async fn handler(State(orchestrator): State<Arc<Orchestrator>>) -> Json<StateResponse> {
    // ---
    debug!("GET /state");
    Json(StateResponse {
        state: orchestrator.current(),
        averages: orchestrator.averages(),
        connection: orchestrator.connection_status(),
        within_schedule: orchestrator.settings().is_within_schedule(Local::now().time()),
    })
}
