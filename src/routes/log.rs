//! Telemetry log endpoints: JSON at `/log`, CSV download at `/log.csv`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tracing::{debug, info};

use crate::export::{timestamped_filename, to_csv};
use crate::models::LogEntry;
use crate::orchestrator::Orchestrator;

// ---

pub fn router() -> Router<Arc<Orchestrator>> {
    // ---
    Router::new()
        .route("/log", get(entries))
        .route("/log.csv", get(csv))
}

async fn entries(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<LogEntry>> {
    // ---
    let entries = orchestrator.log_entries();
    debug!("GET /log - {} entries", entries.len());
    Json(entries)
}

async fn csv(State(orchestrator): State<Arc<Orchestrator>>) -> Response {
    // ---
    let entries = orchestrator.log_entries();
    let filename = timestamped_filename(Utc::now());
    info!("GET /log.csv - exporting {} entries as {}", entries.len(), filename);

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        to_csv(&entries),
    )
        .into_response()
}
